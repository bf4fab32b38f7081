// Licensed under the Apache-2.0 license

use sensor_prov_crypto::RustCrypto;
use sensor_prov_error::ProvError;
use sensor_prov_fake_keys::{default_test_keys, test_rsa_4096};
use sensor_prov_gen::{ProvCrypto, RsaCertParams, RsaPublicCert};
use sensor_prov_serde::{NvmRecord, RsaPublicCertRecord};
use sensor_prov_types::{KeyName, RsaKeyPair};

const PARAMS: RsaCertParams = RsaCertParams {
    authority: 2,
    purpose: 1,
    version: 3,
    number: 0x3ff_fffe,
};

fn test_pairs(crypto: &RustCrypto) -> Vec<RsaKeyPair> {
    let keys = default_test_keys(crypto).unwrap();
    vec![
        keys.pair(KeyName::SensorPair).unwrap().clone(),
        keys.pair(KeyName::RotCmPair).unwrap().clone(),
        test_rsa_4096(crypto).unwrap(),
    ]
}

#[test]
fn test_self_signed_round_trip() {
    let crypto = RustCrypto::default();
    for pair in test_pairs(&crypto) {
        let cert = RsaPublicCert::build(&crypto, &pair, None, PARAMS, true).unwrap();
        let bytes = cert.serialize().unwrap();
        assert_eq!(bytes.len(), 8 + 2 * pair.public.byte_size());
        assert_eq!(bytes[8..8 + pair.public.byte_size()], pair.public.modulus);

        let parsed = RsaPublicCert::parse_and_validate(&crypto, None, &bytes).unwrap();
        assert_eq!(parsed, cert);
        assert_eq!(parsed.params, PARAMS);
        assert_eq!(parsed.public_key, pair.public);
    }
}

#[test]
fn test_issuer_signed() {
    let crypto = RustCrypto::default();
    let keys = default_test_keys(&crypto).unwrap();
    let sensor = keys.pair(KeyName::SensorPair).unwrap();
    let vendor = keys.pair(KeyName::VendorPair).unwrap();

    let cert = RsaPublicCert::build(&crypto, sensor, Some(vendor), PARAMS, true).unwrap();
    let bytes = cert.serialize().unwrap();
    RsaPublicCert::parse_and_validate(&crypto, Some(&vendor.public), &bytes).unwrap();
    assert!(matches!(
        RsaPublicCert::parse_and_validate(&crypto, None, &bytes),
        Err(ProvError::SignatureMismatch(_))
    ));
}

#[test]
fn test_signature_is_reversed() {
    let crypto = RustCrypto::default();
    let keys = default_test_keys(&crypto).unwrap();
    let sensor = keys.pair(KeyName::SensorPair).unwrap();
    let cert = RsaPublicCert::build(&crypto, sensor, None, PARAMS, true).unwrap();

    let mut sig = cert.signature.clone();
    sig.reverse();
    let signed = cert.signed_bytes().unwrap();
    assert!(crypto.rsa_verify(&sensor.public, &signed, &sig).unwrap());
}

#[test]
fn test_key_size_mismatch() {
    let crypto = RustCrypto::default();
    let keys = default_test_keys(&crypto).unwrap();
    let sensor = keys.pair(KeyName::SensorPair).unwrap();
    let rot_cm = keys.pair(KeyName::RotCmPair).unwrap();
    assert!(matches!(
        RsaPublicCert::build(&crypto, sensor, Some(rot_cm), PARAMS, true),
        Err(ProvError::KeySizeMismatch {
            signer: 3072,
            subject: 2048
        })
    ));
}

#[test]
fn test_unsigned_and_public_only() {
    let crypto = RustCrypto::default();
    let keys = default_test_keys(&crypto).unwrap().to_public_only();
    let sensor = keys.pair(KeyName::SensorPair).unwrap();

    let cert = RsaPublicCert::build(&crypto, sensor, None, PARAMS, false).unwrap();
    assert!(cert.signature.iter().all(|&b| b == 0));
    assert!(matches!(
        RsaPublicCert::parse_and_validate(&crypto, None, &cert.serialize().unwrap()),
        Err(ProvError::SignatureMismatch(_))
    ));
    assert!(matches!(
        RsaPublicCert::build(&crypto, sensor, None, PARAMS, true),
        Err(ProvError::MissingPrivateKey(_))
    ));
}

#[test]
fn test_tampering() {
    let crypto = RustCrypto::default();
    let keys = default_test_keys(&crypto).unwrap();
    let sensor = keys.pair(KeyName::SensorPair).unwrap();
    let bytes = RsaPublicCert::build(&crypto, sensor, None, PARAMS, true)
        .unwrap()
        .serialize()
        .unwrap();

    for offset in [0, 4, 7, 100, bytes.len() - 1] {
        let mut corrupted = bytes.clone();
        corrupted[offset] ^= 0x01;
        assert!(
            RsaPublicCert::parse_and_validate(&crypto, Some(&sensor.public), &corrupted).is_err(),
            "corruption at {offset} was not detected"
        );
    }
}

#[test]
fn test_type_tag_integrity() {
    let crypto = RustCrypto::default();
    let keys = default_test_keys(&crypto).unwrap();
    let sensor = keys.pair(KeyName::SensorPair).unwrap();
    let priv_key = sensor.private.as_ref().unwrap();

    // Re-sign a header whose type tag claims a 3072-bit key.
    let cert = RsaPublicCert::build(&crypto, sensor, None, PARAMS, false).unwrap();
    let mut bytes = cert.serialize().unwrap();
    bytes[0..2].copy_from_slice(&0x4333u16.to_le_bytes());
    let mut sig = crypto.rsa_sign(priv_key, &bytes[..264]).unwrap();
    sig.reverse();
    bytes[264..].copy_from_slice(&sig);

    assert!(matches!(
        RsaPublicCert::parse_and_validate(&crypto, None, &bytes),
        Err(ProvError::IntegrityMismatch(_))
    ));
}

#[test]
fn test_certificate_record() {
    let crypto = RustCrypto::default();
    let keys = default_test_keys(&crypto).unwrap();
    let vendor = keys.pair(KeyName::VendorPair).unwrap();
    let cert = RsaPublicCert::build(&crypto, vendor, None, PARAMS, true).unwrap();
    let bytes = cert.serialize().unwrap();

    let record = NvmRecord::RsaPublicCert(RsaPublicCertRecord::new(&bytes).unwrap());
    let encoded = record.to_bytes().unwrap();
    assert_eq!(encoded[..4], [0x01, 0x00, 130, 0x00]);
    assert_eq!(encoded[4..], bytes);
}
