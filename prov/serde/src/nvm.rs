/*++

Licensed under the Apache-2.0 license.

File Name:

   nvm.rs

Abstract:

    File contains the typed record codec for provisioning payloads.

--*/

use log::debug;
use sensor_prov_error::{ProvError, ProvResult};
use sensor_prov_types::*;
use zerocopy::{FromBytes, IntoBytes};
use zeroize::{Zeroize, ZeroizeOnDrop};

const RECORD: &str = "typed record";

/// Serialized RSA public certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicCertRecord {
    cert: Vec<u8>,
}

impl RsaPublicCertRecord {
    /// Wraps an already serialized certificate. The length must be that of a
    /// certificate over a supported key size.
    pub fn new(cert: &[u8]) -> ProvResult<Self> {
        let size = cert.len();
        let supported = RSA_SUPPORTED_KEY_BITS
            .iter()
            .any(|bits| size == RSA_CERT_HEADER_BYTE_SIZE + 2 * (bits / 8));
        if !supported {
            return Err(ProvError::UnsupportedSize {
                what: "RSA public certificate",
                size,
            });
        }
        Ok(Self { cert: cert.to_vec() })
    }

    pub fn cert(&self) -> &[u8] {
        &self.cert
    }
}

/// RSA private key payload: modulus followed by the private exponent
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RsaPrivateKeyRecord {
    #[zeroize(skip)]
    modulus: Vec<u8>,

    private_exponent: Vec<u8>,
}

impl RsaPrivateKeyRecord {
    pub fn new(key: &RsaPrivKey) -> ProvResult<Self> {
        let bits = key.bits();
        if !RSA_SUPPORTED_KEY_BITS.contains(&bits) {
            return Err(ProvError::UnsupportedSize {
                what: "RSA private key",
                size: bits,
            });
        }
        let size = bits / 8;
        if key.private_exponent.len() > size {
            return Err(ProvError::malformed(
                "RSA private key",
                "private exponent is wider than the modulus",
            ));
        }

        // Left-pad the exponent to the modulus width.
        let mut private_exponent = vec![0u8; size];
        private_exponent[size - key.private_exponent.len()..]
            .copy_from_slice(&key.private_exponent);

        Ok(Self {
            modulus: key.modulus.clone(),
            private_exponent,
        })
    }

    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    pub fn private_exponent(&self) -> &[u8] {
        &self.private_exponent
    }

    pub fn bits(&self) -> usize {
        self.modulus.len() * 8
    }

    fn from_payload(payload: &[u8]) -> ProvResult<Self> {
        let size = payload.len() / 2;
        if payload.len() % 2 != 0 || !RSA_SUPPORTED_KEY_BITS.contains(&(size * 8)) {
            return Err(ProvError::UnsupportedSize {
                what: "RSA private key",
                size: payload.len() * 4,
            });
        }
        let (modulus, private_exponent) = payload.split_at(size);
        Ok(Self {
            modulus: modulus.to_vec(),
            private_exponent: private_exponent.to_vec(),
        })
    }
}

impl core::fmt::Debug for RsaPrivateKeyRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RsaPrivateKeyRecord({} bits)", self.bits())
    }
}

/// Pre-shared master secret
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PskMasterSecretRecord {
    secret: Vec<u8>,
}

impl PskMasterSecretRecord {
    pub fn new(secret: &[u8]) -> ProvResult<Self> {
        match secret.len() {
            16 | 24 | 32 => Ok(Self {
                secret: secret.to_vec(),
            }),
            size => Err(ProvError::UnsupportedSize {
                what: "PSK master secret",
                size,
            }),
        }
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl core::fmt::Debug for PskMasterSecretRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PskMasterSecretRecord({} bits)", self.secret.len() * 8)
    }
}

/// TRNG characterization values
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrngCharacterizationRecord {
    pub values: [u32; TRNG_CHARACTERIZATION_WORD_COUNT],
}

impl TrngCharacterizationRecord {
    pub fn new(values: &[u32]) -> ProvResult<Self> {
        let values = values
            .try_into()
            .map_err(|_| ProvError::UnsupportedSize {
                what: "TRNG characterization",
                size: values.len(),
            })?;
        Ok(Self { values })
    }
}

/// Typed provisioning record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvmRecord {
    RsaPublicCert(RsaPublicCertRecord),
    RsaPrivateKey(RsaPrivateKeyRecord),
    PskMasterSecret(PskMasterSecretRecord),
    TrngCharacterization(TrngCharacterizationRecord),
    OtpmConfiguration(OtpmConfig),
}

impl NvmRecord {
    pub fn record_type(&self) -> NvmRecordType {
        match self {
            NvmRecord::RsaPublicCert(_) => NvmRecordType::RsaPublicCert,
            NvmRecord::RsaPrivateKey(_) => NvmRecordType::RsaPrivateKey,
            NvmRecord::PskMasterSecret(_) => NvmRecordType::PskMasterSecret,
            NvmRecord::TrngCharacterization(_) => NvmRecordType::TrngCharacterization,
            NvmRecord::OtpmConfiguration(_) => NvmRecordType::OtpmConfiguration,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            NvmRecord::RsaPublicCert(record) => record.cert.clone(),
            NvmRecord::RsaPrivateKey(record) => {
                [record.modulus.as_slice(), &record.private_exponent].concat()
            }
            NvmRecord::PskMasterSecret(record) => record.secret.clone(),
            NvmRecord::TrngCharacterization(record) => record
                .values
                .iter()
                .flat_map(|value| value.to_le_bytes())
                .collect(),
            NvmRecord::OtpmConfiguration(config) => config.as_bytes().to_vec(),
        }
    }

    /// Serialize the record as header followed by payload
    pub fn to_bytes(&self) -> ProvResult<Vec<u8>> {
        let payload = self.payload();
        let length_words =
            u16::try_from(payload.len() / 4).map_err(|_| ProvError::UnsupportedSize {
                what: RECORD,
                size: payload.len(),
            })?;
        let header = NvmRecordHeader {
            record_type: self.record_type().code().into(),
            length_words: length_words.into(),
        };

        let mut bytes = Vec::with_capacity(NVM_RECORD_HEADER_BYTE_SIZE + payload.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode one record from the front of `bytes`, returning it together
    /// with the unconsumed remainder.
    pub fn decode(bytes: &[u8]) -> ProvResult<(Self, &[u8])> {
        let (header, rest) = NvmRecordHeader::read_from_prefix(bytes)
            .map_err(|_| ProvError::malformed(RECORD, "truncated header"))?;
        let record_type = NvmRecordType::from_code(header.record_type.get())?;
        let size = usize::from(header.length_words.get()) * 4;
        if rest.len() < size {
            return Err(ProvError::malformed(
                RECORD,
                format!("payload needs {size} bytes, {} available", rest.len()),
            ));
        }
        let (payload, rest) = rest.split_at(size);
        debug!("Decoding {record_type:?} record with {size} byte payload");

        let record = match record_type {
            NvmRecordType::RsaPublicCert => {
                NvmRecord::RsaPublicCert(RsaPublicCertRecord::new(payload)?)
            }
            NvmRecordType::RsaPrivateKey => {
                NvmRecord::RsaPrivateKey(RsaPrivateKeyRecord::from_payload(payload)?)
            }
            NvmRecordType::PskMasterSecret => {
                NvmRecord::PskMasterSecret(PskMasterSecretRecord::new(payload)?)
            }
            NvmRecordType::TrngCharacterization => {
                let values: Vec<u32> = payload
                    .chunks_exact(4)
                    .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                NvmRecord::TrngCharacterization(TrngCharacterizationRecord::new(&values)?)
            }
            NvmRecordType::OtpmConfiguration => {
                let config = OtpmConfig::read_from_bytes(payload).map_err(|_| {
                    ProvError::UnsupportedSize {
                        what: "OTPM configuration",
                        size: payload.len(),
                    }
                })?;
                NvmRecord::OtpmConfiguration(config)
            }
        };
        Ok((record, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_private_key(bits: usize) -> RsaPrivKey {
        RsaPrivKey {
            modulus: vec![0xC3; bits / 8],
            public_exponent: RSA_PUBLIC_EXPONENT,
            private_exponent: vec![0x5A; bits / 8 - 1],
            prime1: vec![],
            prime2: vec![],
        }
    }

    fn all_records() -> Vec<NvmRecord> {
        vec![
            NvmRecord::RsaPublicCert(RsaPublicCertRecord::new(&[0x11; 8 + 512]).unwrap()),
            NvmRecord::RsaPrivateKey(RsaPrivateKeyRecord::new(&test_private_key(2048)).unwrap()),
            NvmRecord::PskMasterSecret(PskMasterSecretRecord::new(&[0x22; 24]).unwrap()),
            NvmRecord::TrngCharacterization(
                TrngCharacterizationRecord::new(&[1, 2, 3, 0xdeadbeef]).unwrap(),
            ),
            NvmRecord::OtpmConfiguration(OtpmConfig {
                program_pulse: 100.into(),
                sense_trim: 0x1234.into(),
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn test_type_code_prefix() {
        for record in all_records() {
            let bytes = record.to_bytes().unwrap();
            assert_eq!(bytes[..2], record.record_type().code().to_le_bytes());
        }
    }

    #[test]
    fn test_header_length() {
        for record in all_records() {
            let bytes = record.to_bytes().unwrap();
            let words = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
            assert_eq!(words, (bytes.len() - NVM_RECORD_HEADER_BYTE_SIZE) / 4);
        }
    }

    #[test]
    fn test_decode_concatenated() {
        let records = all_records();
        let bytes: Vec<u8> = records
            .iter()
            .flat_map(|record| record.to_bytes().unwrap())
            .collect();

        let mut rest = bytes.as_slice();
        for expected in &records {
            let (record, tail) = NvmRecord::decode(rest).unwrap();
            assert_eq!(&record, expected);
            rest = tail;
        }
        assert!(rest.is_empty());
    }

    #[test]
    fn test_trng_bytes() {
        let record = NvmRecord::TrngCharacterization(
            TrngCharacterizationRecord::new(&[1, 2, 3, 4]).unwrap(),
        );
        assert_eq!(
            record.to_bytes().unwrap(),
            [
                0x04, 0x00, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00,
                0x00, 0x00, 0x04, 0x00, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_private_key_padding() {
        let record = RsaPrivateKeyRecord::new(&test_private_key(3072)).unwrap();
        assert_eq!(record.private_exponent().len(), 384);
        assert_eq!(record.private_exponent()[0], 0);
        assert_eq!(record.private_exponent()[1], 0x5A);
        assert_eq!(
            NvmRecord::RsaPrivateKey(record).to_bytes().unwrap()[2..4],
            [192, 0]
        );
    }

    #[test]
    fn test_size_domains() {
        assert!(matches!(
            RsaPrivateKeyRecord::new(&test_private_key(1024)),
            Err(ProvError::UnsupportedSize { size: 1024, .. })
        ));
        assert!(matches!(
            PskMasterSecretRecord::new(&[0; 20]),
            Err(ProvError::UnsupportedSize { size: 20, .. })
        ));
        assert!(matches!(
            TrngCharacterizationRecord::new(&[1, 2, 3]),
            Err(ProvError::UnsupportedSize { size: 3, .. })
        ));
        assert!(RsaPublicCertRecord::new(&[0; 100]).is_err());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            NvmRecord::decode(&[0x03, 0x00]),
            Err(ProvError::Malformed { .. })
        ));
        assert!(matches!(
            NvmRecord::decode(&[0x09, 0x00, 0x00, 0x00]),
            Err(ProvError::Malformed { .. })
        ));
        assert!(matches!(
            NvmRecord::decode(&[0x03, 0x00, 0x04, 0x00, 0x00]),
            Err(ProvError::Malformed { .. })
        ));
    }
}
