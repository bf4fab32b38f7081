/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the RustCrypto implementation of the provisioning crypto
    capability.

--*/

use anyhow::{anyhow, bail, Context};
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};
use ccm::consts::{U12, U16};
use ccm::Ccm;
use cmac::{Cmac, Mac};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{pss, BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use sensor_prov_gen::ProvCrypto;
use sensor_prov_types::*;

/// Bits added to the modulus size when computing the reduction constant
const NP_EXTRA_BITS: usize = 132;

/// Runs `$body` with `$cipher` bound to the AES variant matching `$key` and
/// `$bytes` bound to the raw key.
macro_rules! with_aes {
    ($key:expr, |$cipher:ident, $bytes:ident| $body:expr) => {
        match $key {
            AesKey::Aes128($bytes) => {
                type $cipher = aes::Aes128;
                $body
            }
            AesKey::Aes192($bytes) => {
                type $cipher = aes::Aes192;
                $body
            }
            AesKey::Aes256($bytes) => {
                type $cipher = aes::Aes256;
                $body
            }
        }
    };
}

#[derive(Default)]
pub struct RustCrypto {}

/// Left-pads a big-endian integer to `size` bytes
fn to_fixed_be(value: &BigUint, size: usize) -> anyhow::Result<Vec<u8>> {
    let bytes = value.to_bytes_be();
    if bytes.len() > size {
        bail!("integer is {} bytes, expected at most {size}", bytes.len());
    }
    let mut result = vec![0u8; size];
    result[size - bytes.len()..].copy_from_slice(&bytes);
    Ok(result)
}

fn exponent_to_u32(e: &BigUint) -> anyhow::Result<u32> {
    let bytes = to_fixed_be(e, 4).context("Public exponent does not fit in 32 bits")?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn to_rsa_pub(key: &RsaPubKey) -> anyhow::Result<RsaPublicKey> {
    Ok(RsaPublicKey::new(
        BigUint::from_bytes_be(&key.modulus),
        BigUint::from(key.exponent),
    )?)
}

fn from_rsa_pub(key: &RsaPublicKey) -> anyhow::Result<RsaPubKey> {
    Ok(RsaPubKey {
        modulus: to_fixed_be(key.n(), key.size())?,
        exponent: exponent_to_u32(key.e())?,
    })
}

fn to_rsa_priv(key: &RsaPrivKey) -> anyhow::Result<RsaPrivateKey> {
    let primes = vec![
        BigUint::from_bytes_be(&key.prime1),
        BigUint::from_bytes_be(&key.prime2),
    ];
    Ok(RsaPrivateKey::from_components(
        BigUint::from_bytes_be(&key.modulus),
        BigUint::from(key.public_exponent),
        BigUint::from_bytes_be(&key.private_exponent),
        primes,
    )?)
}

fn from_rsa_priv(key: &RsaPrivateKey) -> anyhow::Result<RsaPrivKey> {
    let size = key.size();
    let primes = key.primes();
    if primes.len() != 2 {
        bail!("Multi-prime RSA keys are not supported");
    }
    Ok(RsaPrivKey {
        modulus: to_fixed_be(key.n(), size)?,
        public_exponent: exponent_to_u32(key.e())?,
        private_exponent: to_fixed_be(key.d(), size)?,
        prime1: primes[0].to_bytes_be(),
        prime2: primes[1].to_bytes_be(),
    })
}

impl ProvCrypto for RustCrypto {
    fn sha256_digest(&self, data: &[u8]) -> anyhow::Result<Sha256Digest> {
        let mut engine = Sha256::new();
        engine.update(data);
        Ok(engine.finalize().into())
    }

    fn rsa_sign(&self, priv_key: &RsaPrivKey, msg: &[u8]) -> anyhow::Result<Vec<u8>> {
        let signing_key = pss::BlindedSigningKey::<Sha256>::new(to_rsa_priv(priv_key)?);
        let sig = signing_key
            .try_sign_with_rng(&mut OsRng, msg)
            .map_err(|e| anyhow!("RSA-PSS signing failed: {e}"))?;
        Ok(sig.to_vec())
    }

    fn rsa_verify(&self, pub_key: &RsaPubKey, msg: &[u8], sig: &[u8]) -> anyhow::Result<bool> {
        let verifying_key = pss::VerifyingKey::<Sha256>::new(to_rsa_pub(pub_key)?);
        let Ok(sig) = pss::Signature::try_from(sig) else {
            return Ok(false);
        };
        Ok(verifying_key.verify(msg, &sig).is_ok())
    }

    fn rsa_generate(&self, bits: usize) -> anyhow::Result<RsaKeyPair> {
        let key = RsaPrivateKey::new(&mut OsRng, bits)
            .with_context(|| format!("Failed to generate {bits}-bit RSA key"))?;
        Ok(RsaKeyPair::from_private(from_rsa_priv(&key)?))
    }

    fn rsa_np(&self, pub_key: &RsaPubKey) -> anyhow::Result<SbCertNp> {
        let n = BigUint::from_bytes_be(&pub_key.modulus);
        if n == BigUint::from(0u32) {
            bail!("RSA modulus is zero");
        }
        let np = (BigUint::from(1u32) << (pub_key.bits() + NP_EXTRA_BITS)) / n;
        let mut result = SbCertNp::default();
        result.copy_from_slice(&to_fixed_be(&np, SB_CERT_NP_BYTE_SIZE)?);
        Ok(result)
    }

    fn aead_encrypt(
        &self,
        key: &AesKey,
        nonce: &AssetNonce,
        msg: &[u8],
        ad: &[u8],
    ) -> anyhow::Result<(Vec<u8>, AssetTag)> {
        let mut buffer = msg.to_vec();
        let tag = with_aes!(key, |Cipher, bytes| {
            <Ccm<Cipher, U16, U12> as KeyInit>::new_from_slice(bytes)
                .map_err(|_| anyhow!("Invalid AES-CCM key length"))?
                .encrypt_in_place_detached(GenericArray::from_slice(nonce), ad, &mut buffer)
                .map_err(|_| anyhow!("AES-CCM encryption failed"))?
        });
        Ok((buffer, tag.into()))
    }

    fn aead_decrypt(
        &self,
        key: &AesKey,
        nonce: &AssetNonce,
        ct: &[u8],
        tag: &AssetTag,
        ad: &[u8],
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let mut buffer = ct.to_vec();
        let result = with_aes!(key, |Cipher, bytes| {
            <Ccm<Cipher, U16, U12> as KeyInit>::new_from_slice(bytes)
                .map_err(|_| anyhow!("Invalid AES-CCM key length"))?
                .decrypt_in_place_detached(
                    GenericArray::from_slice(nonce),
                    ad,
                    &mut buffer,
                    GenericArray::from_slice(tag),
                )
        });
        Ok(result.ok().map(|_| buffer))
    }

    fn cmac(&self, key: &AesKey, msg: &[u8]) -> anyhow::Result<[u8; 16]> {
        let mac = with_aes!(key, |Cipher, bytes| {
            let mut mac = <Cmac<Cipher> as Mac>::new_from_slice(bytes)
                .map_err(|_| anyhow!("Invalid AES-CMAC key length"))?;
            mac.update(msg);
            mac.finalize().into_bytes()
        });
        Ok(mac.into())
    }

    fn kdf(
        &self,
        secret: &[u8],
        len: usize,
        salt: Option<&[u8]>,
        info: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        let mut okm = vec![0u8; len];
        Hkdf::<Sha256>::new(salt, secret)
            .expand(info, &mut okm)
            .map_err(|_| anyhow!("Cannot derive {len} bytes with HKDF-SHA-256"))?;
        Ok(okm)
    }

    fn random_bytes(&self, dest: &mut [u8]) -> anyhow::Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .context("Failed to read random bytes")
    }

    fn rsa_priv_key_to_der(&self, key: &RsaPrivKey) -> anyhow::Result<Vec<u8>> {
        Ok(to_rsa_priv(key)?.to_pkcs8_der()?.as_bytes().to_vec())
    }

    fn rsa_priv_key_from_der(&self, der: &[u8]) -> anyhow::Result<RsaPrivKey> {
        let key = RsaPrivateKey::from_pkcs8_der(der).context("Invalid PKCS#8 private key")?;
        from_rsa_priv(&key)
    }

    fn rsa_priv_key_to_pem(&self, key: &RsaPrivKey) -> anyhow::Result<String> {
        Ok(to_rsa_priv(key)?.to_pkcs8_pem(LineEnding::LF)?.to_string())
    }

    fn rsa_priv_key_from_pem(&self, pem: &str) -> anyhow::Result<RsaPrivKey> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem).context("Invalid PKCS#8 private key")?;
        from_rsa_priv(&key)
    }

    fn rsa_pub_key_to_pem(&self, key: &RsaPubKey) -> anyhow::Result<String> {
        Ok(to_rsa_pub(key)?.to_public_key_pem(LineEnding::LF)?)
    }

    fn rsa_pub_key_from_pem(&self, pem: &str) -> anyhow::Result<RsaPubKey> {
        let key = RsaPublicKey::from_public_key_pem(pem).context("Invalid SPKI public key")?;
        from_rsa_pub(&key)
    }
}
