/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the crypto capability and the generators for sensor
    provisioning artifacts.

--*/

mod asset;
mod rsa_cert;
mod sb_cert;

pub use asset::{AssetWrapper, NonceSource};
pub use rsa_cert::{RsaCertParams, RsaPublicCert};
pub use sb_cert::{DebugEntitlementParams, SbCert, SbCertBody, SecureBootCert};

use sensor_prov_types::*;

/// Provisioning Crypto Trait
pub trait ProvCrypto {
    /// Calculate SHA-256 digest
    fn sha256_digest(&self, data: &[u8]) -> anyhow::Result<Sha256Digest>;

    /// Calculate an RSASSA-PSS (SHA-256) signature, big-endian
    fn rsa_sign(&self, priv_key: &RsaPrivKey, msg: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Verify an RSASSA-PSS (SHA-256) signature, big-endian
    fn rsa_verify(&self, pub_key: &RsaPubKey, msg: &[u8], sig: &[u8]) -> anyhow::Result<bool>;

    /// Generate an RSA key pair with the standard public exponent
    fn rsa_generate(&self, bits: usize) -> anyhow::Result<RsaKeyPair>;

    /// Calculate the hardware reduction constant `floor(2^(bits + 132) / N)`
    fn rsa_np(&self, pub_key: &RsaPubKey) -> anyhow::Result<SbCertNp>;

    /// Encrypt with AES-CCM
    fn aead_encrypt(
        &self,
        key: &AesKey,
        nonce: &AssetNonce,
        msg: &[u8],
        ad: &[u8],
    ) -> anyhow::Result<(Vec<u8>, AssetTag)>;

    /// Decrypt with AES-CCM. Returns `None` if the tag does not verify.
    fn aead_decrypt(
        &self,
        key: &AesKey,
        nonce: &AssetNonce,
        ct: &[u8],
        tag: &AssetTag,
        ad: &[u8],
    ) -> anyhow::Result<Option<Vec<u8>>>;

    /// Calculate AES-CMAC
    fn cmac(&self, key: &AesKey, msg: &[u8]) -> anyhow::Result<[u8; 16]>;

    /// Derive `len` bytes with HKDF-SHA-256
    fn kdf(
        &self,
        secret: &[u8],
        len: usize,
        salt: Option<&[u8]>,
        info: &[u8],
    ) -> anyhow::Result<Vec<u8>>;

    /// Fill `dest` with cryptographically strong random bytes
    fn random_bytes(&self, dest: &mut [u8]) -> anyhow::Result<()>;

    /// Encode a private key as PKCS#8 DER
    fn rsa_priv_key_to_der(&self, key: &RsaPrivKey) -> anyhow::Result<Vec<u8>>;

    /// Decode a PKCS#8 DER private key
    fn rsa_priv_key_from_der(&self, der: &[u8]) -> anyhow::Result<RsaPrivKey>;

    /// Encode a private key as PKCS#8 PEM
    fn rsa_priv_key_to_pem(&self, key: &RsaPrivKey) -> anyhow::Result<String>;

    /// Decode a PKCS#8 PEM private key
    fn rsa_priv_key_from_pem(&self, pem: &str) -> anyhow::Result<RsaPrivKey>;

    /// Encode a public key as SPKI PEM
    fn rsa_pub_key_to_pem(&self, key: &RsaPubKey) -> anyhow::Result<String>;

    /// Decode an SPKI PEM public key
    fn rsa_pub_key_from_pem(&self, pem: &str) -> anyhow::Result<RsaPubKey>;
}

/// Converts between the signature primitive's byte order and the wire order
pub(crate) fn reversed(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}
