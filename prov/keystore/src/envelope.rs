/*++

Licensed under the Apache-2.0 license.

File Name:

   envelope.rs

Abstract:

    File contains the password envelope protecting key files at rest.

--*/

use sensor_prov_error::{ProvError, ProvResult};
use sensor_prov_gen::ProvCrypto;
use sensor_prov_types::{AesKey, AssetNonce, AssetTag, ASSET_NONCE_BYTE_SIZE, ASSET_TAG_BYTE_SIZE};
use zeroize::Zeroizing;

const ENVELOPE_MAGIC: &[u8; 4] = b"SPKW";

const ENVELOPE_VERSION: u32 = 1;

const SALT_BYTE_SIZE: usize = 16;

const PREFIX_BYTE_SIZE: usize = ENVELOPE_MAGIC.len() + 4;

const MIN_BYTE_SIZE: usize =
    PREFIX_BYTE_SIZE + SALT_BYTE_SIZE + ASSET_NONCE_BYTE_SIZE + ASSET_TAG_BYTE_SIZE;

const KEY_FILE_INFO: &[u8] = b"sensor-prov key file";

/// Password envelope
///
/// `magic(4) ‖ version(4, LE) ‖ salt(16) ‖ nonce(12) ‖ ciphertext ‖ tag(16)`,
/// AES-CCM under a key derived from the password and salt, with the magic
/// and version as associated data.
pub(crate) struct Envelope;

impl Envelope {
    pub(crate) fn is_envelope(contents: &[u8]) -> bool {
        contents.len() >= MIN_BYTE_SIZE && contents.starts_with(ENVELOPE_MAGIC)
    }

    pub(crate) fn seal(
        crypto: &impl ProvCrypto,
        password: &[u8],
        plaintext: &[u8],
    ) -> ProvResult<Vec<u8>> {
        let mut salt = [0u8; SALT_BYTE_SIZE];
        crypto.random_bytes(&mut salt)?;
        let mut nonce = AssetNonce::default();
        crypto.random_bytes(&mut nonce)?;

        let key = Self::derive_key(crypto, password, &salt)?;
        let prefix = Self::prefix();
        let (ct, tag) = crypto.aead_encrypt(&key, &nonce, plaintext, &prefix)?;

        let mut envelope = Vec::with_capacity(MIN_BYTE_SIZE + ct.len());
        envelope.extend_from_slice(&prefix);
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&ct);
        envelope.extend_from_slice(&tag);
        Ok(envelope)
    }

    pub(crate) fn open(
        crypto: &impl ProvCrypto,
        password: &[u8],
        envelope: &[u8],
    ) -> ProvResult<Zeroizing<Vec<u8>>> {
        if !Self::is_envelope(envelope) {
            return Err(ProvError::KeyAccess("not a password envelope".into()));
        }
        let (prefix, rest) = envelope.split_at(PREFIX_BYTE_SIZE);
        if prefix != Self::prefix() {
            return Err(ProvError::KeyAccess(
                "unsupported password envelope version".into(),
            ));
        }
        let (salt, rest) = rest.split_at(SALT_BYTE_SIZE);
        let (nonce, rest) = rest.split_at(ASSET_NONCE_BYTE_SIZE);
        let (ct, tag) = rest.split_at(rest.len() - ASSET_TAG_BYTE_SIZE);

        let mut nonce_bytes = AssetNonce::default();
        nonce_bytes.copy_from_slice(nonce);
        let mut tag_bytes = AssetTag::default();
        tag_bytes.copy_from_slice(tag);

        let key = Self::derive_key(crypto, password, salt)?;
        let plaintext = crypto
            .aead_decrypt(&key, &nonce_bytes, ct, &tag_bytes, prefix)?
            .ok_or_else(|| ProvError::KeyAccess("wrong password or corrupt key file".into()))?;
        Ok(Zeroizing::new(plaintext))
    }

    fn prefix() -> [u8; PREFIX_BYTE_SIZE] {
        let mut prefix = [0u8; PREFIX_BYTE_SIZE];
        prefix[..ENVELOPE_MAGIC.len()].copy_from_slice(ENVELOPE_MAGIC);
        prefix[ENVELOPE_MAGIC.len()..].copy_from_slice(&ENVELOPE_VERSION.to_le_bytes());
        prefix
    }

    fn derive_key(crypto: &impl ProvCrypto, password: &[u8], salt: &[u8]) -> ProvResult<AesKey> {
        let bytes = Zeroizing::new(crypto.kdf(password, 16, Some(salt), KEY_FILE_INFO)?);
        AesKey::new_from(&bytes)
    }
}
