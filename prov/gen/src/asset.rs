/*++

Licensed under the Apache-2.0 license.

File Name:

   asset.rs

Abstract:

    File contains the asset wrapping engine.

--*/

use log::{debug, info};
use sensor_prov_error::{ProvError, ProvResult};
use sensor_prov_serde::{NvmRecord, RsaPrivateKeyRecord};
use sensor_prov_types::*;
use zerocopy::{FromBytes, IntoBytes};

use crate::{DebugEntitlementParams, ProvCrypto, SecureBootCert};

const PACKAGE: &str = "asset package";

/// Label and separator framing the provisioning key derivation input
const KPROV_LABEL: &[u8] = &[0x01, b'P', 0x00];
const KPROV_LENGTH: &[u8] = &[0x80];

/// Where asset nonces come from
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NonceSource {
    /// Fresh random nonce for every package
    #[default]
    Random,

    /// Same nonce for every package; only for reproducing test vectors
    Fixed(AssetNonce),
}

/// Asset wrapping engine
///
/// Wraps payloads under the symmetric key authorizing the configured root
/// of trust. The package is
/// `header(20) ‖ nonce(12) ‖ ciphertext ‖ tag(16)`, encrypted with AES-CCM
/// under a provisioning key derived from the wrap key and the asset id.
pub struct AssetWrapper<'a, Crypto: ProvCrypto> {
    crypto: &'a Crypto,

    keys: &'a KeySet,

    root_of_trust: RootOfTrust,

    nonce_source: NonceSource,
}

impl<'a, Crypto: ProvCrypto> AssetWrapper<'a, Crypto> {
    pub fn new(crypto: &'a Crypto, keys: &'a KeySet, root_of_trust: RootOfTrust) -> Self {
        Self {
            crypto,
            keys,
            root_of_trust,
            nonce_source: NonceSource::Random,
        }
    }

    pub fn with_nonce_source(mut self, nonce_source: NonceSource) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// Symmetric key authorizing asset wrapping for `root_of_trust`
    pub fn select_wrap_key(&self, root_of_trust: RootOfTrust) -> ProvResult<&'a AesKey> {
        self.keys.wrap_key(root_of_trust)
    }

    /// Wrap `payload` under the configured root of trust
    pub fn encrypt_asset(&self, asset_id: u32, payload: &[u8]) -> ProvResult<Vec<u8>> {
        let key = self.select_wrap_key(self.root_of_trust)?;
        let package = self.wrap_package(key, &asset_id.to_le_bytes(), payload)?;
        info!(
            "Wrapped asset {asset_id:#010x} ({} bytes) for root of trust {}",
            payload.len(),
            self.root_of_trust
        );
        Ok(package)
    }

    /// Unwrap a package produced by [`AssetWrapper::encrypt_asset`]
    pub fn decrypt_asset(&self, asset_id: u32, package: &[u8]) -> ProvResult<Vec<u8>> {
        let key = self.select_wrap_key(self.root_of_trust)?;
        self.unwrap_package(key, &asset_id.to_le_bytes(), package)
    }

    /// Wrap a stored key for transfer to the device.
    ///
    /// RSA pairs travel as a private key record, `kcp` as its raw bytes.
    /// `kpicv` is always wrapped under `krtl`, whatever the root of trust,
    /// and its `asset_id` is the 128-bit HBK0 value rather than a 32-bit id.
    pub fn encrypt_private_key(&self, key_name: KeyName, asset_id: u128) -> ProvResult<Vec<u8>> {
        if key_name == KeyName::Kpicv {
            let krtl = self.select_wrap_key(RootOfTrust::Cd)?;
            let kpicv = self.keys.symmetric(KeyName::Kpicv)?;
            let package =
                self.wrap_package(krtl, &asset_id.to_le_bytes(), kpicv.as_bytes())?;
            info!("Wrapped kpicv under krtl");
            return Ok(package);
        }

        let asset_id = u32::try_from(asset_id).map_err(|_| ProvError::FieldOverflow {
            field: "asset_id",
            value: asset_id,
            bits: u32::BITS,
        })?;
        let payload = if key_name.is_pair() {
            let record = RsaPrivateKeyRecord::new(self.keys.private_key(key_name)?)?;
            NvmRecord::RsaPrivateKey(record).to_bytes()?
        } else {
            self.keys.symmetric(key_name)?.as_bytes().to_vec()
        };
        debug!("Wrapping {key_name} as asset {asset_id:#010x}");
        self.encrypt_asset(asset_id, &payload)
    }

    /// Sign `blob` with the private half of `key_name`, returning the
    /// big-endian signature
    pub fn sign_rsassa_pss(&self, key_name: KeyName, blob: &[u8]) -> ProvResult<Vec<u8>> {
        let priv_key = self.keys.private_key(key_name)?;
        Ok(self.crypto.rsa_sign(priv_key, blob)?)
    }

    pub fn get_public_key(&self, key_name: KeyName) -> ProvResult<&'a RsaPubKey> {
        Ok(&self.keys.pair(key_name)?.public)
    }

    /// Build a debug entitlement for the configured root of trust.
    ///
    /// CM and CD entitlements chain to HBK0 through the CM root pair, DM
    /// entitlements to HBK1 through the DM root pair.
    pub fn create_debug_entitlement(
        &self,
        params: &DebugEntitlementParams,
        developer: Option<&RsaKeyPair>,
    ) -> ProvResult<Vec<u8>> {
        let hbk_id = match self.root_of_trust {
            RootOfTrust::Cm | RootOfTrust::Cd => HbkId::Hbk0,
            RootOfTrust::Dm => HbkId::Hbk1,
        };
        let root = self.keys.pair(KeySet::root_pair_name(self.root_of_trust))?;
        SecureBootCert::debug_entitlement(self.crypto, root, hbk_id, developer, params)
    }

    fn nonce(&self) -> ProvResult<AssetNonce> {
        match self.nonce_source {
            NonceSource::Random => {
                let mut nonce = AssetNonce::default();
                self.crypto.random_bytes(&mut nonce)?;
                Ok(nonce)
            }
            NonceSource::Fixed(nonce) => Ok(nonce),
        }
    }

    /// Derive the per-asset provisioning key
    fn provisioning_key(&self, wrap_key: &AesKey, context: &[u8]) -> ProvResult<AesKey> {
        let msg = [KPROV_LABEL, context, KPROV_LENGTH].concat();
        let kprov = self.crypto.cmac(wrap_key, &msg)?;
        Ok(AesKey::Aes128(kprov))
    }

    fn wrap_package(
        &self,
        wrap_key: &AesKey,
        context: &[u8],
        payload: &[u8],
    ) -> ProvResult<Vec<u8>> {
        let asset_size = u32::try_from(payload.len()).map_err(|_| ProvError::UnsupportedSize {
            what: "asset",
            size: payload.len(),
        })?;
        let header = AssetPkgHeader::new(asset_size);
        let nonce = self.nonce()?;
        let kprov = self.provisioning_key(wrap_key, context)?;
        let (ct, tag) = self
            .crypto
            .aead_encrypt(&kprov, &nonce, payload, header.as_bytes())?;

        let mut package = Vec::with_capacity(
            ASSET_PKG_HEADER_BYTE_SIZE + ASSET_NONCE_BYTE_SIZE + ct.len() + ASSET_TAG_BYTE_SIZE,
        );
        package.extend_from_slice(header.as_bytes());
        package.extend_from_slice(&nonce);
        package.extend_from_slice(&ct);
        package.extend_from_slice(&tag);
        Ok(package)
    }

    fn unwrap_package(
        &self,
        wrap_key: &AesKey,
        context: &[u8],
        package: &[u8],
    ) -> ProvResult<Vec<u8>> {
        let min_size = ASSET_PKG_HEADER_BYTE_SIZE + ASSET_NONCE_BYTE_SIZE + ASSET_TAG_BYTE_SIZE;
        if package.len() < min_size {
            return Err(ProvError::malformed(
                PACKAGE,
                format!("{} bytes, at least {min_size} required", package.len()),
            ));
        }
        let (header_bytes, rest) = package.split_at(ASSET_PKG_HEADER_BYTE_SIZE);
        let (nonce, rest) = rest.split_at(ASSET_NONCE_BYTE_SIZE);
        let (ct, tag) = rest.split_at(rest.len() - ASSET_TAG_BYTE_SIZE);
        let nonce = AssetNonce::read_from_bytes(nonce)
            .map_err(|_| ProvError::malformed(PACKAGE, "truncated nonce"))?;
        let tag = AssetTag::read_from_bytes(tag)
            .map_err(|_| ProvError::malformed(PACKAGE, "truncated tag"))?;

        let kprov = self.provisioning_key(wrap_key, context)?;
        let payload = self
            .crypto
            .aead_decrypt(&kprov, &nonce, ct, &tag, header_bytes)?
            .ok_or(ProvError::Authentication)?;

        let header = AssetPkgHeader::read_from_bytes(header_bytes)
            .map_err(|_| ProvError::malformed(PACKAGE, "truncated header"))?;
        if header.token.get() != ASSET_PKG_TOKEN || header.version.get() != ASSET_PKG_VERSION {
            return Err(ProvError::malformed(
                PACKAGE,
                format!(
                    "unexpected token {:#010x} version {:#010x}",
                    header.token.get(),
                    header.version.get()
                ),
            ));
        }
        if header.asset_size.get() as usize != payload.len() {
            return Err(ProvError::malformed(
                PACKAGE,
                format!(
                    "header declares {} bytes, package carries {}",
                    header.asset_size.get(),
                    payload.len()
                ),
            ));
        }
        Ok(payload)
    }
}
