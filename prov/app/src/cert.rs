/*++

Licensed under the Apache-2.0 license.

File Name:

   cert.rs

Abstract:

    File contains the certificate commands.

--*/

use std::path::Path;

use anyhow::Context;
use sensor_prov_crypto::RustCrypto;
use sensor_prov_gen::{AssetWrapper, ProvCrypto, RsaCertParams, RsaPublicCert, SecureBootCert};
use sensor_prov_serde::{NvmRecord, RsaPublicCertRecord};
use sensor_prov_types::{KeyName, KeySet, RsaKeyPair};

use crate::config::load_entitlement_config;
use crate::keys::load_keys;

/// Run the pubkey-cert command
pub(crate) fn pubkey_cert(
    key_dir: &Path,
    password_file: Option<&Path>,
    key: KeyName,
    signer: Option<KeyName>,
    params: RsaCertParams,
    record: bool,
    out: &Path,
) -> anyhow::Result<()> {
    let crypto = RustCrypto::default();
    let keys = load_keys(&crypto, key_dir, password_file)?;
    let subject = keys.pair(key)?;
    let signer = signer.map(|name| keys.pair(name)).transpose()?;

    let cert = RsaPublicCert::build(&crypto, subject, signer, params, true)?;
    let mut bytes = cert.serialize()?;
    if record {
        bytes = NvmRecord::RsaPublicCert(RsaPublicCertRecord::new(&bytes)?).to_bytes()?;
    }
    std::fs::write(out, bytes).with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(())
}

fn load_developer_key(crypto: &RustCrypto, path: &Path) -> anyhow::Result<RsaKeyPair> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read developer key {}", path.display()))?;
    let key = crypto
        .rsa_priv_key_from_pem(&pem)
        .with_context(|| format!("Failed to parse developer key {}", path.display()))?;
    Ok(RsaKeyPair::from_private(key))
}

/// Build the entitlement and check it verifies back to the root key
fn build_entitlement(
    crypto: &RustCrypto,
    keys: &KeySet,
    config_path: &Path,
    developer: Option<&RsaKeyPair>,
) -> anyhow::Result<Vec<u8>> {
    let config = load_entitlement_config(config_path)?;
    let root_of_trust = config.root_of_trust()?;
    let params = config.params()?;

    let wrapper = AssetWrapper::new(crypto, keys, root_of_trust);
    let bytes = wrapper.create_debug_entitlement(&params, developer)?;

    let root = keys.pair(KeySet::root_pair_name(root_of_trust))?;
    let root_hash = SecureBootCert::rsa_pubkey_hash(crypto, &root.public)?;
    let certs = SecureBootCert::parse_chain(&bytes)?;
    SecureBootCert::verify_chain(crypto, &certs, Some(&root_hash))
        .context("Generated entitlement does not verify")?;
    log::debug!("Entitlement chain of {} certificates verified", certs.len());
    Ok(bytes)
}

/// Run the debug-entitlement command
pub(crate) fn debug_entitlement(
    key_dir: &Path,
    password_file: Option<&Path>,
    config_path: &Path,
    developer_key: Option<&Path>,
    out: &Path,
) -> anyhow::Result<()> {
    let crypto = RustCrypto::default();
    let keys = load_keys(&crypto, key_dir, password_file)?;
    let developer = developer_key
        .map(|path| load_developer_key(&crypto, path))
        .transpose()?;

    let bytes = build_entitlement(&crypto, &keys, config_path, developer.as_ref())?;
    std::fs::write(out, bytes).with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(())
}
