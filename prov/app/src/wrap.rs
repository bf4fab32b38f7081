/*++

Licensed under the Apache-2.0 license.

File Name:

   wrap.rs

Abstract:

    File contains the asset and key wrapping commands.

--*/

use std::path::Path;

use anyhow::Context;
use sensor_prov_crypto::RustCrypto;
use sensor_prov_gen::AssetWrapper;
use sensor_prov_types::{KeyName, RootOfTrust};

use crate::keys::load_keys;

/// Run the wrap-asset command
pub(crate) fn wrap_asset(
    key_dir: &Path,
    password_file: Option<&Path>,
    root_of_trust: RootOfTrust,
    asset_id: u32,
    input: &Path,
    out: &Path,
) -> anyhow::Result<()> {
    let crypto = RustCrypto::default();
    let keys = load_keys(&crypto, key_dir, password_file)?;
    let payload = std::fs::read(input)
        .with_context(|| format!("Failed to read asset {}", input.display()))?;

    let package =
        AssetWrapper::new(&crypto, &keys, root_of_trust).encrypt_asset(asset_id, &payload)?;
    std::fs::write(out, package).with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(())
}

/// Run the wrap-key command
pub(crate) fn wrap_key(
    key_dir: &Path,
    password_file: Option<&Path>,
    root_of_trust: RootOfTrust,
    key: KeyName,
    asset_id: u128,
    out: &Path,
) -> anyhow::Result<()> {
    let crypto = RustCrypto::default();
    let keys = load_keys(&crypto, key_dir, password_file)?;
    let package =
        AssetWrapper::new(&crypto, &keys, root_of_trust).encrypt_private_key(key, asset_id)?;
    std::fs::write(out, package).with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::gen_keys;

    #[test]
    fn test_wrap_asset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let key_dir = dir.path().join("keys");
        let input = dir.path().join("asset.bin");
        let out = dir.path().join("asset.pkg");
        gen_keys(&key_dir, true, None).unwrap();
        std::fs::write(&input, b"calibration data").unwrap();

        wrap_asset(&key_dir, None, RootOfTrust::Dm, 7, &input, &out).unwrap();

        let crypto = RustCrypto::default();
        let keys = load_keys(&crypto, &key_dir, None).unwrap();
        let package = std::fs::read(&out).unwrap();
        let payload = AssetWrapper::new(&crypto, &keys, RootOfTrust::Dm)
            .decrypt_asset(7, &package)
            .unwrap();
        assert_eq!(payload, b"calibration data");
    }

    #[test]
    fn test_wrap_key_needs_private_material() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("key.pkg");
        assert!(wrap_key(
            dir.path(),
            None,
            RootOfTrust::Cm,
            KeyName::SensorPair,
            1,
            &out
        )
        .is_err());
        assert!(!out.exists());
    }
}
