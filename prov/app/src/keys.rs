/*++

Licensed under the Apache-2.0 license.

File Name:

   keys.rs

Abstract:

    File contains the key directory commands and helpers.

--*/

use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context};
use sensor_prov_crypto::RustCrypto;
use sensor_prov_keystore::KeyStore;
use sensor_prov_types::KeySet;
use zeroize::Zeroizing;

/// Read the raw password held in an optional password file
pub(crate) fn read_password(
    crypto: &RustCrypto,
    password_file: Option<&Path>,
) -> anyhow::Result<Option<Zeroizing<Vec<u8>>>> {
    let Some(path) = password_file else {
        return Ok(None);
    };
    let password = KeyStore::new(crypto)
        .get_raw_password(path)
        .with_context(|| format!("Failed to read password file {}", path.display()))?;
    Ok(Some(password))
}

/// Load the key directory, warning when only public keys are available
pub(crate) fn load_keys(
    crypto: &RustCrypto,
    dir: &Path,
    password_file: Option<&Path>,
) -> anyhow::Result<KeySet> {
    let password = read_password(crypto, password_file)?;
    let mut store = KeyStore::new(crypto);
    let loaded_private = store
        .load(dir, password.as_deref().map(Vec::as_slice))
        .with_context(|| format!("Failed to load keys from {}", dir.display()))?;
    if !loaded_private {
        log::warn!("Continuing with public keys only");
    }
    Ok(store.into_keys())
}

/// Run the gen-keys command
pub(crate) fn gen_keys(
    out: &Path,
    test_keys: bool,
    password_file: Option<&Path>,
) -> anyhow::Result<()> {
    let crypto = RustCrypto::default();
    let password = read_password(&crypto, password_file)?;
    let store = if test_keys {
        KeyStore::default_test_keys(&crypto)?
    } else {
        let mut store = KeyStore::new(&crypto);
        store.generate_random()?;
        store
    };
    store
        .save(out, password.as_deref().map(Vec::as_slice))
        .with_context(|| format!("Failed to save keys to {}", out.display()))?;
    Ok(())
}

/// Run the store-password command
pub(crate) fn store_password(password_file: &Path) -> anyhow::Result<()> {
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read the password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("Empty password");
    }

    let crypto = RustCrypto::default();
    KeyStore::new(&crypto)
        .store_password(password_file, password.as_bytes())
        .with_context(|| format!("Failed to write {}", password_file.display()))?;
    log::info!("Stored password in {}", password_file.display());
    Ok(())
}
