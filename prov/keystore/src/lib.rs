/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the key material store: loading and saving key sets with
    password based wrapping.

--*/

mod envelope;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use sensor_prov_error::{ProvError, ProvResult};
use sensor_prov_gen::ProvCrypto;
use sensor_prov_types::*;
use zeroize::Zeroizing;

use envelope::Envelope;

const PASSWORD_FILE_SALT: &[u8] = b"sensor-prov password file";

/// Files making up a stored key set
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum KeyFile {
    Krtl,
    Kcp,
    Kpicv,
    RotCm,
    RotDm,
    Sensor,
    Vendor,
}

impl KeyFile {
    const SYMMETRIC: [KeyFile; 3] = [KeyFile::Krtl, KeyFile::Kcp, KeyFile::Kpicv];

    const PAIRS: [KeyFile; 4] = [
        KeyFile::RotCm,
        KeyFile::RotDm,
        KeyFile::Sensor,
        KeyFile::Vendor,
    ];

    fn stem(&self) -> &'static str {
        match self {
            KeyFile::Krtl => "krtl",
            KeyFile::Kcp => "kcp",
            KeyFile::Kpicv => "kpicv",
            KeyFile::RotCm => "rot_cm",
            KeyFile::RotDm => "rot_dm",
            KeyFile::Sensor => "sensor",
            KeyFile::Vendor => "vendor",
        }
    }

    fn private_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.key", self.stem()))
    }

    fn public_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.pub.pem", self.stem()))
    }

    fn symmetric<'k>(&self, keys: &'k mut KeySet) -> Option<&'k mut Option<AesKey>> {
        match self {
            KeyFile::Krtl => Some(&mut keys.krtl),
            KeyFile::Kcp => Some(&mut keys.kcp),
            KeyFile::Kpicv => Some(&mut keys.kpicv),
            KeyFile::RotCm | KeyFile::RotDm | KeyFile::Sensor | KeyFile::Vendor => None,
        }
    }

    fn pair<'k>(&self, keys: &'k mut KeySet) -> Option<&'k mut Option<RsaKeyPair>> {
        match self {
            KeyFile::RotCm => Some(&mut keys.rot_cm),
            KeyFile::RotDm => Some(&mut keys.rot_dm),
            KeyFile::Sensor => Some(&mut keys.sensor),
            KeyFile::Vendor => Some(&mut keys.vendor),
            KeyFile::Krtl | KeyFile::Kcp | KeyFile::Kpicv => None,
        }
    }

    /// Generation size in bits
    fn generated_bits(&self) -> usize {
        match self {
            KeyFile::Krtl | KeyFile::Kcp | KeyFile::Kpicv => 128,
            KeyFile::RotCm | KeyFile::RotDm => 3072,
            KeyFile::Sensor | KeyFile::Vendor => 2048,
        }
    }
}

/// Reads a file, mapping "not found" to `None`
fn read_optional(path: &Path) -> ProvResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Login name of the invoking user
fn user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

/// Key material store
pub struct KeyStore<'a, Crypto: ProvCrypto> {
    crypto: &'a Crypto,

    keys: KeySet,
}

impl<'a, Crypto: ProvCrypto> KeyStore<'a, Crypto> {
    /// Create an empty store
    pub fn new(crypto: &'a Crypto) -> Self {
        Self::from_keys(crypto, KeySet::default())
    }

    pub fn from_keys(crypto: &'a Crypto, keys: KeySet) -> Self {
        Self { crypto, keys }
    }

    /// Store holding the published test key set
    pub fn default_test_keys(crypto: &'a Crypto) -> ProvResult<Self> {
        let keys = sensor_prov_fake_keys::default_test_keys(crypto)?;
        Ok(Self::from_keys(crypto, keys))
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn into_keys(self) -> KeySet {
        self.keys
    }

    /// Replace the key set with freshly generated material
    pub fn generate_random(&mut self) -> ProvResult<()> {
        let mut keys = KeySet::default();
        for file in KeyFile::SYMMETRIC {
            let mut bytes = Zeroizing::new(vec![0u8; file.generated_bits() / 8]);
            self.crypto.random_bytes(&mut bytes)?;
            if let Some(slot) = file.symmetric(&mut keys) {
                *slot = Some(AesKey::new_from(&bytes)?);
            }
        }
        for file in KeyFile::PAIRS {
            let bits = file.generated_bits();
            debug!("Generating {bits}-bit {} key", file.stem());
            if let Some(slot) = file.pair(&mut keys) {
                *slot = Some(self.crypto.rsa_generate(bits)?);
            }
        }
        info!("Generated a new key set");
        self.keys = keys;
        Ok(())
    }

    /// Load a key set from `dir`.
    ///
    /// Returns `false` when private material could not be opened; the store
    /// then holds only the public keys. Fails only when `dir` does not exist.
    pub fn load(&mut self, dir: &Path, password: Option<&[u8]>) -> ProvResult<bool> {
        if !fs::metadata(dir)?.is_dir() {
            return Err(ProvError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("{} is not a directory", dir.display()),
            )));
        }

        let mut keys = KeySet::default();
        let loaded_private = match self.load_private(dir, password, &mut keys) {
            Ok(()) => true,
            Err(err) => {
                warn!("Private keys in {} unavailable: {err}", dir.display());
                keys = KeySet::default();
                false
            }
        };
        for file in KeyFile::PAIRS {
            let Some(slot) = file.pair(&mut keys) else {
                continue;
            };
            if slot.is_none() {
                *slot = self.load_public(&file.public_path(dir));
            }
        }

        info!(
            "Loaded keys from {}{}",
            dir.display(),
            if loaded_private { "" } else { " (public only)" }
        );
        self.keys = keys;
        Ok(loaded_private)
    }

    /// Save the key set to `dir`, creating it if necessary. Private and
    /// symmetric keys are wrapped when a password is given.
    pub fn save(&self, dir: &Path, password: Option<&[u8]>) -> ProvResult<()> {
        fs::create_dir_all(dir)?;
        let keys = &self.keys;

        let symmetric = [
            (KeyFile::Krtl, &keys.krtl),
            (KeyFile::Kcp, &keys.kcp),
            (KeyFile::Kpicv, &keys.kpicv),
        ];
        for (file, key) in symmetric {
            let Some(key) = key else {
                continue;
            };
            let contents = match password {
                Some(password) => Envelope::seal(self.crypto, password, key.as_bytes())?,
                None => key.as_bytes().to_vec(),
            };
            fs::write(file.private_path(dir), contents)?;
        }

        let pairs = [
            (KeyFile::RotCm, &keys.rot_cm),
            (KeyFile::RotDm, &keys.rot_dm),
            (KeyFile::Sensor, &keys.sensor),
            (KeyFile::Vendor, &keys.vendor),
        ];
        for (file, pair) in pairs {
            let Some(pair) = pair else {
                continue;
            };
            if let Some(private) = &pair.private {
                let contents = match password {
                    Some(password) => {
                        let der = Zeroizing::new(self.crypto.rsa_priv_key_to_der(private)?);
                        Envelope::seal(self.crypto, password, &der)?
                    }
                    None => self.crypto.rsa_priv_key_to_pem(private)?.into_bytes(),
                };
                fs::write(file.private_path(dir), contents)?;
            }
            let pem = self.crypto.rsa_pub_key_to_pem(&pair.public)?;
            fs::write(file.public_path(dir), pem)?;
        }

        info!("Saved keys to {}", dir.display());
        Ok(())
    }

    /// Write `raw` to a password file, wrapped under a key derived from
    /// the invoking user's login name
    pub fn store_password(&self, path: &Path, raw: &[u8]) -> ProvResult<()> {
        let password = self.password_file_key()?;
        fs::write(path, Envelope::seal(self.crypto, &password, raw)?)?;
        Ok(())
    }

    /// Read a password file written by [`KeyStore::store_password`]
    pub fn get_raw_password(&self, path: &Path) -> ProvResult<Zeroizing<Vec<u8>>> {
        let password = self.password_file_key()?;
        let contents = fs::read(path)?;
        Envelope::open(self.crypto, &password, &contents)
    }

    fn password_file_key(&self) -> ProvResult<Zeroizing<Vec<u8>>> {
        let user = user_name();
        Ok(Zeroizing::new(self.crypto.kdf(
            user.as_bytes(),
            16,
            Some(PASSWORD_FILE_SALT),
            b"",
        )?))
    }

    fn load_private(
        &self,
        dir: &Path,
        password: Option<&[u8]>,
        keys: &mut KeySet,
    ) -> ProvResult<()> {
        for file in KeyFile::SYMMETRIC {
            let Some(contents) = read_optional(&file.private_path(dir))? else {
                continue;
            };
            let raw = self.unwrap_contents(file, password, contents)?;
            if let Some(slot) = file.symmetric(keys) {
                *slot = Some(AesKey::new_from(&raw)?);
            }
        }

        for file in KeyFile::PAIRS {
            let Some(contents) = read_optional(&file.private_path(dir))? else {
                continue;
            };
            let private = if Envelope::is_envelope(&contents) {
                let der = self.unwrap_contents(file, password, contents)?;
                self.crypto.rsa_priv_key_from_der(&der)?
            } else {
                let pem = String::from_utf8(contents).map_err(|_| {
                    ProvError::KeyAccess(format!("{}.key is not a PEM file", file.stem()))
                })?;
                self.crypto.rsa_priv_key_from_pem(&pem)?
            };
            if let Some(slot) = file.pair(keys) {
                *slot = Some(RsaKeyPair::from_private(private));
            }
        }
        Ok(())
    }

    /// Open a password envelope, or pass through unwrapped contents
    fn unwrap_contents(
        &self,
        file: KeyFile,
        password: Option<&[u8]>,
        contents: Vec<u8>,
    ) -> ProvResult<Zeroizing<Vec<u8>>> {
        let contents = Zeroizing::new(contents);
        if !Envelope::is_envelope(&contents) {
            return Ok(contents);
        }
        let password = password.ok_or_else(|| {
            ProvError::KeyAccess(format!("{}.key needs a password", file.stem()))
        })?;
        Envelope::open(self.crypto, password, &contents)
    }

    fn load_public(&self, path: &Path) -> Option<RsaKeyPair> {
        let contents = match read_optional(path) {
            Ok(contents) => contents?,
            Err(err) => {
                warn!("Cannot read {}: {err}", path.display());
                return None;
            }
        };
        let public = String::from_utf8(contents)
            .map_err(|_| ProvError::KeyAccess("not a PEM file".into()))
            .and_then(|pem| Ok(self.crypto.rsa_pub_key_from_pem(&pem)?));
        match public {
            Ok(public) => Some(RsaKeyPair::from_public(public)),
            Err(err) => {
                warn!("Ignoring {}: {err}", path.display());
                None
            }
        }
    }
}
