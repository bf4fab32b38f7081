/*++

Licensed under the Apache-2.0 license.

File Name:

   keys.rs

Abstract:

    File contains key material containers.

--*/

use sensor_prov_error::{ProvError, ProvResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{KeyName, RootOfTrust, RSA_PUBLIC_EXPONENT, RSA_SUPPORTED_KEY_BITS};

/// Symmetric provisioning key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum AesKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl AesKey {
    pub fn new_from(data: &[u8]) -> ProvResult<Self> {
        let mut key = match data.len() {
            16 => AesKey::Aes128([0; 16]),
            24 => AesKey::Aes192([0; 24]),
            32 => AesKey::Aes256([0; 32]),
            size => {
                return Err(ProvError::UnsupportedSize {
                    what: "AES key",
                    size,
                })
            }
        };
        match &mut key {
            AesKey::Aes128(k) => k.copy_from_slice(data),
            AesKey::Aes192(k) => k.copy_from_slice(data),
            AesKey::Aes256(k) => k.copy_from_slice(data),
        }
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AesKey::Aes128(key) => key,
            AesKey::Aes192(key) => key,
            AesKey::Aes256(key) => key,
        }
    }

    pub fn bits(&self) -> usize {
        self.as_bytes().len() * 8
    }
}

impl core::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "AesKey({} bits)", self.bits())
    }
}

/// RSA public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaPubKey {
    /// Big-endian modulus, exactly `bits / 8` bytes
    pub modulus: Vec<u8>,

    pub exponent: u32,
}

impl RsaPubKey {
    /// Create a public key with the standard exponent
    pub fn from_modulus(modulus: &[u8]) -> Self {
        Self {
            modulus: modulus.to_vec(),
            exponent: RSA_PUBLIC_EXPONENT,
        }
    }

    pub fn bits(&self) -> usize {
        self.modulus.len() * 8
    }

    pub fn byte_size(&self) -> usize {
        self.modulus.len()
    }

    /// Fails unless the key size is one of the supported sizes
    pub fn check_supported(&self) -> ProvResult<usize> {
        let bits = self.bits();
        if RSA_SUPPORTED_KEY_BITS.contains(&bits) {
            Ok(bits)
        } else {
            Err(ProvError::UnsupportedKeySize { bits })
        }
    }
}

/// RSA private key components, all big-endian
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RsaPrivKey {
    #[zeroize(skip)]
    pub modulus: Vec<u8>,

    #[zeroize(skip)]
    pub public_exponent: u32,

    pub private_exponent: Vec<u8>,

    pub prime1: Vec<u8>,

    pub prime2: Vec<u8>,
}

impl RsaPrivKey {
    pub fn bits(&self) -> usize {
        self.modulus.len() * 8
    }

    pub fn public_key(&self) -> RsaPubKey {
        RsaPubKey {
            modulus: self.modulus.clone(),
            exponent: self.public_exponent,
        }
    }
}

impl core::fmt::Debug for RsaPrivKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RsaPrivKey({} bits)", self.bits())
    }
}

/// RSA key pair; the private half is absent when only public material
/// could be loaded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaKeyPair {
    pub public: RsaPubKey,

    pub private: Option<RsaPrivKey>,
}

impl RsaKeyPair {
    pub fn from_private(private: RsaPrivKey) -> Self {
        Self {
            public: private.public_key(),
            private: Some(private),
        }
    }

    pub fn from_public(public: RsaPubKey) -> Self {
        Self {
            public,
            private: None,
        }
    }

    pub fn bits(&self) -> usize {
        self.public.bits()
    }

    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }

    /// Drops the private half
    pub fn to_public_only(&self) -> Self {
        Self::from_public(self.public.clone())
    }
}

/// Provisioning key set
#[derive(Clone, Debug, Default)]
pub struct KeySet {
    pub krtl: Option<AesKey>,

    pub kcp: Option<AesKey>,

    pub kpicv: Option<AesKey>,

    pub rot_cm: Option<RsaKeyPair>,

    pub rot_dm: Option<RsaKeyPair>,

    pub sensor: Option<RsaKeyPair>,

    pub vendor: Option<RsaKeyPair>,
}

impl KeySet {
    /// Look up an asymmetric key pair
    pub fn pair(&self, name: KeyName) -> ProvResult<&RsaKeyPair> {
        let pair = match name {
            KeyName::SensorPair => &self.sensor,
            KeyName::VendorPair => &self.vendor,
            KeyName::RotCmPair => &self.rot_cm,
            KeyName::RotDmPair => &self.rot_dm,
            KeyName::Kpicv | KeyName::Kcp => {
                return Err(ProvError::InvalidKeyName(format!(
                    "{name} is not an asymmetric key"
                )))
            }
        };
        pair.as_ref().ok_or(ProvError::MissingKey(name.as_str()))
    }

    /// Look up the private half of an asymmetric key pair
    pub fn private_key(&self, name: KeyName) -> ProvResult<&RsaPrivKey> {
        self.pair(name)?
            .private
            .as_ref()
            .ok_or(ProvError::MissingPrivateKey(name.as_str()))
    }

    /// Look up a symmetric key
    pub fn symmetric(&self, name: KeyName) -> ProvResult<&AesKey> {
        let key = match name {
            KeyName::Kpicv => &self.kpicv,
            KeyName::Kcp => &self.kcp,
            KeyName::SensorPair | KeyName::VendorPair | KeyName::RotCmPair | KeyName::RotDmPair => {
                return Err(ProvError::InvalidKeyName(format!(
                    "{name} is not a symmetric key"
                )))
            }
        };
        key.as_ref().ok_or(ProvError::MissingKey(name.as_str()))
    }

    /// Symmetric key authorizing asset wrapping for a root of trust
    pub fn wrap_key(&self, root_of_trust: RootOfTrust) -> ProvResult<&AesKey> {
        let (key, name) = match root_of_trust {
            RootOfTrust::Cm => (&self.kpicv, "kpicv"),
            RootOfTrust::Dm => (&self.kcp, "kcp"),
            RootOfTrust::Cd => (&self.krtl, "krtl"),
        };
        key.as_ref().ok_or(ProvError::MissingKey(name))
    }

    /// Name of the root key pair for a root of trust
    pub fn root_pair_name(root_of_trust: RootOfTrust) -> KeyName {
        match root_of_trust {
            RootOfTrust::Cm | RootOfTrust::Cd => KeyName::RotCmPair,
            RootOfTrust::Dm => KeyName::RotDmPair,
        }
    }

    /// Returns a copy holding only public material
    pub fn to_public_only(&self) -> Self {
        Self {
            krtl: None,
            kcp: None,
            kpicv: None,
            rot_cm: self.rot_cm.as_ref().map(RsaKeyPair::to_public_only),
            rot_dm: self.rot_dm.as_ref().map(RsaKeyPair::to_public_only),
            sensor: self.sensor.as_ref().map(RsaKeyPair::to_public_only),
            vendor: self.vendor.as_ref().map(RsaKeyPair::to_public_only),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_pair(bits: usize) -> RsaKeyPair {
        RsaKeyPair::from_public(RsaPubKey::from_modulus(&vec![0xA5; bits / 8]))
    }

    #[test]
    fn test_aes_key_sizes() {
        assert_eq!(AesKey::new_from(&[0u8; 16]).unwrap().bits(), 128);
        assert_eq!(AesKey::new_from(&[0u8; 24]).unwrap().bits(), 192);
        assert_eq!(AesKey::new_from(&[0u8; 32]).unwrap().bits(), 256);
        assert!(matches!(
            AesKey::new_from(&[0u8; 20]),
            Err(ProvError::UnsupportedSize { size: 20, .. })
        ));
    }

    #[test]
    fn test_aes_key_debug_hides_material() {
        let key = AesKey::new_from(b"cafebabedeadbeef").unwrap();
        assert_eq!(format!("{key:?}"), "AesKey(128 bits)");
    }

    #[test]
    fn test_pub_key_supported_sizes() {
        for bits in RSA_SUPPORTED_KEY_BITS {
            assert_eq!(dummy_pair(bits).public.check_supported().unwrap(), bits);
        }
        assert!(matches!(
            dummy_pair(1024).public.check_supported(),
            Err(ProvError::UnsupportedKeySize { bits: 1024 })
        ));
    }

    #[test]
    fn test_wrap_key_mapping() {
        let keys = KeySet {
            krtl: Some(AesKey::Aes128([1; 16])),
            kcp: Some(AesKey::Aes128([2; 16])),
            kpicv: Some(AesKey::Aes128([3; 16])),
            ..Default::default()
        };
        assert_eq!(keys.wrap_key(RootOfTrust::Cm).unwrap().as_bytes(), &[3; 16]);
        assert_eq!(keys.wrap_key(RootOfTrust::Dm).unwrap().as_bytes(), &[2; 16]);
        assert_eq!(keys.wrap_key(RootOfTrust::Cd).unwrap().as_bytes(), &[1; 16]);
        assert!(matches!(
            KeySet::default().wrap_key(RootOfTrust::Cd),
            Err(ProvError::MissingKey("krtl"))
        ));
    }

    #[test]
    fn test_lookups_reject_wrong_kind() {
        let keys = KeySet {
            sensor: Some(dummy_pair(2048)),
            kcp: Some(AesKey::Aes128([2; 16])),
            ..Default::default()
        };
        assert!(keys.pair(KeyName::SensorPair).is_ok());
        assert!(matches!(
            keys.pair(KeyName::Kcp),
            Err(ProvError::InvalidKeyName(_))
        ));
        assert!(matches!(
            keys.symmetric(KeyName::SensorPair),
            Err(ProvError::InvalidKeyName(_))
        ));
        assert!(matches!(
            keys.private_key(KeyName::SensorPair),
            Err(ProvError::MissingPrivateKey("sensor_pair"))
        ));
        assert!(matches!(
            keys.pair(KeyName::VendorPair),
            Err(ProvError::MissingKey("vendor_pair"))
        ));
    }

    #[test]
    fn test_root_pair_name() {
        assert_eq!(KeySet::root_pair_name(RootOfTrust::Cm), KeyName::RotCmPair);
        assert_eq!(KeySet::root_pair_name(RootOfTrust::Cd), KeyName::RotCmPair);
        assert_eq!(KeySet::root_pair_name(RootOfTrust::Dm), KeyName::RotDmPair);
    }
}
