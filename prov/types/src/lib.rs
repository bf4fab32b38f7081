/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures and wire layouts for sensor provisioning
    artifacts.

--*/

mod flags;
mod keys;

use core::fmt;
use core::str::FromStr;

use sensor_prov_error::{ProvError, ProvResult};
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub use flags::*;
pub use keys::*;

pub const SHA256_DIGEST_BYTE_SIZE: usize = 32;
pub const RSA_PUBLIC_EXPONENT: u32 = 65537;
pub const RSA_SUPPORTED_KEY_BITS: [usize; 3] = [2048, 3072, 4096];

pub const RSA_CERT_TYPE_2048: u16 = 0x4332;
pub const RSA_CERT_TYPE_3072: u16 = 0x4333;
pub const RSA_CERT_TYPE_4096: u16 = 0x4334;
pub const RSA_CERT_HEADER_BYTE_SIZE: usize = core::mem::size_of::<RsaCertHeader>();

pub const SB_CERT_KEY_MAGIC: u32 = 0x53426b63;
pub const SB_CERT_ENABLER_MAGIC: u32 = 0x5364656E;
pub const SB_CERT_DEVELOPER_MAGIC: u32 = 0x53646465;
pub const SB_CERT_KEY_BITS: usize = 3072;
pub const SB_CERT_MODULUS_BYTE_SIZE: usize = SB_CERT_KEY_BITS / 8;
pub const SB_CERT_NP_BYTE_SIZE: usize = 20;
pub const SB_CERT_SIGNATURE_BYTE_SIZE: usize = SB_CERT_MODULUS_BYTE_SIZE;
pub const SB_DEBUG_MASK_BYTE_SIZE: usize = 16;
pub const SB_SOC_ID_BYTE_SIZE: usize = 32;

pub const ASSET_PKG_TOKEN: u32 = 0x41736574;
pub const ASSET_PKG_VERSION: u32 = 0x0001_0000;
pub const ASSET_NONCE_BYTE_SIZE: usize = 12;
pub const ASSET_TAG_BYTE_SIZE: usize = 16;
pub const ASSET_PKG_HEADER_BYTE_SIZE: usize = core::mem::size_of::<AssetPkgHeader>();

pub const NVM_RECORD_HEADER_BYTE_SIZE: usize = core::mem::size_of::<NvmRecordHeader>();
pub const OTPM_CONFIG_BYTE_SIZE: usize = core::mem::size_of::<OtpmConfig>();
pub const TRNG_CHARACTERIZATION_WORD_COUNT: usize = 4;

pub type Sha256Digest = [u8; SHA256_DIGEST_BYTE_SIZE];
pub type AssetNonce = [u8; ASSET_NONCE_BYTE_SIZE];
pub type AssetTag = [u8; ASSET_TAG_BYTE_SIZE];
pub type SbCertNp = [u8; SB_CERT_NP_BYTE_SIZE];
pub type DebugMask = [u8; SB_DEBUG_MASK_BYTE_SIZE];
pub type SocId = [u8; SB_SOC_ID_BYTE_SIZE];

/// Generates `as_str`, `Display` and `FromStr` for a closed selector enum.
macro_rules! selector_names {
    ($ty:ident, $err:ident, { $($variant:ident => $name:literal),* $(,)? }) => {
        impl $ty {
            /// All values, in declaration order
            pub const ALL: &'static [$ty] = &[$($ty::$variant),*];

            /// Canonical lower-case name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ProvError;

            fn from_str(s: &str) -> ProvResult<Self> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)*
                    _ => Err(ProvError::$err(s.to_string())),
                }
            }
        }
    };
}

/// Manufacturing security domain
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RootOfTrust {
    /// Chip Manufacturer
    Cm,
    /// Device Manufacturer
    Dm,
    /// Chip Designer (vendor)
    Cd,
}

selector_names!(RootOfTrust, InvalidRootOfTrust, {
    Cm => "cm",
    Dm => "dm",
    Cd => "cd",
});

/// Device life-cycle state
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LifecycleState {
    Cm,
    Dm,
    Secure,
    Rma,
}

selector_names!(LifecycleState, InvalidLifecycleState, {
    Cm => "cm",
    Dm => "dm",
    Secure => "secure",
    Rma => "rma",
});

impl LifecycleState {
    /// Hardware encoding of the state
    pub fn value(&self) -> u32 {
        match self {
            LifecycleState::Cm => 0,
            LifecycleState::Dm => 1,
            LifecycleState::Secure => 5,
            LifecycleState::Rma => 7,
        }
    }

    pub fn from_value(value: u32) -> ProvResult<Self> {
        match value {
            0 => Ok(LifecycleState::Cm),
            1 => Ok(LifecycleState::Dm),
            5 => Ok(LifecycleState::Secure),
            7 => Ok(LifecycleState::Rma),
            _ => Err(ProvError::InvalidLifecycleState(format!("{value:#x}"))),
        }
    }
}

/// Hardware public key hash slot
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum HbkId {
    Hbk0,
    Hbk1,
    Hbk,
    HbkNone,
}

impl HbkId {
    pub fn value(&self) -> u32 {
        match self {
            HbkId::Hbk0 => 0,
            HbkId::Hbk1 => 1,
            HbkId::Hbk => 2,
            HbkId::HbkNone => 0xF,
        }
    }

    pub fn from_value(value: u32) -> ProvResult<Self> {
        match value {
            0 => Ok(HbkId::Hbk0),
            1 => Ok(HbkId::Hbk1),
            2 => Ok(HbkId::Hbk),
            0xF => Ok(HbkId::HbkNone),
            _ => Err(ProvError::malformed(
                "secure boot certificate flags",
                format!("unknown HBK id {value:#x}"),
            )),
        }
    }
}

/// Names of keys a provisioning operation may address
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum KeyName {
    SensorPair,
    VendorPair,
    RotCmPair,
    RotDmPair,
    Kpicv,
    Kcp,
}

selector_names!(KeyName, InvalidKeyName, {
    SensorPair => "sensor_pair",
    VendorPair => "vendor_pair",
    RotCmPair => "rot_cm_pair",
    RotDmPair => "rot_dm_pair",
    Kpicv => "kpicv",
    Kcp => "kcp",
});

impl KeyName {
    /// Returns true if the name refers to an asymmetric key pair
    pub fn is_pair(&self) -> bool {
        match self {
            KeyName::SensorPair | KeyName::VendorPair | KeyName::RotCmPair | KeyName::RotDmPair => {
                true
            }
            KeyName::Kpicv | KeyName::Kcp => false,
        }
    }
}

/// Typed record identifiers
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NvmRecordType {
    RsaPublicCert,
    RsaPrivateKey,
    PskMasterSecret,
    TrngCharacterization,
    OtpmConfiguration,
}

impl NvmRecordType {
    pub fn code(&self) -> u16 {
        match self {
            NvmRecordType::RsaPublicCert => 1,
            NvmRecordType::RsaPrivateKey => 2,
            NvmRecordType::PskMasterSecret => 3,
            NvmRecordType::TrngCharacterization => 4,
            NvmRecordType::OtpmConfiguration => 5,
        }
    }

    pub fn from_code(code: u16) -> ProvResult<Self> {
        match code {
            1 => Ok(NvmRecordType::RsaPublicCert),
            2 => Ok(NvmRecordType::RsaPrivateKey),
            3 => Ok(NvmRecordType::PskMasterSecret),
            4 => Ok(NvmRecordType::TrngCharacterization),
            5 => Ok(NvmRecordType::OtpmConfiguration),
            _ => Err(ProvError::malformed(
                "typed record",
                format!("unknown record type {code}"),
            )),
        }
    }
}

/// RSA public certificate header
#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct RsaCertHeader {
    /// Certificate type, derived from the key size
    pub type_tag: U16,

    /// Word offset of the signature
    pub info_offset: U16,

    /// Packed purpose / authority / version / number
    pub flags: U32,
}

/// Secure boot certificate header
#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct SbCertHeader {
    pub magic: U32,

    pub cert_version: U32,

    /// Size of the signed region in bytes
    pub declared_size: U32,

    pub flags: U32,
}

/// Public key embedded in a secure boot certificate
#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Debug, Clone, Copy, Eq, PartialEq)]
pub struct SbCertPubKey {
    /// Big-endian modulus
    pub modulus: [u8; SB_CERT_MODULUS_BYTE_SIZE],

    /// Big-endian reduction constant
    pub np: SbCertNp,
}

#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct SbKeyCertBody {
    pub sw_version: U32,

    /// Hash of the enabler certificate public key
    pub pubkey_hash: Sha256Digest,
}

#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct SbEnablerCertBody {
    pub debug_enabler_mask: DebugMask,

    pub debug_enabler_lock: DebugMask,

    /// Hash of the developer certificate public key
    pub pubkey_hash: Sha256Digest,
}

#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct SbDeveloperCertBody {
    pub debug_developer_mask: DebugMask,

    pub soc_id: SocId,
}

/// Asset package header
#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct AssetPkgHeader {
    pub token: U32,

    pub version: U32,

    /// Plaintext size in bytes
    pub asset_size: U32,

    pub reserved: [U32; 2],
}

impl AssetPkgHeader {
    pub fn new(asset_size: u32) -> Self {
        Self {
            token: ASSET_PKG_TOKEN.into(),
            version: ASSET_PKG_VERSION.into(),
            asset_size: asset_size.into(),
            reserved: Default::default(),
        }
    }
}

/// Typed record header
#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct NvmRecordHeader {
    pub record_type: U16,

    /// Payload length in 32-bit words
    pub length_words: U16,
}

/// OTPM programming parameters
///
/// Timings are in controller clock cycles. The device treats the structure
/// as an opaque blob.
#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Default, Debug, Clone, Copy, Eq, PartialEq)]
pub struct OtpmConfig {
    pub program_pulse: U32,
    pub program_soak: U32,
    pub program_recovery: U32,
    pub soak_pulse: U32,
    pub soak_recovery: U32,
    pub read_setup: U32,
    pub read_hold: U32,
    pub address_setup: U32,
    pub address_hold: U32,
    pub data_setup: U32,
    pub data_hold: U32,
    pub vpp_rise: U32,
    pub vpp_fall: U32,
    pub power_up: U32,
    pub power_down: U32,
    pub program_retries: U32,
    pub soak_retries: U32,

    /// Mode register values
    pub mr_read: U32,
    pub mr_program: U32,
    pub mr_soak: U32,
    pub mr_verify: U32,
    pub mr_recovery: U32,

    pub sense_trim: U16,

    pub reserved: [u8; 2],
}
