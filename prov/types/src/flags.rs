/*++

Licensed under the Apache-2.0 license.

File Name:

   flags.rs

Abstract:

    File contains the bit-field layouts of the packed flag words used by the
    certificate and OTPM formats.

--*/

use bitfield::bitfield;
use sensor_prov_error::{ProvError, ProvResult};

pub const RSA_CERT_PURPOSE_BITS: u32 = 2;
pub const RSA_CERT_AUTHORITY_BITS: u32 = 2;
pub const RSA_CERT_VERSION_BITS: u32 = 2;
pub const RSA_CERT_NUMBER_BITS: u32 = 26;

bitfield! {
    /// RSA public certificate flags
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct RsaCertFlags(u32);
    impl Debug;

    pub u32, purpose, set_purpose: 1, 0;

    pub u32, authority, set_authority: 3, 2;

    pub u32, version, set_version: 5, 4;

    pub u32, number, set_number: 31, 6;
}

bitfield! {
    /// Secure boot certificate flags
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct SbCertFlags(u32);
    impl Debug;

    /// Hardware key hash slot
    pub u32, hbk_id, set_hbk_id: 3, 0;

    /// Life-cycle state
    pub u32, lcs, set_lcs: 7, 4;

    /// RMA entitlement
    pub bool, rma, set_rma: 8;
}

bitfield! {
    /// OTPM record header word
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct OtpmHeaderWord(u32);
    impl Debug;

    pub u32, asset_type, set_asset_type: 15, 0;

    /// Record length in words, header excluded
    pub u32, length, set_length: 31, 16;
}

/// Checks that `value` fits in a field `bits` wide
pub fn check_field_width(field: &'static str, value: u32, bits: u32) -> ProvResult<u32> {
    if bits < u32::BITS && value >> bits != 0 {
        return Err(ProvError::FieldOverflow {
            field,
            value: value.into(),
            bits,
        });
    }
    Ok(value)
}

impl RsaCertFlags {
    /// Packs the certificate metadata, validating every field width
    pub fn pack(authority: u32, purpose: u32, version: u32, number: u32) -> ProvResult<Self> {
        let mut flags = RsaCertFlags(0);
        flags.set_purpose(check_field_width("purpose", purpose, RSA_CERT_PURPOSE_BITS)?);
        flags.set_authority(check_field_width(
            "authority",
            authority,
            RSA_CERT_AUTHORITY_BITS,
        )?);
        flags.set_version(check_field_width("version", version, RSA_CERT_VERSION_BITS)?);
        flags.set_number(check_field_width("number", number, RSA_CERT_NUMBER_BITS)?);
        Ok(flags)
    }
}

impl OtpmHeaderWord {
    pub fn new(asset_type: u16, length: u16) -> Self {
        let mut word = OtpmHeaderWord(0);
        word.set_asset_type(asset_type.into());
        word.set_length(length.into());
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_cert_flags_layout() {
        let flags = RsaCertFlags::pack(2, 1, 3, 0x3ff_ffff).unwrap();
        assert_eq!(flags.0, 0xffff_fff9);
        assert_eq!(flags.purpose(), 1);
        assert_eq!(flags.authority(), 2);
        assert_eq!(flags.version(), 3);
        assert_eq!(flags.number(), 0x3ff_ffff);

        let flags = RsaCertFlags::pack(0, 0, 0, 1).unwrap();
        assert_eq!(flags.0, 1 << 6);
    }

    #[test]
    fn test_rsa_cert_flags_overflow() {
        assert!(matches!(
            RsaCertFlags::pack(4, 0, 0, 0),
            Err(ProvError::FieldOverflow {
                field: "authority",
                bits: 2,
                ..
            })
        ));
        assert!(matches!(
            RsaCertFlags::pack(0, 0, 0, 1 << 26),
            Err(ProvError::FieldOverflow { field: "number", .. })
        ));
    }

    #[test]
    fn test_sb_cert_flags_layout() {
        let mut flags = SbCertFlags(0);
        flags.set_hbk_id(0xF);
        flags.set_lcs(5);
        flags.set_rma(true);
        assert_eq!(flags.0, 0x15F);
        assert!(SbCertFlags(0x100).rma());
        assert_eq!(SbCertFlags(0x71).lcs(), 7);
        assert_eq!(SbCertFlags(0x71).hbk_id(), 1);
    }

    #[test]
    fn test_otpm_header_word() {
        let word = OtpmHeaderWord::new(0x0003, 0x0102);
        assert_eq!(word.0, 0x0102_0003);
        assert_eq!(OtpmHeaderWord(0xffff_0001).length(), 0xffff);
        assert_eq!(OtpmHeaderWord(0xffff_0001).asset_type(), 1);
    }
}
