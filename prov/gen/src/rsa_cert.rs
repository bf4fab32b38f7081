/*++

Licensed under the Apache-2.0 license.

File Name:

   rsa_cert.rs

Abstract:

    File contains the self-describing RSA public key certificate.

--*/

use log::info;
use sensor_prov_error::{ProvError, ProvResult};
use sensor_prov_types::*;
use zerocopy::{FromBytes, IntoBytes};

use crate::{reversed, ProvCrypto};

const CERT: &str = "RSA public certificate";

/// Certificate metadata
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RsaCertParams {
    /// Issuing authority, 2 bits
    pub authority: u32,

    /// Key purpose, 2 bits
    pub purpose: u32,

    /// Certificate version, 2 bits
    pub version: u32,

    /// Certificate number, 26 bits
    pub number: u32,
}

/// RSA public key certificate
///
/// Wire format: `type_tag(2) ‖ info_offset(2) ‖ flags(4) ‖ modulus ‖ signature`
/// where the modulus is big-endian and the signature is stored reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicCert {
    pub public_key: RsaPubKey,

    pub params: RsaCertParams,

    /// Signature in wire order
    pub signature: Vec<u8>,
}

/// Certificate type tag for a key size
fn type_tag(bits: usize) -> ProvResult<u16> {
    match bits {
        2048 => Ok(RSA_CERT_TYPE_2048),
        3072 => Ok(RSA_CERT_TYPE_3072),
        4096 => Ok(RSA_CERT_TYPE_4096),
        _ => Err(ProvError::UnsupportedKeySize { bits }),
    }
}

impl RsaPublicCert {
    /// Build a certificate for `subject`.
    ///
    /// The certificate is signed by `signer`, or by `subject` itself when no
    /// signer is given. Without `autosign` the signature field is zero.
    pub fn build(
        crypto: &impl ProvCrypto,
        subject: &RsaKeyPair,
        signer: Option<&RsaKeyPair>,
        params: RsaCertParams,
        autosign: bool,
    ) -> ProvResult<Self> {
        let bits = subject.public.check_supported()?;
        let mut cert = Self {
            public_key: subject.public.clone(),
            params,
            signature: vec![0u8; bits / 8],
        };

        if autosign {
            let signer = signer.unwrap_or(subject);
            if signer.bits() != bits {
                return Err(ProvError::KeySizeMismatch {
                    signer: signer.bits(),
                    subject: bits,
                });
            }
            let priv_key = signer
                .private
                .as_ref()
                .ok_or(ProvError::MissingPrivateKey("certificate signer"))?;
            let sig = crypto.rsa_sign(priv_key, &cert.signed_bytes()?)?;
            cert.signature = reversed(&sig);
        }

        info!(
            "Built {bits}-bit public key certificate number {}",
            params.number
        );
        Ok(cert)
    }

    pub fn header(&self) -> ProvResult<RsaCertHeader> {
        let bits = self.public_key.bits();
        let flags = RsaCertFlags::pack(
            self.params.authority,
            self.params.purpose,
            self.params.version,
            self.params.number,
        )?;
        let info_offset = (RSA_CERT_HEADER_BYTE_SIZE + bits / 8) / 4;
        Ok(RsaCertHeader {
            type_tag: type_tag(bits)?.into(),
            info_offset: (info_offset as u16).into(),
            flags: flags.0.into(),
        })
    }

    /// Bytes covered by the signature: header followed by modulus
    pub fn signed_bytes(&self) -> ProvResult<Vec<u8>> {
        let header = self.header()?;
        Ok([header.as_bytes(), &self.public_key.modulus].concat())
    }

    pub fn serialize(&self) -> ProvResult<Vec<u8>> {
        if self.signature.len() != self.public_key.byte_size() {
            return Err(ProvError::malformed(
                CERT,
                format!(
                    "signature is {} bytes, modulus is {}",
                    self.signature.len(),
                    self.public_key.byte_size()
                ),
            ));
        }
        let mut bytes = self.signed_bytes()?;
        bytes.extend_from_slice(&self.signature);
        Ok(bytes)
    }

    /// Decode the certificate structure without checking the signature
    pub fn parse(bytes: &[u8]) -> ProvResult<Self> {
        let (header, rest) = RsaCertHeader::read_from_prefix(bytes)
            .map_err(|_| ProvError::malformed(CERT, "truncated header"))?;

        let signature_offset = usize::from(header.info_offset.get()) * 4;
        let size = signature_offset
            .checked_sub(RSA_CERT_HEADER_BYTE_SIZE)
            .ok_or_else(|| ProvError::malformed(CERT, "info offset inside the header"))?;
        if rest.len() != 2 * size {
            return Err(ProvError::malformed(
                CERT,
                format!(
                    "expected {} bytes, found {}",
                    RSA_CERT_HEADER_BYTE_SIZE + 2 * size,
                    bytes.len()
                ),
            ));
        }
        let (modulus, signature) = rest.split_at(size);

        let flags = RsaCertFlags(header.flags.get());
        Ok(Self {
            public_key: RsaPubKey::from_modulus(modulus),
            params: RsaCertParams {
                authority: flags.authority(),
                purpose: flags.purpose(),
                version: flags.version(),
                number: flags.number(),
            },
            signature: signature.to_vec(),
        })
    }

    /// Decode a certificate and check its signature.
    ///
    /// The signature is checked against `validation_key`, or against the
    /// certificate's own key when none is given. The header is re-encoded
    /// from the decoded fields and must match the input.
    pub fn parse_and_validate(
        crypto: &impl ProvCrypto,
        validation_key: Option<&RsaPubKey>,
        bytes: &[u8],
    ) -> ProvResult<Self> {
        let cert = Self::parse(bytes)?;
        cert.public_key.check_supported()?;

        let key = validation_key.unwrap_or(&cert.public_key);
        let signed = &bytes[..RSA_CERT_HEADER_BYTE_SIZE + cert.public_key.byte_size()];
        if !crypto.rsa_verify(key, signed, &reversed(&cert.signature))? {
            return Err(ProvError::SignatureMismatch(CERT));
        }

        if cert.header()?.as_bytes() != &bytes[..RSA_CERT_HEADER_BYTE_SIZE] {
            return Err(ProvError::IntegrityMismatch(CERT));
        }
        Ok(cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_cert(bits: usize) -> RsaPublicCert {
        RsaPublicCert {
            public_key: RsaPubKey::from_modulus(&vec![0xB7; bits / 8]),
            params: RsaCertParams {
                authority: 1,
                purpose: 2,
                version: 3,
                number: 0x2a,
            },
            signature: vec![0; bits / 8],
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = unsigned_cert(2048).serialize().unwrap();
        assert_eq!(bytes.len(), 8 + 512);
        assert_eq!(
            bytes[..8],
            [0x32, 0x43, 0x42, 0x00, 0xb6, 0x0a, 0x00, 0x00]
        );
        assert_eq!(bytes[8..264], [0xB7; 256]);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(type_tag(2048).unwrap(), 0x4332);
        assert_eq!(type_tag(3072).unwrap(), 0x4333);
        assert_eq!(type_tag(4096).unwrap(), 0x4334);
        assert!(matches!(
            type_tag(1024),
            Err(ProvError::UnsupportedKeySize { bits: 1024 })
        ));
    }

    #[test]
    fn test_parse_structure() {
        for bits in RSA_SUPPORTED_KEY_BITS {
            let cert = unsigned_cert(bits);
            let parsed = RsaPublicCert::parse(&cert.serialize().unwrap()).unwrap();
            assert_eq!(parsed, cert);
        }
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        let bytes = unsigned_cert(3072).serialize().unwrap();
        assert!(matches!(
            RsaPublicCert::parse(&bytes[..bytes.len() - 1]),
            Err(ProvError::Malformed { .. })
        ));
        assert!(matches!(
            RsaPublicCert::parse(&bytes[..6]),
            Err(ProvError::Malformed { .. })
        ));
        let mut bad_offset = bytes.clone();
        bad_offset[2..4].copy_from_slice(&1u16.to_le_bytes());
        assert!(RsaPublicCert::parse(&bad_offset).is_err());
    }

    #[test]
    fn test_field_overflow() {
        let mut cert = unsigned_cert(2048);
        cert.params.number = 1 << 26;
        assert!(matches!(
            cert.serialize(),
            Err(ProvError::FieldOverflow { field: "number", .. })
        ));
    }
}
