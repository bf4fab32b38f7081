/*++

Licensed under the Apache-2.0 license.

File Name:

   sb_cert.rs

Abstract:

    File contains the secure boot certificates forming a debug entitlement
    chain.

--*/

use log::info;
use sensor_prov_error::{ProvError, ProvResult};
use sensor_prov_types::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{reversed, ProvCrypto};

const CERT: &str = "secure boot certificate";

const SB_CERT_HEADER_BYTE_SIZE: usize = core::mem::size_of::<SbCertHeader>();
const SB_CERT_PUB_KEY_BYTE_SIZE: usize = core::mem::size_of::<SbCertPubKey>();

/// Variant specific body of a secure boot certificate
pub trait SbCertBody: IntoBytes + FromBytes + Immutable + KnownLayout + Copy {
    const MAGIC: u32;
}

impl SbCertBody for SbKeyCertBody {
    const MAGIC: u32 = SB_CERT_KEY_MAGIC;
}

impl SbCertBody for SbEnablerCertBody {
    const MAGIC: u32 = SB_CERT_ENABLER_MAGIC;
}

impl SbCertBody for SbDeveloperCertBody {
    const MAGIC: u32 = SB_CERT_DEVELOPER_MAGIC;
}

/// Secure boot certificate of one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbCert<B: SbCertBody> {
    pub header: SbCertHeader,

    /// Key of the pair that signs this certificate
    pub public_key: SbCertPubKey,

    pub body: B,

    /// Signature in wire order
    pub signature: [u8; SB_CERT_SIGNATURE_BYTE_SIZE],
}

impl<B: SbCertBody> SbCert<B> {
    /// Size of the signed region: header, public key and body
    pub const SIGNED_BYTE_SIZE: usize =
        SB_CERT_HEADER_BYTE_SIZE + SB_CERT_PUB_KEY_BYTE_SIZE + core::mem::size_of::<B>();

    pub const BYTE_SIZE: usize = Self::SIGNED_BYTE_SIZE + SB_CERT_SIGNATURE_BYTE_SIZE;

    fn sign(
        crypto: &impl ProvCrypto,
        signer: &RsaKeyPair,
        cert_version: u32,
        flags: SbCertFlags,
        body: B,
    ) -> ProvResult<Self> {
        let mut cert = Self {
            header: SbCertHeader {
                magic: B::MAGIC.into(),
                cert_version: cert_version.into(),
                declared_size: (Self::SIGNED_BYTE_SIZE as u32).into(),
                flags: flags.0.into(),
            },
            public_key: sb_pub_key(crypto, &signer.public)?,
            body,
            signature: [0u8; SB_CERT_SIGNATURE_BYTE_SIZE],
        };
        let priv_key = signer
            .private
            .as_ref()
            .ok_or(ProvError::MissingPrivateKey("secure boot certificate signer"))?;
        let sig = crypto.rsa_sign(priv_key, &cert.signed_bytes())?;
        if sig.len() != SB_CERT_SIGNATURE_BYTE_SIZE {
            return Err(ProvError::UnsupportedKeySize {
                bits: sig.len() * 8,
            });
        }
        cert.signature.copy_from_slice(&reversed(&sig));
        Ok(cert)
    }

    pub fn flags(&self) -> SbCertFlags {
        SbCertFlags(self.header.flags.get())
    }

    pub fn signed_bytes(&self) -> Vec<u8> {
        [
            self.header.as_bytes(),
            self.public_key.as_bytes(),
            self.body.as_bytes(),
        ]
        .concat()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.signed_bytes();
        bytes.extend_from_slice(&self.signature);
        bytes
    }

    fn parse(bytes: &[u8]) -> ProvResult<(Self, &[u8])> {
        if bytes.len() < Self::BYTE_SIZE {
            return Err(ProvError::malformed(
                CERT,
                format!("expected {} bytes, found {}", Self::BYTE_SIZE, bytes.len()),
            ));
        }
        let (header, rest) = SbCertHeader::read_from_prefix(bytes)
            .map_err(|_| ProvError::malformed(CERT, "truncated header"))?;
        let (public_key, rest) = SbCertPubKey::read_from_prefix(rest)
            .map_err(|_| ProvError::malformed(CERT, "truncated public key"))?;
        let (body, rest) =
            B::read_from_prefix(rest).map_err(|_| ProvError::malformed(CERT, "truncated body"))?;
        let (signature, rest) = <[u8; SB_CERT_SIGNATURE_BYTE_SIZE]>::read_from_prefix(rest)
            .map_err(|_| ProvError::malformed(CERT, "truncated signature"))?;

        if header.declared_size.get() as usize != Self::SIGNED_BYTE_SIZE {
            return Err(ProvError::malformed(
                CERT,
                format!("declared size {} is invalid", header.declared_size.get()),
            ));
        }
        let cert = Self {
            header,
            public_key,
            body,
            signature,
        };
        HbkId::from_value(cert.flags().hbk_id())?;
        LifecycleState::from_value(cert.flags().lcs())?;
        Ok((cert, rest))
    }

    fn verify(&self, crypto: &impl ProvCrypto) -> ProvResult<()> {
        let key = RsaPubKey::from_modulus(&self.public_key.modulus);
        if !crypto.rsa_verify(&key, &self.signed_bytes(), &reversed(&self.signature))? {
            return Err(ProvError::SignatureMismatch(CERT));
        }
        Ok(())
    }
}

/// Secure boot certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureBootCert {
    Key(SbCert<SbKeyCertBody>),
    Enabler(SbCert<SbEnablerCertBody>),
    Developer(SbCert<SbDeveloperCertBody>),
}

/// Inputs of a debug entitlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntitlementParams {
    /// Emit a key certificate ahead of the enabler certificate
    pub key_cert: bool,

    pub sw_version: u32,

    pub cert_version: u32,

    pub soc_id: SocId,

    pub enabler_mask: DebugMask,

    pub enabler_lock: DebugMask,

    pub developer_mask: DebugMask,

    pub lcs: LifecycleState,

    pub rma: bool,
}

/// Embeddable form of a 3072-bit public key
fn sb_pub_key(crypto: &impl ProvCrypto, key: &RsaPubKey) -> ProvResult<SbCertPubKey> {
    let bits = key.bits();
    if bits != SB_CERT_KEY_BITS {
        return Err(ProvError::UnsupportedKeySize { bits });
    }
    let mut modulus = [0u8; SB_CERT_MODULUS_BYTE_SIZE];
    modulus.copy_from_slice(&key.modulus);
    Ok(SbCertPubKey {
        modulus,
        np: crypto.rsa_np(key)?,
    })
}

fn sb_flags(hbk_id: HbkId, lcs: LifecycleState, rma: bool) -> SbCertFlags {
    let mut flags = SbCertFlags(0);
    flags.set_hbk_id(hbk_id.value());
    flags.set_lcs(lcs.value());
    flags.set_rma(rma);
    flags
}

impl SecureBootCert {
    /// Hash of an embedded public key: SHA-256 over modulus and reduction
    /// constant
    pub fn pubkey_hash(crypto: &impl ProvCrypto, key: &SbCertPubKey) -> ProvResult<Sha256Digest> {
        Ok(crypto.sha256_digest(key.as_bytes())?)
    }

    /// Hash of the embeddable form of an RSA public key
    pub fn rsa_pubkey_hash(crypto: &impl ProvCrypto, key: &RsaPubKey) -> ProvResult<Sha256Digest> {
        Self::pubkey_hash(crypto, &sb_pub_key(crypto, key)?)
    }

    /// Key certificate, signed by a root pair, naming the enabler key
    pub fn key_cert(
        crypto: &impl ProvCrypto,
        signer: &RsaKeyPair,
        cert_version: u32,
        hbk_id: HbkId,
        sw_version: u32,
        enabler_key: &RsaPubKey,
    ) -> ProvResult<Self> {
        let body = SbKeyCertBody {
            sw_version: sw_version.into(),
            pubkey_hash: Self::rsa_pubkey_hash(crypto, enabler_key)?,
        };
        let flags = sb_flags(hbk_id, LifecycleState::Cm, false);
        Ok(Self::Key(SbCert::sign(
            crypto,
            signer,
            cert_version,
            flags,
            body,
        )?))
    }

    /// Enabler certificate naming the developer key
    #[allow(clippy::too_many_arguments)]
    pub fn enabler_cert(
        crypto: &impl ProvCrypto,
        signer: &RsaKeyPair,
        cert_version: u32,
        hbk_id: HbkId,
        lcs: LifecycleState,
        rma: bool,
        debug_enabler_mask: DebugMask,
        debug_enabler_lock: DebugMask,
        developer_key: &RsaPubKey,
    ) -> ProvResult<Self> {
        let body = SbEnablerCertBody {
            debug_enabler_mask,
            debug_enabler_lock,
            pubkey_hash: Self::rsa_pubkey_hash(crypto, developer_key)?,
        };
        let flags = sb_flags(hbk_id, lcs, rma);
        Ok(Self::Enabler(SbCert::sign(
            crypto,
            signer,
            cert_version,
            flags,
            body,
        )?))
    }

    /// Developer certificate binding a debug mask to one device
    pub fn developer_cert(
        crypto: &impl ProvCrypto,
        signer: &RsaKeyPair,
        cert_version: u32,
        hbk_id: HbkId,
        debug_developer_mask: DebugMask,
        soc_id: SocId,
    ) -> ProvResult<Self> {
        let body = SbDeveloperCertBody {
            debug_developer_mask,
            soc_id,
        };
        let flags = sb_flags(hbk_id, LifecycleState::Cm, false);
        Ok(Self::Developer(SbCert::sign(
            crypto,
            signer,
            cert_version,
            flags,
            body,
        )?))
    }

    /// Build the concatenated entitlement: an optional key certificate,
    /// then the enabler and developer certificates.
    ///
    /// `root` signs the key certificate and the enabler certificate. The
    /// developer certificate is signed by `developer`, or by `root` when no
    /// developer pair is given.
    pub fn debug_entitlement(
        crypto: &impl ProvCrypto,
        root: &RsaKeyPair,
        hbk_id: HbkId,
        developer: Option<&RsaKeyPair>,
        params: &DebugEntitlementParams,
    ) -> ProvResult<Vec<u8>> {
        let developer = developer.unwrap_or(root);
        let mut bytes = Vec::new();

        if params.key_cert {
            let cert = Self::key_cert(
                crypto,
                root,
                params.cert_version,
                hbk_id,
                params.sw_version,
                &root.public,
            )?;
            bytes.extend(cert.to_bytes());
        }

        let enabler = Self::enabler_cert(
            crypto,
            root,
            params.cert_version,
            hbk_id,
            params.lcs,
            params.rma,
            params.enabler_mask,
            params.enabler_lock,
            &developer.public,
        )?;
        bytes.extend(enabler.to_bytes());

        let developer = Self::developer_cert(
            crypto,
            developer,
            params.cert_version,
            hbk_id,
            params.developer_mask,
            params.soc_id,
        )?;
        bytes.extend(developer.to_bytes());

        info!(
            "Built debug entitlement ({} bytes, lcs {}, {:?})",
            bytes.len(),
            params.lcs,
            hbk_id
        );
        Ok(bytes)
    }

    pub fn magic(&self) -> u32 {
        self.header().magic.get()
    }

    pub fn header(&self) -> &SbCertHeader {
        match self {
            Self::Key(cert) => &cert.header,
            Self::Enabler(cert) => &cert.header,
            Self::Developer(cert) => &cert.header,
        }
    }

    pub fn flags(&self) -> SbCertFlags {
        SbCertFlags(self.header().flags.get())
    }

    pub fn public_key(&self) -> &SbCertPubKey {
        match self {
            Self::Key(cert) => &cert.public_key,
            Self::Enabler(cert) => &cert.public_key,
            Self::Developer(cert) => &cert.public_key,
        }
    }

    /// Hash of the next certificate's key, if this certificate names one
    pub fn child_pubkey_hash(&self) -> Option<&Sha256Digest> {
        match self {
            Self::Key(cert) => Some(&cert.body.pubkey_hash),
            Self::Enabler(cert) => Some(&cert.body.pubkey_hash),
            Self::Developer(_) => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Key(cert) => cert.to_bytes(),
            Self::Enabler(cert) => cert.to_bytes(),
            Self::Developer(cert) => cert.to_bytes(),
        }
    }

    /// Decode one certificate, selected by its magic, from the front of
    /// `bytes`, returning it together with the unconsumed remainder.
    pub fn parse(bytes: &[u8]) -> ProvResult<(Self, &[u8])> {
        let (header, _) = SbCertHeader::read_from_prefix(bytes)
            .map_err(|_| ProvError::malformed(CERT, "truncated header"))?;
        match header.magic.get() {
            SB_CERT_KEY_MAGIC => {
                SbCert::parse(bytes).map(|(cert, rest)| (Self::Key(cert), rest))
            }
            SB_CERT_ENABLER_MAGIC => {
                SbCert::parse(bytes).map(|(cert, rest)| (Self::Enabler(cert), rest))
            }
            SB_CERT_DEVELOPER_MAGIC => {
                SbCert::parse(bytes).map(|(cert, rest)| (Self::Developer(cert), rest))
            }
            magic => Err(ProvError::malformed(
                CERT,
                format!("unknown magic {magic:#010x}"),
            )),
        }
    }

    /// Split a concatenated entitlement into its certificates
    pub fn parse_chain(mut bytes: &[u8]) -> ProvResult<Vec<Self>> {
        let mut certs = Vec::new();
        while !bytes.is_empty() {
            let (cert, rest) = Self::parse(bytes)?;
            certs.push(cert);
            bytes = rest;
        }
        Ok(certs)
    }

    /// Check the signature against the embedded public key
    pub fn verify(&self, crypto: &impl ProvCrypto) -> ProvResult<()> {
        match self {
            Self::Key(cert) => cert.verify(crypto),
            Self::Enabler(cert) => cert.verify(crypto),
            Self::Developer(cert) => cert.verify(crypto),
        }
    }

    /// Check the chain shape, every signature and every parent to child key
    /// hash link.
    ///
    /// The chain must be an optional key certificate followed by exactly one
    /// enabler certificate and a final developer certificate. When
    /// `root_hash` is given, the key embedded in the first certificate must
    /// hash to it, the way a hardware key hash slot would check it.
    pub fn verify_chain(
        crypto: &impl ProvCrypto,
        certs: &[Self],
        root_hash: Option<&Sha256Digest>,
    ) -> ProvResult<()> {
        match certs {
            [Self::Key(_), Self::Enabler(_), Self::Developer(_)]
            | [Self::Enabler(_), Self::Developer(_)] => {}
            [] => return Err(ProvError::malformed(CERT, "empty certificate chain")),
            _ => {
                return Err(ProvError::malformed(
                    CERT,
                    "chain must be [key] enabler developer",
                ))
            }
        }
        for cert in certs {
            cert.verify(crypto)?;
        }

        if let Some(root_hash) = root_hash {
            if &Self::pubkey_hash(crypto, certs[0].public_key())? != root_hash {
                return Err(ProvError::ChainLinkMismatch { index: 0 });
            }
        }

        for (index, pair) in certs.windows(2).enumerate() {
            let child_hash = Self::pubkey_hash(crypto, pair[1].public_key())?;
            if pair[0].child_pubkey_hash() != Some(&child_hash) {
                return Err(ProvError::ChainLinkMismatch { index: index + 1 });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn developer_cert_bytes() -> Vec<u8> {
        let cert = SbCert {
            header: SbCertHeader {
                magic: SB_CERT_DEVELOPER_MAGIC.into(),
                cert_version: 0x10000.into(),
                declared_size: 468.into(),
                flags: sb_flags(HbkId::Hbk1, LifecycleState::Cm, false).0.into(),
            },
            public_key: SbCertPubKey {
                modulus: [0x9C; SB_CERT_MODULUS_BYTE_SIZE],
                np: [0x01; SB_CERT_NP_BYTE_SIZE],
            },
            body: SbDeveloperCertBody {
                debug_developer_mask: [0xFF; 16],
                soc_id: [0x5A; 32],
            },
            signature: [0x33; SB_CERT_SIGNATURE_BYTE_SIZE],
        };
        cert.to_bytes()
    }

    #[test]
    fn test_sizes() {
        assert_eq!(SbCert::<SbKeyCertBody>::SIGNED_BYTE_SIZE, 456);
        assert_eq!(SbCert::<SbEnablerCertBody>::SIGNED_BYTE_SIZE, 484);
        assert_eq!(SbCert::<SbDeveloperCertBody>::SIGNED_BYTE_SIZE, 468);
        assert_eq!(SbCert::<SbKeyCertBody>::BYTE_SIZE, 840);
        assert_eq!(SbCert::<SbEnablerCertBody>::BYTE_SIZE, 868);
        assert_eq!(SbCert::<SbDeveloperCertBody>::BYTE_SIZE, 852);
    }

    #[test]
    fn test_flags() {
        assert_eq!(sb_flags(HbkId::Hbk0, LifecycleState::Cm, false).0, 0x000);
        assert_eq!(sb_flags(HbkId::Hbk1, LifecycleState::Secure, false).0, 0x051);
        assert_eq!(sb_flags(HbkId::HbkNone, LifecycleState::Rma, true).0, 0x17F);
    }

    #[test]
    fn test_parse_by_magic() {
        let mut bytes = developer_cert_bytes();
        assert_eq!(bytes[..4], [0x65, 0x64, 0x64, 0x53]);
        bytes.extend_from_slice(&[0xAA, 0xBB]);

        let (cert, rest) = SecureBootCert::parse(&bytes).unwrap();
        assert_eq!(rest, &[0xAA, 0xBB]);
        assert_eq!(cert.magic(), SB_CERT_DEVELOPER_MAGIC);
        assert_eq!(cert.flags().hbk_id(), 1);
        assert!(cert.child_pubkey_hash().is_none());
        assert_eq!(cert.to_bytes(), bytes[..852]);
    }

    #[test]
    fn test_parse_errors() {
        let bytes = developer_cert_bytes();
        assert!(matches!(
            SecureBootCert::parse(&bytes[..851]),
            Err(ProvError::Malformed { .. })
        ));

        let mut bad_magic = bytes.clone();
        bad_magic[0] = 0;
        assert!(SecureBootCert::parse(&bad_magic).is_err());

        let mut bad_size = bytes.clone();
        bad_size[8] = 0;
        assert!(SecureBootCert::parse(&bad_size).is_err());

        let mut bad_lcs = bytes;
        bad_lcs[12] = 0x20;
        assert!(SecureBootCert::parse(&bad_lcs).is_err());
    }

    #[test]
    fn test_parse_chain() {
        let one = developer_cert_bytes();
        let two = [one.as_slice(), &one].concat();
        assert_eq!(SecureBootCert::parse_chain(&two).unwrap().len(), 2);
        assert!(SecureBootCert::parse_chain(&two[..1000]).is_err());
        assert!(SecureBootCert::parse_chain(&[]).unwrap().is_empty());
    }
}
