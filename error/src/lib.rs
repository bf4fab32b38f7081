/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error type shared by the sensor provisioning crates.

--*/

use thiserror::Error;

/// Sensor provisioning result
pub type ProvResult<T> = Result<T, ProvError>;

/// Sensor provisioning error
///
/// Every fallible operation either yields a fully validated value or one of
/// these errors; partially built artifacts are never returned.
#[derive(Debug, Error)]
pub enum ProvError {
    // Validation
    #[error("Malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("Signature verification failed for {0}")]
    SignatureMismatch(&'static str),

    #[error("Re-encoded {0} header does not match the input")]
    IntegrityMismatch(&'static str),

    #[error("Field {field} value {value:#x} does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: u128,
        bits: u32,
    },

    #[error("Certificate chain link {index} does not match the parent public key hash")]
    ChainLinkMismatch { index: usize },

    // Unsupported sizes
    #[error("Unsupported RSA key size: {bits} bits")]
    UnsupportedKeySize { bits: usize },

    #[error("Unsupported {what} size: {size}")]
    UnsupportedSize { what: &'static str, size: usize },

    #[error("Signing key is {signer} bits but subject key is {subject} bits")]
    KeySizeMismatch { signer: usize, subject: usize },

    // Key access
    #[error("Key access failed: {0}")]
    KeyAccess(String),

    #[error("Key {0} is not loaded")]
    MissingKey(&'static str),

    #[error("Private part of key {0} is not available")]
    MissingPrivateKey(&'static str),

    // Authentication
    #[error("Authentication tag mismatch")]
    Authentication,

    // Selectors
    #[error("Invalid key name: {0}")]
    InvalidKeyName(String),

    #[error("Invalid root of trust: {0}")]
    InvalidRootOfTrust(String),

    #[error("Invalid lifecycle state: {0}")]
    InvalidLifecycleState(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Crypto operation failed: {0:#}")]
    Crypto(#[from] anyhow::Error),
}

impl ProvError {
    /// Shorthand for a `Malformed` error
    pub fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ProvError::FieldOverflow {
            field: "number",
            value: 0x4000000,
            bits: 26,
        };
        assert_eq!(
            err.to_string(),
            "Field number value 0x4000000 does not fit in 26 bits"
        );
        let err: ProvError = anyhow::anyhow!("bad key").into();
        assert_eq!(err.to_string(), "Crypto operation failed: bad key");
    }
}
