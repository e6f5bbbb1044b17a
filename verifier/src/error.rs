// Copyright (c) 2023 The MobileCoin Foundation

//! Errors that can occur outside of path validation proper.
//!
//! Faults found while validating a path are *not* reported through this type,
//! they are recorded on the [`StoreContext`](crate::StoreContext) as a
//! [`VerifyError`](crate::VerifyError) and resolved by the verify callback.

/// Result type for fallible store and session operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error setting up or running a verification session
#[derive(displaydoc::Display, Debug)]
pub enum Error {
    /// Error converting from DER {0}
    Der(der::Error),
    /// Error parsing verification parameters from JSON: {0}
    Config(serde_json::Error),
    /// An error occurred decoding the signature
    SignatureDecoding,
    /// The signature does not match with the verifying key
    SignatureVerification,
    /// An error occurred decoding a public key
    KeyDecoding,
    /// The certificate is already present in the store
    DuplicateCertificate,
    /// The CRL is already present in the store
    DuplicateCrl,
    /// No certificate was set to verify
    NoCertificateSet,
    /// Unknown verification profile: {0}
    UnknownProfile(String),
    /// A verification profile needs a name to be registered
    UnnamedProfile,
    /// Unknown purpose identifier {0}
    UnknownPurpose(u32),
    /// Unknown trust identifier {0}
    UnknownTrust(u32),
    /// Unknown verification error code {0}
    UnknownVerifyErrorCode(i32),
    /// A lookup source could not answer now, the lookup should be retried
    ShouldRetry,
}

impl From<der::Error> for Error {
    fn from(e: der::Error) -> Self {
        Error::Der(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e)
    }
}

impl std::error::Error for Error {}
