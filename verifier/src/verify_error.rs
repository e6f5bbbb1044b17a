// Copyright (c) 2023 The MobileCoin Foundation

//! Faults that can be found while validating a certification path.
//!
//! Each fault is recorded on the session and handed to the verify callback,
//! which decides whether validation continues. The numeric codes are the
//! conventional X509 verification error identifiers so callers that persist
//! or compare codes keep working.

use crate::Error;

/// A certification path fault
#[derive(displaydoc::Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerifyError {
    /// unable to get issuer certificate
    UnableToGetIssuerCert,
    /// unable to get certificate CRL
    UnableToGetCrl,
    /// unable to decrypt certificate's signature
    UnableToDecryptCertSignature,
    /// unable to decrypt CRL's signature
    UnableToDecryptCrlSignature,
    /// unable to decode issuer public key
    UnableToDecodeIssuerPublicKey,
    /// certificate signature failure
    CertSignatureFailure,
    /// CRL signature failure
    CrlSignatureFailure,
    /// certificate is not yet valid
    CertNotYetValid,
    /// certificate has expired
    CertHasExpired,
    /// CRL is not yet valid
    CrlNotYetValid,
    /// CRL has expired
    CrlHasExpired,
    /// format error in certificate's notBefore field
    ErrorInCertNotBeforeField,
    /// format error in certificate's notAfter field
    ErrorInCertNotAfterField,
    /// format error in CRL's lastUpdate field
    ErrorInCrlLastUpdateField,
    /// format error in CRL's nextUpdate field
    ErrorInCrlNextUpdateField,
    /// out of memory
    OutOfMem,
    /// self signed certificate
    DepthZeroSelfSignedCert,
    /// self signed certificate in certificate chain
    SelfSignedCertInChain,
    /// unable to get local issuer certificate
    UnableToGetIssuerCertLocally,
    /// unable to verify the first certificate
    UnableToVerifyLeafSignature,
    /// certificate chain too long
    CertChainTooLong,
    /// certificate revoked
    CertRevoked,
    /// invalid CA certificate
    InvalidCa,
    /// invalid non-CA certificate (has CA markings)
    InvalidNonCa,
    /// path length constraint exceeded
    PathLengthExceeded,
    /// proxy path length constraint exceeded
    ProxyPathLengthExceeded,
    /// proxy certificates not allowed, please set the appropriate flag
    ProxyCertificatesNotAllowed,
    /// unsupported certificate purpose
    InvalidPurpose,
    /// certificate not trusted
    CertUntrusted,
    /// certificate rejected
    CertRejected,
    /// subject issuer mismatch
    SubjectIssuerMismatch,
    /// authority and subject key identifier mismatch
    AkidSkidMismatch,
    /// authority and issuer serial number mismatch
    AkidIssuerSerialMismatch,
    /// key usage does not include certificate signing
    KeyUsageNoCertSign,
    /// unable to get CRL issuer certificate
    UnableToGetCrlIssuer,
    /// unhandled critical extension
    UnhandledCriticalExtension,
    /// key usage does not include CRL signing
    KeyUsageNoCrlSign,
    /// key usage does not include digital signature
    KeyUsageNoDigitalSignature,
    /// unhandled critical CRL extension
    UnhandledCriticalCrlExtension,
    /// invalid or inconsistent certificate extension
    InvalidExtension,
    /// invalid or inconsistent certificate policy extension
    InvalidPolicyExtension,
    /// no explicit policy
    NoExplicitPolicy,
    /// application verification failure
    ApplicationVerification,
}

impl VerifyError {
    /// The conventional numeric identifier for this fault.
    pub fn code(&self) -> i32 {
        match self {
            VerifyError::UnableToGetIssuerCert => 2,
            VerifyError::UnableToGetCrl => 3,
            VerifyError::UnableToDecryptCertSignature => 4,
            VerifyError::UnableToDecryptCrlSignature => 5,
            VerifyError::UnableToDecodeIssuerPublicKey => 6,
            VerifyError::CertSignatureFailure => 7,
            VerifyError::CrlSignatureFailure => 8,
            VerifyError::CertNotYetValid => 9,
            VerifyError::CertHasExpired => 10,
            VerifyError::CrlNotYetValid => 11,
            VerifyError::CrlHasExpired => 12,
            VerifyError::ErrorInCertNotBeforeField => 13,
            VerifyError::ErrorInCertNotAfterField => 14,
            VerifyError::ErrorInCrlLastUpdateField => 15,
            VerifyError::ErrorInCrlNextUpdateField => 16,
            VerifyError::OutOfMem => 17,
            VerifyError::DepthZeroSelfSignedCert => 18,
            VerifyError::SelfSignedCertInChain => 19,
            VerifyError::UnableToGetIssuerCertLocally => 20,
            VerifyError::UnableToVerifyLeafSignature => 21,
            VerifyError::CertChainTooLong => 22,
            VerifyError::CertRevoked => 23,
            VerifyError::InvalidCa => 24,
            VerifyError::PathLengthExceeded => 25,
            VerifyError::InvalidPurpose => 26,
            VerifyError::CertUntrusted => 27,
            VerifyError::CertRejected => 28,
            VerifyError::SubjectIssuerMismatch => 29,
            VerifyError::AkidSkidMismatch => 30,
            VerifyError::AkidIssuerSerialMismatch => 31,
            VerifyError::KeyUsageNoCertSign => 32,
            VerifyError::UnableToGetCrlIssuer => 33,
            VerifyError::UnhandledCriticalExtension => 34,
            VerifyError::KeyUsageNoCrlSign => 35,
            VerifyError::UnhandledCriticalCrlExtension => 36,
            VerifyError::InvalidNonCa => 37,
            VerifyError::ProxyPathLengthExceeded => 38,
            VerifyError::KeyUsageNoDigitalSignature => 39,
            VerifyError::ProxyCertificatesNotAllowed => 40,
            VerifyError::InvalidExtension => 41,
            VerifyError::InvalidPolicyExtension => 42,
            VerifyError::NoExplicitPolicy => 43,
            VerifyError::ApplicationVerification => 50,
        }
    }

    /// All faults, in code order.
    pub const ALL: [VerifyError; 43] = [
        VerifyError::UnableToGetIssuerCert,
        VerifyError::UnableToGetCrl,
        VerifyError::UnableToDecryptCertSignature,
        VerifyError::UnableToDecryptCrlSignature,
        VerifyError::UnableToDecodeIssuerPublicKey,
        VerifyError::CertSignatureFailure,
        VerifyError::CrlSignatureFailure,
        VerifyError::CertNotYetValid,
        VerifyError::CertHasExpired,
        VerifyError::CrlNotYetValid,
        VerifyError::CrlHasExpired,
        VerifyError::ErrorInCertNotBeforeField,
        VerifyError::ErrorInCertNotAfterField,
        VerifyError::ErrorInCrlLastUpdateField,
        VerifyError::ErrorInCrlNextUpdateField,
        VerifyError::OutOfMem,
        VerifyError::DepthZeroSelfSignedCert,
        VerifyError::SelfSignedCertInChain,
        VerifyError::UnableToGetIssuerCertLocally,
        VerifyError::UnableToVerifyLeafSignature,
        VerifyError::CertChainTooLong,
        VerifyError::CertRevoked,
        VerifyError::InvalidCa,
        VerifyError::PathLengthExceeded,
        VerifyError::InvalidPurpose,
        VerifyError::CertUntrusted,
        VerifyError::CertRejected,
        VerifyError::SubjectIssuerMismatch,
        VerifyError::AkidSkidMismatch,
        VerifyError::AkidIssuerSerialMismatch,
        VerifyError::KeyUsageNoCertSign,
        VerifyError::UnableToGetCrlIssuer,
        VerifyError::UnhandledCriticalExtension,
        VerifyError::KeyUsageNoCrlSign,
        VerifyError::UnhandledCriticalCrlExtension,
        VerifyError::InvalidNonCa,
        VerifyError::ProxyPathLengthExceeded,
        VerifyError::KeyUsageNoDigitalSignature,
        VerifyError::ProxyCertificatesNotAllowed,
        VerifyError::InvalidExtension,
        VerifyError::InvalidPolicyExtension,
        VerifyError::NoExplicitPolicy,
        VerifyError::ApplicationVerification,
    ];
}

/// Look up a fault from its numeric identifier.
///
/// `0` is the "ok" code and is not a fault, so it is rejected like any other
/// unknown value.
impl TryFrom<i32> for VerifyError {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        VerifyError::ALL
            .iter()
            .copied()
            .find(|e| e.code() == code)
            .ok_or(Error::UnknownVerifyErrorCode(code))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use yare::parameterized;

    #[parameterized(
        issuer = { VerifyError::UnableToGetIssuerCert, 2 },
        expired = { VerifyError::CertHasExpired, 10 },
        locally = { VerifyError::UnableToGetIssuerCertLocally, 20 },
        revoked = { VerifyError::CertRevoked, 23 },
        non_ca = { VerifyError::InvalidNonCa, 37 },
        application = { VerifyError::ApplicationVerification, 50 },
    )]
    fn code_round_trips(error: VerifyError, code: i32) {
        assert_eq!(error.code(), code);
        assert_eq!(VerifyError::try_from(code).expect("known code"), error);
    }

    #[test]
    fn codes_are_distinct() {
        let mut codes = VerifyError::ALL.iter().map(|e| e.code()).collect::<Vec<_>>();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), VerifyError::ALL.len());
    }

    #[parameterized(
        ok = { 0 },
        unused = { 1 },
        gap = { 44 },
        negative = { -1 },
    )]
    fn unknown_codes_are_rejected(code: i32) {
        assert_matches!(
            VerifyError::try_from(code),
            Err(Error::UnknownVerifyErrorCode(c)) if c == code
        );
    }

    #[test]
    fn display_matches_conventional_reason() {
        assert_eq!(
            VerifyError::SelfSignedCertInChain.to_string(),
            "self signed certificate in certificate chain"
        );
    }
}
