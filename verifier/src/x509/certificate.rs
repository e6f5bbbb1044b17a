// Copyright (c) 2023 The MobileCoin Foundation

//! Parsed X509 certificates as seen by path validation.
//!
//! A [`Certificate`] keeps the fields validation needs, the decoded form of
//! the extensions it understands and the signed bytes so the signature can be
//! checked against whichever issuer the chain ends up using.
//!
//! Certificates are immutable once built with one exception, the "already
//! verified" cache. Once a certificate's signature has been checked against
//! its issuer in any session the flag is set and later sessions skip the
//! signature check.

use super::algorithm::{PublicKey, SignedBytes};
use super::name::DistinguishedName;
use crate::trust::TrustSettings;
use crate::{Error, Result};
use bitflags::bitflags;
use const_oid::ObjectIdentifier;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use der::asn1::{BitString, OctetString};
use der::Sequence;
use x509_cert::certificate::Version;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints as X509BasicConstraints, ExtendedKeyUsage,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::Certificate as X509Certificate;

pub(crate) const OID_SUBJECT_KEY_IDENTIFIER: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.14");
pub(crate) const OID_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");
pub(crate) const OID_SUBJECT_ALT_NAME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.17");
pub(crate) const OID_BASIC_CONSTRAINTS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.19");
pub(crate) const OID_AUTHORITY_KEY_IDENTIFIER: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.35");
pub(crate) const OID_EXT_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");
pub(crate) const OID_NETSCAPE_CERT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.1");
pub(crate) const OID_PROXY_CERT_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.1.14");

bitflags! {
    /// Key usage bits.
    ///
    /// Bits 0 through 7 of the `KeyUsage` bit string occupy the low byte,
    /// most significant bit first, so `digitalSignature` is `0x80` and
    /// `cRLSign` (bit 6) is `0x02`. `decipherOnly` (bit 8) is `0x8000`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyUsage: u16 {
        /// digitalSignature
        const DIGITAL_SIGNATURE = 0x0080;
        /// nonRepudiation
        const NON_REPUDIATION = 0x0040;
        /// keyEncipherment
        const KEY_ENCIPHERMENT = 0x0020;
        /// dataEncipherment
        const DATA_ENCIPHERMENT = 0x0010;
        /// keyAgreement
        const KEY_AGREEMENT = 0x0008;
        /// keyCertSign
        const KEY_CERT_SIGN = 0x0004;
        /// cRLSign
        const CRL_SIGN = 0x0002;
        /// encipherOnly
        const ENCIPHER_ONLY = 0x0001;
        /// decipherOnly
        const DECIPHER_ONLY = 0x8000;
    }
}

bitflags! {
    /// Netscape certificate type bits, the first byte of the bit string.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NetscapeCertType: u8 {
        /// SSL client
        const SSL_CLIENT = 0x80;
        /// SSL server
        const SSL_SERVER = 0x40;
        /// S/MIME
        const SMIME = 0x20;
        /// Object signing
        const OBJECT_SIGNING = 0x10;
        /// SSL CA
        const SSL_CA = 0x04;
        /// S/MIME CA
        const SMIME_CA = 0x02;
        /// Object signing CA
        const OBJECT_SIGNING_CA = 0x01;
    }
}

impl NetscapeCertType {
    /// Any of the CA bits
    pub const ANY_CA: Self = Self::SSL_CA
        .union(Self::SMIME_CA)
        .union(Self::OBJECT_SIGNING_CA);
}

/// Basic constraints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    /// The subject is a CA
    pub ca: bool,
    /// Maximum number of non self-issued intermediates that may follow
    pub path_len: Option<u32>,
}

/// Proxy certificate information (RFC3820)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyCertInfo {
    /// Maximum depth of proxy certificates that may follow
    pub path_len: Option<u32>,
}

/// Authority key identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyId {
    /// The issuer's key identifier
    pub key_id: Option<Vec<u8>>,
    /// The serial number of the issuer's certificate
    pub serial_number: Option<Vec<u8>>,
}

/// The extensions of a certificate that path validation understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    /// Basic constraints
    pub basic_constraints: Option<BasicConstraints>,
    /// Key usage
    pub key_usage: Option<KeyUsage>,
    /// Extended key usage purposes
    pub extended_key_usage: Option<Vec<ObjectIdentifier>>,
    /// Netscape certificate type
    pub netscape_cert_type: Option<NetscapeCertType>,
    /// Proxy certificate information
    pub proxy_cert_info: Option<ProxyCertInfo>,
    /// Subject key identifier
    pub subject_key_id: Option<Vec<u8>>,
    /// Authority key identifier
    pub authority_key_id: Option<AuthorityKeyId>,
    /// Identifiers of every extension marked critical, understood or not
    pub critical: Vec<ObjectIdentifier>,
}

impl Extensions {
    /// Decode the known extensions from a certificate's extension list.
    ///
    /// Unknown extensions are skipped apart from recording their criticality.
    pub fn from_x509(extensions: &[Extension]) -> Result<Self> {
        let mut result = Self::default();
        for extension in extensions {
            if extension.critical {
                result.critical.push(extension.extn_id);
            }
            let value = extension.extn_value.as_bytes();
            match extension.extn_id {
                OID_BASIC_CONSTRAINTS => {
                    let constraints = X509BasicConstraints::from_der(value)?;
                    result.basic_constraints = Some(BasicConstraints {
                        ca: constraints.ca,
                        path_len: constraints.path_len_constraint.map(u32::from),
                    });
                }
                OID_KEY_USAGE => {
                    let bits = BitString::from_der(value)?;
                    let bytes = bits.raw_bytes();
                    let low = bytes.first().copied().unwrap_or_default();
                    let high = bytes.get(1).copied().unwrap_or_default();
                    result.key_usage = Some(KeyUsage::from_bits_truncate(
                        u16::from(low) | (u16::from(high) << 8),
                    ));
                }
                OID_EXT_KEY_USAGE => {
                    let usage = ExtendedKeyUsage::from_der(value)?;
                    result.extended_key_usage = Some(usage.0);
                }
                OID_NETSCAPE_CERT_TYPE => {
                    let bits = BitString::from_der(value)?;
                    let first = bits.raw_bytes().first().copied().unwrap_or_default();
                    result.netscape_cert_type = Some(NetscapeCertType::from_bits_truncate(first));
                }
                OID_PROXY_CERT_INFO => {
                    let info = ProxyCertInfoSyntax::from_der(value)?;
                    result.proxy_cert_info = Some(ProxyCertInfo {
                        path_len: info.path_len_constraint,
                    });
                }
                OID_SUBJECT_KEY_IDENTIFIER => {
                    let id = SubjectKeyIdentifier::from_der(value)?;
                    result.subject_key_id = Some(id.0.as_bytes().to_vec());
                }
                OID_AUTHORITY_KEY_IDENTIFIER => {
                    let id = AuthorityKeyIdentifier::from_der(value)?;
                    result.authority_key_id = Some(AuthorityKeyId {
                        key_id: id.key_identifier.map(|k| k.as_bytes().to_vec()),
                        serial_number: id
                            .authority_cert_serial_number
                            .map(|s| s.as_bytes().to_vec()),
                    });
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

/// ProxyCertInfo ::= SEQUENCE {
///     pCPathLenConstraint      INTEGER (0..MAX) OPTIONAL,
///     proxyPolicy              ProxyPolicy }
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct ProxyCertInfoSyntax {
    path_len_constraint: Option<u32>,
    proxy_policy: ProxyPolicy,
}

/// ProxyPolicy ::= SEQUENCE {
///     policyLanguage           OBJECT IDENTIFIER,
///     policy                   OCTET STRING OPTIONAL }
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct ProxyPolicy {
    policy_language: ObjectIdentifier,
    policy: Option<OctetString>,
}

/// The pieces of a certificate handed over by an external parser.
#[derive(Debug, Clone)]
pub struct CertificateParts {
    /// Certificate version
    pub version: Version,
    /// Serial number, the content octets of the INTEGER
    pub serial_number: Vec<u8>,
    /// Subject name
    pub subject: DistinguishedName,
    /// Issuer name
    pub issuer: DistinguishedName,
    /// Start of the validity window, since the unix epoch
    pub not_before: Duration,
    /// End of the validity window, since the unix epoch
    pub not_after: Duration,
    /// Subject public key, `None` when it could not be decoded
    pub public_key: Option<PublicKey>,
    /// Decoded extensions
    pub extensions: Extensions,
    /// Signed bytes and signature
    pub signed: SignedBytes,
}

/// A certificate participating in path validation.
#[derive(Debug)]
pub struct Certificate {
    parts: CertificateParts,
    trust_settings: Option<TrustSettings>,
    verified: AtomicBool,
}

impl Certificate {
    /// Build a certificate from already parsed pieces.
    pub fn from_parts(parts: CertificateParts) -> Self {
        Self {
            parts,
            trust_settings: None,
            verified: AtomicBool::new(false),
        }
    }

    /// Decode a PEM encoded certificate
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self> {
        let certificate = X509Certificate::from_pem(pem)?;
        Self::try_from(&certificate)
    }

    /// Attach explicit trust settings to this certificate.
    pub fn with_trust_settings(mut self, trust_settings: TrustSettings) -> Self {
        self.trust_settings = Some(trust_settings);
        self
    }

    /// The certificate version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// The serial number
    pub fn serial_number(&self) -> &[u8] {
        &self.parts.serial_number
    }

    /// The subject name
    pub fn subject(&self) -> &DistinguishedName {
        &self.parts.subject
    }

    /// The issuer name
    pub fn issuer(&self) -> &DistinguishedName {
        &self.parts.issuer
    }

    /// Start of the validity window
    pub fn not_before(&self) -> Duration {
        self.parts.not_before
    }

    /// End of the validity window
    pub fn not_after(&self) -> Duration {
        self.parts.not_after
    }

    /// The subject public key if it could be decoded
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.parts.public_key.as_ref()
    }

    /// The decoded extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Explicit trust settings, if any
    pub fn trust_settings(&self) -> Option<&TrustSettings> {
        self.trust_settings.as_ref()
    }

    /// Subject and issuer names are the same
    pub fn is_self_issued(&self) -> bool {
        self.parts.subject == self.parts.issuer
    }

    /// Verify this certificate's signature with the `key` of its issuer.
    pub fn verify_signature(&self, key: &PublicKey) -> Result<()> {
        self.parts.signed.verify(key)
    }

    /// Whether the signature has already been checked against an issuer
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Acquire)
    }

    /// Record that the signature has been checked against an issuer
    pub fn mark_verified(&self) {
        self.verified.store(true, Ordering::Release);
    }

    pub(crate) fn signed(&self) -> &SignedBytes {
        &self.parts.signed
    }
}

/// Two certificates are the same certificate when their signed bytes and
/// signatures match.
impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.parts.signed == other.parts.signed
    }
}

impl Eq for Certificate {}

impl TryFrom<&X509Certificate> for Certificate {
    type Error = Error;

    fn try_from(certificate: &X509Certificate) -> Result<Self> {
        let tbs = &certificate.tbs_certificate;
        let extensions = match &tbs.extensions {
            Some(extensions) => Extensions::from_x509(extensions)?,
            None => Extensions::default(),
        };
        let signed = SignedBytes::new(
            tbs.to_der()?,
            certificate.signature_algorithm.clone(),
            certificate.signature.raw_bytes().to_vec(),
        );
        let parts = CertificateParts {
            version: tbs.version,
            serial_number: tbs.serial_number.as_bytes().to_vec(),
            subject: DistinguishedName::from(&tbs.subject),
            issuer: DistinguishedName::from(&tbs.issuer),
            not_before: tbs.validity.not_before.to_unix_duration(),
            not_after: tbs.validity.not_after.to_unix_duration(),
            public_key: PublicKey::try_from(&tbs.subject_public_key_info).ok(),
            extensions,
            signed,
        };
        Ok(Self::from_parts(parts))
    }
}

/// Decode a DER encoded certificate
impl TryFrom<&[u8]> for Certificate {
    type Error = Error;

    fn try_from(der_bytes: &[u8]) -> Result<Self> {
        let certificate = X509Certificate::from_der(der_bytes)?;
        Self::try_from(&certificate)
    }
}
