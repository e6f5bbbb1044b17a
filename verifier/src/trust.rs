// Copyright (c) 2023 The MobileCoin Foundation

//! Trust classification of the certificate that terminates a chain.
//!
//! Each [`TrustId`] has an entry in a static table naming the predicate used
//! to classify a certificate and the extended key usage it is tied to.
//! Certificates can carry explicit [`TrustSettings`] which take precedence
//! over the compatible, self-signed based, classification.

use crate::x509::Certificate;
use crate::Error;
use const_oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};

const OID_KP_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
const OID_KP_CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");
const OID_KP_CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
const OID_KP_EMAIL_PROTECTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.4");
const OID_KP_TIME_STAMPING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8");
const OID_KP_OCSP_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.9");
const OID_AD_OCSP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1");

/// A trust level a chain can be checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustId {
    /// Trusted when self-signed
    Compat,
    /// SSL client authentication
    SslClient,
    /// SSL server authentication
    SslServer,
    /// S/MIME email protection
    Email,
    /// Code signing
    ObjectSign,
    /// OCSP response signing
    OcspSign,
    /// OCSP request signing
    OcspRequest,
    /// Time stamping authority
    Tsa,
}

/// Outcome of classifying a certificate against a [`TrustId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustStatus {
    /// Explicitly or implicitly trusted
    Trusted,
    /// Explicitly rejected
    Rejected,
    /// Neither trusted nor rejected
    Untrusted,
}

/// Explicit trust settings attached to a certificate.
///
/// Each entry is an extended key usage identifier the certificate is
/// trusted, or rejected, for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustSettings {
    /// Usages the certificate is trusted for
    pub trust: Vec<ObjectIdentifier>,
    /// Usages the certificate is rejected for
    pub reject: Vec<ObjectIdentifier>,
}

impl TrustSettings {
    fn is_empty(&self) -> bool {
        self.trust.is_empty() && self.reject.is_empty()
    }

    fn status_for(&self, usage: ObjectIdentifier) -> TrustStatus {
        if self.reject.contains(&usage) {
            TrustStatus::Rejected
        } else if self.trust.contains(&usage) {
            TrustStatus::Trusted
        } else {
            TrustStatus::Untrusted
        }
    }
}

type TrustCheck = fn(&Certificate, Option<ObjectIdentifier>) -> TrustStatus;

struct TrustEntry {
    id: TrustId,
    name: &'static str,
    usage: Option<ObjectIdentifier>,
    check: TrustCheck,
}

static TRUST_TABLE: [TrustEntry; 8] = [
    TrustEntry {
        id: TrustId::Compat,
        name: "compatible",
        usage: None,
        check: trust_compat,
    },
    TrustEntry {
        id: TrustId::SslClient,
        name: "SSL Client",
        usage: Some(OID_KP_CLIENT_AUTH),
        check: trust_usage_or_compat,
    },
    TrustEntry {
        id: TrustId::SslServer,
        name: "SSL Server",
        usage: Some(OID_KP_SERVER_AUTH),
        check: trust_usage_or_compat,
    },
    TrustEntry {
        id: TrustId::Email,
        name: "S/MIME email",
        usage: Some(OID_KP_EMAIL_PROTECTION),
        check: trust_usage_or_compat,
    },
    TrustEntry {
        id: TrustId::ObjectSign,
        name: "Object Signer",
        usage: Some(OID_KP_CODE_SIGNING),
        check: trust_usage_or_compat,
    },
    TrustEntry {
        id: TrustId::OcspSign,
        name: "OCSP responder",
        usage: Some(OID_KP_OCSP_SIGNING),
        check: trust_usage,
    },
    TrustEntry {
        id: TrustId::OcspRequest,
        name: "OCSP request",
        usage: Some(OID_AD_OCSP),
        check: trust_usage,
    },
    TrustEntry {
        id: TrustId::Tsa,
        name: "TSA server",
        usage: Some(OID_KP_TIME_STAMPING),
        check: trust_usage_or_compat,
    },
];

/// Self-signed certificates are trusted, everything else is not.
fn trust_compat(certificate: &Certificate, _usage: Option<ObjectIdentifier>) -> TrustStatus {
    if certificate.is_self_issued() {
        TrustStatus::Trusted
    } else {
        TrustStatus::Untrusted
    }
}

/// Explicit settings decide when present, otherwise fall back to
/// [`trust_compat`].
fn trust_usage_or_compat(
    certificate: &Certificate,
    usage: Option<ObjectIdentifier>,
) -> TrustStatus {
    match (certificate.trust_settings(), usage) {
        (Some(settings), Some(usage)) if !settings.is_empty() => settings.status_for(usage),
        _ => trust_compat(certificate, usage),
    }
}

/// Only explicit settings can grant trust.
fn trust_usage(certificate: &Certificate, usage: Option<ObjectIdentifier>) -> TrustStatus {
    match (certificate.trust_settings(), usage) {
        (Some(settings), Some(usage)) => settings.status_for(usage),
        _ => TrustStatus::Untrusted,
    }
}

impl TrustId {
    fn entry(&self) -> &'static TrustEntry {
        // The table holds one entry per variant in declaration order
        &TRUST_TABLE[self.id() as usize - 1]
    }

    /// The conventional numeric identifier, starting at 1
    pub fn id(&self) -> u32 {
        match self {
            TrustId::Compat => 1,
            TrustId::SslClient => 2,
            TrustId::SslServer => 3,
            TrustId::Email => 4,
            TrustId::ObjectSign => 5,
            TrustId::OcspSign => 6,
            TrustId::OcspRequest => 7,
            TrustId::Tsa => 8,
        }
    }

    /// Human readable name
    pub fn name(&self) -> &'static str {
        self.entry().name
    }

    /// Classify `certificate` for this trust level
    pub fn check(&self, certificate: &Certificate) -> TrustStatus {
        let entry = self.entry();
        (entry.check)(certificate, entry.usage)
    }
}

impl TryFrom<u32> for TrustId {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        TRUST_TABLE
            .iter()
            .find(|entry| entry.id.id() == id)
            .map(|entry| entry.id)
            .ok_or(Error::UnknownTrust(id))
    }
}
