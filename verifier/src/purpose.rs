// Copyright (c) 2023 The MobileCoin Foundation

//! Certificate purposes.
//!
//! A purpose decides whether a certificate may be used for something, e.g.
//! as an SSL server certificate, based on its key usage, extended key usage,
//! basic constraints and Netscape certificate type extensions. The same
//! purpose is asked differently of the leaf and of the CAs above it, so each
//! predicate takes whether the certificate is being used as a CA.

use crate::trust::TrustId;
use crate::x509::{Certificate, KeyUsage, NetscapeCertType};
use crate::Error;
use const_oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};
use x509_cert::certificate::Version;

const OID_KP_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
const OID_KP_CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");
const OID_KP_CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
const OID_KP_EMAIL_PROTECTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.4");
const OID_KP_TIME_STAMPING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.8");
const OID_KP_OCSP_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.9");
const OID_NETSCAPE_SGC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113730.4.1");
const OID_MICROSOFT_SGC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.10.3.3");

/// What a certificate's extensions say about it being a CA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaStatus {
    /// Not a CA
    NotCa,
    /// Basic constraints mark it as a CA
    Ca,
    /// A version 1 self-signed certificate without basic constraints
    V1Root,
    /// No basic constraints but key usage allows certificate signing
    KeyUsageTolerated,
    /// No basic constraints but a Netscape CA certificate type
    NetscapeCa,
}

impl CaStatus {
    /// Classify `certificate`
    pub fn of(certificate: &Certificate) -> Self {
        let extensions = certificate.extensions();
        if key_usage_rejects(certificate, KeyUsage::KEY_CERT_SIGN) {
            return CaStatus::NotCa;
        }
        match extensions.basic_constraints {
            Some(constraints) if constraints.ca => CaStatus::Ca,
            Some(_) => CaStatus::NotCa,
            None if certificate.version() == Version::V1 && certificate.is_self_issued() => {
                CaStatus::V1Root
            }
            None if extensions.key_usage.is_some() => CaStatus::KeyUsageTolerated,
            None if extensions
                .netscape_cert_type
                .map_or(false, |bits| bits.intersects(NetscapeCertType::ANY_CA)) =>
            {
                CaStatus::NetscapeCa
            }
            None => CaStatus::NotCa,
        }
    }

    fn suitability(self) -> Suitability {
        match self {
            CaStatus::NotCa => Suitability::Unsuitable,
            CaStatus::Ca => Suitability::Suitable,
            _ => Suitability::Tolerated,
        }
    }
}

/// Outcome of checking a certificate against a [`Purpose`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suitability {
    /// The certificate may not be used for the purpose
    Unsuitable,
    /// The certificate may be used for the purpose
    Suitable,
    /// Acceptable unless strict checking is requested
    Tolerated,
}

impl Suitability {
    /// Whether this passes, `strict` rejects [`Suitability::Tolerated`]
    pub fn passes(self, strict: bool) -> bool {
        match self {
            Suitability::Unsuitable => false,
            Suitability::Suitable => true,
            Suitability::Tolerated => !strict,
        }
    }
}

/// A purpose a chain can be verified for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// SSL client
    SslClient,
    /// SSL server
    SslServer,
    /// Netscape SSL server
    NsSslServer,
    /// S/MIME signing
    SmimeSign,
    /// S/MIME encryption
    SmimeEncrypt,
    /// CRL signing
    CrlSign,
    /// Any purpose
    Any,
    /// OCSP helper
    OcspHelper,
    /// Time stamp signing
    TimestampSign,
}

type PurposeCheck = fn(&Certificate, bool) -> Suitability;

struct PurposeEntry {
    purpose: Purpose,
    trust: Option<TrustId>,
    short_name: &'static str,
    name: &'static str,
    check: PurposeCheck,
}

static PURPOSE_TABLE: [PurposeEntry; 9] = [
    PurposeEntry {
        purpose: Purpose::SslClient,
        trust: Some(TrustId::SslClient),
        short_name: "sslclient",
        name: "SSL client",
        check: check_ssl_client,
    },
    PurposeEntry {
        purpose: Purpose::SslServer,
        trust: Some(TrustId::SslServer),
        short_name: "sslserver",
        name: "SSL server",
        check: check_ssl_server,
    },
    PurposeEntry {
        purpose: Purpose::NsSslServer,
        trust: Some(TrustId::SslServer),
        short_name: "nssslserver",
        name: "Netscape SSL server",
        check: check_ns_ssl_server,
    },
    PurposeEntry {
        purpose: Purpose::SmimeSign,
        trust: Some(TrustId::Email),
        short_name: "smimesign",
        name: "S/MIME signing",
        check: check_smime_sign,
    },
    PurposeEntry {
        purpose: Purpose::SmimeEncrypt,
        trust: Some(TrustId::Email),
        short_name: "smimeencrypt",
        name: "S/MIME encryption",
        check: check_smime_encrypt,
    },
    PurposeEntry {
        purpose: Purpose::CrlSign,
        trust: Some(TrustId::Compat),
        short_name: "crlsign",
        name: "CRL signing",
        check: check_crl_sign,
    },
    PurposeEntry {
        purpose: Purpose::Any,
        trust: None,
        short_name: "any",
        name: "Any Purpose",
        check: check_any,
    },
    PurposeEntry {
        purpose: Purpose::OcspHelper,
        trust: Some(TrustId::Compat),
        short_name: "ocsphelper",
        name: "OCSP helper",
        check: check_ocsp_helper,
    },
    PurposeEntry {
        purpose: Purpose::TimestampSign,
        trust: Some(TrustId::Tsa),
        short_name: "timestampsign",
        name: "Time Stamp signing",
        check: check_timestamp_sign,
    },
];

impl Purpose {
    fn entry(&self) -> &'static PurposeEntry {
        // The table holds one entry per variant in declaration order
        &PURPOSE_TABLE[self.id() as usize - 1]
    }

    /// The conventional numeric identifier, starting at 1
    pub fn id(&self) -> u32 {
        match self {
            Purpose::SslClient => 1,
            Purpose::SslServer => 2,
            Purpose::NsSslServer => 3,
            Purpose::SmimeSign => 4,
            Purpose::SmimeEncrypt => 5,
            Purpose::CrlSign => 6,
            Purpose::Any => 7,
            Purpose::OcspHelper => 8,
            Purpose::TimestampSign => 9,
        }
    }

    /// Short name such as `sslserver`
    pub fn short_name(&self) -> &'static str {
        self.entry().short_name
    }

    /// Human readable name
    pub fn name(&self) -> &'static str {
        self.entry().name
    }

    /// The trust level that goes with this purpose, `None` for
    /// [`Purpose::Any`]
    pub fn default_trust(&self) -> Option<TrustId> {
        self.entry().trust
    }

    /// Look up a purpose by its short name
    pub fn from_short_name(name: &str) -> Option<Self> {
        PURPOSE_TABLE
            .iter()
            .find(|entry| entry.short_name == name)
            .map(|entry| entry.purpose)
    }

    /// Check `certificate` for this purpose, `ca` when it is used to issue
    /// other certificates in the chain.
    pub fn check(&self, certificate: &Certificate, ca: bool) -> Suitability {
        (self.entry().check)(certificate, ca)
    }
}

impl TryFrom<u32> for Purpose {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        PURPOSE_TABLE
            .iter()
            .find(|entry| entry.purpose.id() == id)
            .map(|entry| entry.purpose)
            .ok_or(Error::UnknownPurpose(id))
    }
}

/// Key usage is present and allows none of `usage`
fn key_usage_rejects(certificate: &Certificate, usage: KeyUsage) -> bool {
    certificate
        .extensions()
        .key_usage
        .map_or(false, |bits| !bits.intersects(usage))
}

/// Extended key usage is present and allows none of `usages`
fn extended_key_usage_rejects(certificate: &Certificate, usages: &[ObjectIdentifier]) -> bool {
    certificate
        .extensions()
        .extended_key_usage
        .as_ref()
        .map_or(false, |present| !present.iter().any(|oid| usages.contains(oid)))
}

/// Netscape certificate type is present and allows none of `usage`
fn netscape_rejects(certificate: &Certificate, usage: NetscapeCertType) -> bool {
    certificate
        .extensions()
        .netscape_cert_type
        .map_or(false, |bits| !bits.intersects(usage))
}

/// A CA check where a Netscape-only CA must also carry `netscape_ca`
fn check_ca_with_netscape(certificate: &Certificate, netscape_ca: NetscapeCertType) -> Suitability {
    match CaStatus::of(certificate) {
        CaStatus::NetscapeCa
            if !certificate
                .extensions()
                .netscape_cert_type
                .map_or(false, |bits| bits.intersects(netscape_ca)) =>
        {
            Suitability::Unsuitable
        }
        status => status.suitability(),
    }
}

fn check_ssl_client(certificate: &Certificate, ca: bool) -> Suitability {
    if extended_key_usage_rejects(certificate, &[OID_KP_CLIENT_AUTH]) {
        return Suitability::Unsuitable;
    }
    if ca {
        return check_ca_with_netscape(certificate, NetscapeCertType::SSL_CA);
    }
    if key_usage_rejects(
        certificate,
        KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT,
    ) || netscape_rejects(certificate, NetscapeCertType::SSL_CLIENT)
    {
        return Suitability::Unsuitable;
    }
    Suitability::Suitable
}

fn check_ssl_server(certificate: &Certificate, ca: bool) -> Suitability {
    if extended_key_usage_rejects(
        certificate,
        &[OID_KP_SERVER_AUTH, OID_NETSCAPE_SGC, OID_MICROSOFT_SGC],
    ) {
        return Suitability::Unsuitable;
    }
    if ca {
        return check_ca_with_netscape(certificate, NetscapeCertType::SSL_CA);
    }
    if netscape_rejects(certificate, NetscapeCertType::SSL_SERVER)
        || key_usage_rejects(
            certificate,
            KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_ENCIPHERMENT | KeyUsage::KEY_AGREEMENT,
        )
    {
        return Suitability::Unsuitable;
    }
    Suitability::Suitable
}

fn check_ns_ssl_server(certificate: &Certificate, ca: bool) -> Suitability {
    let result = check_ssl_server(certificate, ca);
    if result == Suitability::Unsuitable || ca {
        return result;
    }
    if key_usage_rejects(certificate, KeyUsage::KEY_ENCIPHERMENT) {
        return Suitability::Unsuitable;
    }
    result
}

fn check_smime(certificate: &Certificate, ca: bool) -> Suitability {
    if extended_key_usage_rejects(certificate, &[OID_KP_EMAIL_PROTECTION]) {
        return Suitability::Unsuitable;
    }
    if ca {
        return check_ca_with_netscape(certificate, NetscapeCertType::SMIME_CA);
    }
    match certificate.extensions().netscape_cert_type {
        Some(bits) if bits.contains(NetscapeCertType::SMIME) => Suitability::Suitable,
        // Some SSL client certificates get used for S/MIME
        Some(bits) if bits.contains(NetscapeCertType::SSL_CLIENT) => Suitability::Tolerated,
        Some(_) => Suitability::Unsuitable,
        None => Suitability::Suitable,
    }
}

fn check_smime_sign(certificate: &Certificate, ca: bool) -> Suitability {
    let result = check_smime(certificate, ca);
    if result == Suitability::Unsuitable || ca {
        return result;
    }
    if key_usage_rejects(
        certificate,
        KeyUsage::DIGITAL_SIGNATURE | KeyUsage::NON_REPUDIATION,
    ) {
        return Suitability::Unsuitable;
    }
    result
}

fn check_smime_encrypt(certificate: &Certificate, ca: bool) -> Suitability {
    let result = check_smime(certificate, ca);
    if result == Suitability::Unsuitable || ca {
        return result;
    }
    if key_usage_rejects(certificate, KeyUsage::KEY_ENCIPHERMENT) {
        return Suitability::Unsuitable;
    }
    result
}

fn check_crl_sign(certificate: &Certificate, ca: bool) -> Suitability {
    if ca {
        return CaStatus::of(certificate).suitability();
    }
    if key_usage_rejects(certificate, KeyUsage::CRL_SIGN) {
        return Suitability::Unsuitable;
    }
    Suitability::Suitable
}

fn check_any(_certificate: &Certificate, _ca: bool) -> Suitability {
    Suitability::Suitable
}

fn check_ocsp_helper(certificate: &Certificate, ca: bool) -> Suitability {
    if ca {
        return CaStatus::of(certificate).suitability();
    }
    // The responder certificate itself is checked by OCSP
    Suitability::Suitable
}

fn check_timestamp_sign(certificate: &Certificate, ca: bool) -> Suitability {
    if ca {
        return CaStatus::of(certificate).suitability();
    }
    let extensions = certificate.extensions();
    let signing = KeyUsage::DIGITAL_SIGNATURE | KeyUsage::NON_REPUDIATION;
    if let Some(bits) = extensions.key_usage {
        if !signing.contains(bits) || !bits.intersects(signing) {
            return Suitability::Unsuitable;
        }
    }
    let timestamp_only = extensions
        .extended_key_usage
        .as_ref()
        .map_or(false, |usages| {
            usages.contains(&OID_KP_TIME_STAMPING)
                && !usages.iter().any(|oid| {
                    [
                        OID_KP_SERVER_AUTH,
                        OID_KP_CLIENT_AUTH,
                        OID_KP_CODE_SIGNING,
                        OID_KP_EMAIL_PROTECTION,
                        OID_KP_OCSP_SIGNING,
                        OID_NETSCAPE_SGC,
                        OID_MICROSOFT_SGC,
                    ]
                    .contains(oid)
                })
        });
    if !timestamp_only {
        return Suitability::Unsuitable;
    }
    // Extended key usage must be critical for time stamping
    if !extensions.critical.contains(&crate::x509::OID_EXT_KEY_USAGE) {
        return Suitability::Unsuitable;
    }
    Suitability::Suitable
}
