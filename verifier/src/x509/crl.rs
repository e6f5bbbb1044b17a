// Copyright (c) 2023 The MobileCoin Foundation

//! Certificate revocation lists as defined in
//! [section 5](https://datatracker.ietf.org/doc/html/rfc5280#section-5) of
//! RFC5280.

use super::algorithm::{PublicKey, SignedBytes};
use super::name::DistinguishedName;
use crate::{Error, Result};
use const_oid::ObjectIdentifier;
use core::time::Duration;
use x509_cert::crl::CertificateList;
use x509_cert::der::{Decode, Encode};

/// The pieces of a CRL handed over by an external parser.
#[derive(Debug, Clone)]
pub struct CrlParts {
    /// The CRL issuer name
    pub issuer: DistinguishedName,
    /// When this CRL was issued, since the unix epoch
    pub this_update: Duration,
    /// When the next CRL will be issued, since the unix epoch
    pub next_update: Option<Duration>,
    /// Serial numbers of the revoked certificates
    pub revoked: Vec<Vec<u8>>,
    /// Identifiers of the critical CRL and CRL entry extensions
    pub critical: Vec<ObjectIdentifier>,
    /// Signed bytes and signature
    pub signed: SignedBytes,
}

/// A certificate revocation list
#[derive(Debug, Clone)]
pub struct CertificateRevocationList {
    parts: CrlParts,
}

impl CertificateRevocationList {
    /// Build a CRL from already parsed pieces.
    pub fn from_parts(mut parts: CrlParts) -> Self {
        parts.revoked.sort_unstable();
        parts.revoked.dedup();
        Self { parts }
    }

    /// Decode a PEM encoded CRL
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self> {
        // `CertificateList` does not implement `PemLabel` in x509-cert 0.2,
        // so do what `DecodePem::from_pem` would with the RFC 7468 CRL label.
        let (label, der_bytes) = x509_cert::der::pem::decode_vec(pem.as_ref())
            .map_err(x509_cert::der::Error::from)?;
        if label != "X509 CRL" {
            return Err(x509_cert::der::Error::from(
                x509_cert::der::pem::Error::UnexpectedTypeLabel {
                    expected: "X509 CRL",
                },
            )
            .into());
        }
        let crl = CertificateList::from_der(&der_bytes)?;
        Self::try_from(&crl)
    }

    /// The issuer name
    pub fn issuer(&self) -> &DistinguishedName {
        &self.parts.issuer
    }

    /// Time this CRL was issued
    pub fn this_update(&self) -> Duration {
        self.parts.this_update
    }

    /// Time the next CRL is due
    pub fn next_update(&self) -> Option<Duration> {
        self.parts.next_update
    }

    /// Identifiers of the critical extensions
    pub fn critical_extensions(&self) -> &[ObjectIdentifier] {
        &self.parts.critical
    }

    /// Is the certificate with `serial_number` revoked by this CRL
    pub fn is_revoked(&self, serial_number: &[u8]) -> bool {
        self.parts
            .revoked
            .binary_search_by(|revoked| revoked.as_slice().cmp(serial_number))
            .is_ok()
    }

    /// Verify this CRL's signature with the `key` of its issuer
    pub fn verify_signature(&self, key: &PublicKey) -> Result<()> {
        self.parts.signed.verify(key)
    }

    /// Whether `now` lies inside `[this_update, next_update)`
    pub(crate) fn is_current(&self, now: Duration) -> bool {
        self.parts.this_update < now && self.parts.next_update.map_or(true, |next| next > now)
    }
}

/// Two CRLs are the same CRL when their signed bytes and signatures match
impl PartialEq for CertificateRevocationList {
    fn eq(&self, other: &Self) -> bool {
        self.parts.signed == other.parts.signed
    }
}

impl Eq for CertificateRevocationList {}

impl TryFrom<&CertificateList> for CertificateRevocationList {
    type Error = Error;

    fn try_from(crl: &CertificateList) -> Result<Self> {
        let tbs = &crl.tbs_cert_list;
        let mut critical = tbs
            .crl_extensions
            .iter()
            .flatten()
            .filter(|extension| extension.critical)
            .map(|extension| extension.extn_id)
            .collect::<Vec<_>>();
        let mut revoked = Vec::new();
        for entry in tbs.revoked_certificates.iter().flatten() {
            revoked.push(entry.serial_number.as_bytes().to_vec());
            critical.extend(
                entry
                    .crl_entry_extensions
                    .iter()
                    .flatten()
                    .filter(|extension| extension.critical)
                    .map(|extension| extension.extn_id),
            );
        }
        let signed = SignedBytes::new(
            tbs.to_der()?,
            crl.signature_algorithm.clone(),
            crl.signature.raw_bytes().to_vec(),
        );
        Ok(Self::from_parts(CrlParts {
            issuer: DistinguishedName::from(&tbs.issuer),
            this_update: tbs.this_update.to_unix_duration(),
            next_update: tbs.next_update.map(|time| time.to_unix_duration()),
            revoked,
            critical,
            signed,
        }))
    }
}

/// Decode a DER encoded CRL
impl TryFrom<&[u8]> for CertificateRevocationList {
    type Error = Error;

    fn try_from(der_bytes: &[u8]) -> Result<Self> {
        let crl = CertificateList::from_der(der_bytes)?;
        Self::try_from(&crl)
    }
}
