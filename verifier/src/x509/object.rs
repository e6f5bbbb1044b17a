// Copyright (c) 2023 The MobileCoin Foundation

//! A single entry of a lookup source, either a certificate or a CRL.

use super::certificate::Certificate;
use super::crl::CertificateRevocationList;
use super::name::{DistinguishedName, NameKey};
use std::sync::Arc;

/// The kind of an [`X509Object`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// A certificate
    Certificate,
    /// A certificate revocation list
    Crl,
}

/// A certificate or CRL held by a lookup source
#[derive(Debug, Clone)]
pub enum X509Object {
    /// A certificate
    Certificate(Arc<Certificate>),
    /// A certificate revocation list
    Crl(Arc<CertificateRevocationList>),
}

impl X509Object {
    /// The kind of object
    pub fn kind(&self) -> ObjectKind {
        match self {
            X509Object::Certificate(_) => ObjectKind::Certificate,
            X509Object::Crl(_) => ObjectKind::Crl,
        }
    }

    /// The name this object is indexed by.
    ///
    /// The subject for certificates and the issuer for CRLs.
    pub fn subject(&self) -> &DistinguishedName {
        match self {
            X509Object::Certificate(certificate) => certificate.subject(),
            X509Object::Crl(crl) => crl.issuer(),
        }
    }

    /// The lookup key of [`X509Object::subject`]
    pub fn key(&self) -> &NameKey {
        self.subject().key()
    }

    /// The certificate, if this is one
    pub fn certificate(&self) -> Option<&Arc<Certificate>> {
        match self {
            X509Object::Certificate(certificate) => Some(certificate),
            X509Object::Crl(_) => None,
        }
    }

    /// The CRL, if this is one
    pub fn crl(&self) -> Option<&Arc<CertificateRevocationList>> {
        match self {
            X509Object::Certificate(_) => None,
            X509Object::Crl(crl) => Some(crl),
        }
    }
}

/// Objects are equal when they are the same kind and the same certificate or
/// CRL
impl PartialEq for X509Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (X509Object::Certificate(a), X509Object::Certificate(b)) => a == b,
            (X509Object::Crl(a), X509Object::Crl(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for X509Object {}

impl From<Certificate> for X509Object {
    fn from(certificate: Certificate) -> Self {
        X509Object::Certificate(Arc::new(certificate))
    }
}

impl From<Arc<Certificate>> for X509Object {
    fn from(certificate: Arc<Certificate>) -> Self {
        X509Object::Certificate(certificate)
    }
}

impl From<CertificateRevocationList> for X509Object {
    fn from(crl: CertificateRevocationList) -> Self {
        X509Object::Crl(Arc::new(crl))
    }
}

impl From<Arc<CertificateRevocationList>> for X509Object {
    fn from(crl: Arc<CertificateRevocationList>) -> Self {
        X509Object::Crl(crl)
    }
}
