// Copyright (c) 2023 The MobileCoin Foundation

//! The X509 object model path validation works on: certificates, CRLs,
//! distinguished names and the signature primitives used to check them.

mod algorithm;
mod certificate;
mod crl;
mod name;
mod object;

pub use algorithm::{PublicKey, Signature, SignedBytes};
pub use certificate::{
    AuthorityKeyId, BasicConstraints, Certificate, CertificateParts, Extensions, KeyUsage,
    NetscapeCertType, ProxyCertInfo,
};
pub use crl::{CertificateRevocationList, CrlParts};
pub use name::{DistinguishedName, NameKey};
pub use object::{ObjectKind, X509Object};

pub(crate) use certificate::{
    OID_BASIC_CONSTRAINTS, OID_EXT_KEY_USAGE, OID_KEY_USAGE, OID_NETSCAPE_CERT_TYPE,
    OID_PROXY_CERT_INFO, OID_SUBJECT_ALT_NAME,
};
