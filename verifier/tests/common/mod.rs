// Copyright (c) 2023 The MobileCoin Foundation

//! A small CA hierarchy built from deterministic P-256 keys.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use x509_cert::certificate::Version;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_store_verifier::x509::{
    BasicConstraints, Certificate, CertificateParts, CertificateRevocationList, CrlParts,
    DistinguishedName, Extensions, KeyUsage, PublicKey, SignedBytes,
};
use x509_store_verifier::{Store, StoreContext, Verdict, VerifyError};

pub const ROOT_CA: &str = include_str!("../data/root_ca.pem");
pub const PROCESSOR_CA: &str = include_str!("../data/processor_ca.pem");
pub const PCK_CERTIFICATE: &str = include_str!("../data/pck_certificate.pem");

/// The time every fixture is valid at
pub const NOW: Duration = Duration::from_secs(1_000_000);

/// Validity window of fixture certificates unless a test overrides it
const LIFETIME: u64 = 100_000;

pub fn signing_key(seed: u64) -> SigningKey {
    SigningKey::random(&mut StdRng::seed_from_u64(seed))
}

fn name(name: &str) -> DistinguishedName {
    DistinguishedName::from_str(name).expect("valid name")
}

fn sign(key: &SigningKey, tbs: Vec<u8>) -> SignedBytes {
    let signature: Signature = key.sign(&tbs);
    let algorithm = AlgorithmIdentifierOwned {
        oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
        parameters: None,
    };
    SignedBytes::new(tbs, algorithm, signature.to_der().as_bytes().to_vec())
}

pub fn ca_extensions(path_len: Option<u32>) -> Extensions {
    Extensions {
        basic_constraints: Some(BasicConstraints { ca: true, path_len }),
        key_usage: Some(KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN),
        ..Default::default()
    }
}

pub fn leaf_extensions() -> Extensions {
    Extensions {
        basic_constraints: Some(BasicConstraints::default()),
        key_usage: Some(KeyUsage::DIGITAL_SIGNATURE),
        ..Default::default()
    }
}

/// What a fixture certificate says about its subject
pub struct Subject {
    pub name: String,
    pub serial: u8,
    pub key: SigningKey,
    pub not_before: Duration,
    pub not_after: Duration,
    pub extensions: Extensions,
}

impl Subject {
    pub fn new(name: &str, serial: u8, extensions: Extensions) -> Self {
        Self {
            name: name.to_owned(),
            serial,
            key: signing_key(u64::from(serial)),
            not_before: NOW - Duration::from_secs(LIFETIME),
            not_after: NOW + Duration::from_secs(LIFETIME),
            extensions,
        }
    }

    pub fn valid(mut self, not_before: Duration, not_after: Duration) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    fn certificate(&self, issuer: &str, signer: &SigningKey) -> Arc<Certificate> {
        let mut tbs = format!("{}/{}/{}", self.name, issuer, self.serial).into_bytes();
        tbs.extend(self.not_before.as_secs().to_be_bytes());
        tbs.extend(self.not_after.as_secs().to_be_bytes());
        Arc::new(Certificate::from_parts(CertificateParts {
            version: Version::V3,
            serial_number: vec![self.serial],
            subject: name(&self.name),
            issuer: name(issuer),
            not_before: self.not_before,
            not_after: self.not_after,
            public_key: Some(PublicKey::from(*self.key.verifying_key())),
            extensions: self.extensions.clone(),
            signed: sign(signer, tbs),
        }))
    }
}

/// A certificate authority able to issue certificates and CRLs
pub struct Ca {
    pub name: String,
    pub key: SigningKey,
    pub certificate: Arc<Certificate>,
}

impl Ca {
    /// A self-signed root
    pub fn root(name: &str, serial: u8, path_len: Option<u32>) -> Self {
        let subject = Subject::new(name, serial, ca_extensions(path_len));
        let certificate = subject.certificate(name, &subject.key);
        Self {
            name: subject.name,
            key: subject.key,
            certificate,
        }
    }

    /// A CA below this one
    pub fn intermediate(&self, name: &str, serial: u8, path_len: Option<u32>) -> Self {
        let subject = Subject::new(name, serial, ca_extensions(path_len));
        let certificate = self.issue(&subject);
        Self {
            name: subject.name,
            key: subject.key,
            certificate,
        }
    }

    /// An end entity certificate
    pub fn leaf(&self, name: &str, serial: u8) -> Arc<Certificate> {
        self.issue(&Subject::new(name, serial, leaf_extensions()))
    }

    pub fn issue(&self, subject: &Subject) -> Arc<Certificate> {
        subject.certificate(&self.name, &self.key)
    }

    /// A CRL current at [`NOW`] revoking `serials`
    pub fn crl(&self, serials: &[u8]) -> Arc<CertificateRevocationList> {
        let mut tbs = format!("crl/{}", self.name).into_bytes();
        tbs.extend(serials);
        Arc::new(CertificateRevocationList::from_parts(CrlParts {
            issuer: name(&self.name),
            this_update: NOW - Duration::from_secs(10),
            next_update: Some(NOW + Duration::from_secs(10)),
            revoked: serials.iter().map(|serial| vec![*serial]).collect(),
            critical: vec![],
            signed: sign(&self.key, tbs),
        }))
    }
}

/// Root, intermediate and leaf, with the root trusted by a store checking
/// at [`NOW`]
pub struct Hierarchy {
    pub root: Ca,
    pub intermediate: Ca,
    pub leaf: Arc<Certificate>,
    pub store: Store,
}

impl Hierarchy {
    pub fn new() -> Self {
        let root = Ca::root("CN=Test Root,O=Example", 1, None);
        let intermediate = root.intermediate("CN=Test Intermediate,O=Example", 2, Some(0));
        let leaf = intermediate.leaf("CN=leaf.example.com", 3);
        let store = Store::new();
        store
            .add_certificate(root.certificate.clone())
            .expect("Failed to add root");
        store.set_time(NOW);
        Self {
            root,
            intermediate,
            leaf,
            store,
        }
    }
}

/// A verify callback that records every fault and always continues
pub fn record_faults() -> (
    Arc<std::sync::Mutex<Vec<(VerifyError, usize)>>>,
    impl Fn(bool, &StoreContext) -> Verdict + Send + Sync + 'static,
) {
    let faults = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorded = faults.clone();
    let callback = move |ok: bool, ctx: &StoreContext| {
        if let (false, Some(error)) = (ok, ctx.error()) {
            recorded
                .lock()
                .expect("lock")
                .push((error, ctx.error_depth()));
        }
        Verdict::Continue
    };
    (faults, callback)
}
