// Copyright (c) 2023 The MobileCoin Foundation

//! Revocation checking of a built chain against CRLs.
//!
//! CRLs come from the ones supplied to the session first and the store
//! second. Only certificate serial numbers are matched, delta CRLs and
//! distribution points are not considered.

use super::StoreContext;
use crate::param::VerifyFlags;
use crate::strategy::{CertificateCrlCheck, CrlCheck, CrlLookup, RevocationCheck, Verdict};
use crate::x509::{Certificate, CertificateRevocationList, KeyUsage, ObjectKind};
use crate::VerifyError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Checks the chain against CRLs when [`VerifyFlags::CRL_CHECK`] is set.
///
/// Only the target is checked unless [`VerifyFlags::CRL_CHECK_ALL`] is set
/// as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrlRevocationCheck;

impl RevocationCheck for CrlRevocationCheck {
    fn check_revocation(&self, ctx: &mut StoreContext) -> Verdict {
        let flags = ctx.param.flags();
        if !flags.contains(VerifyFlags::CRL_CHECK) || ctx.chain.is_empty() {
            return Verdict::Continue;
        }
        let last = if flags.contains(VerifyFlags::CRL_CHECK_ALL) {
            ctx.chain.len() - 1
        } else {
            0
        };
        for depth in 0..=last {
            ctx.error_depth = depth;
            if ctx.check_certificate().is_abort() {
                return Verdict::Abort;
            }
        }
        Verdict::Continue
    }
}

/// Picks the session's CRL for the certificate's issuer, then the store's.
///
/// Among the session's CRLs the first one current at the check time wins.
/// A stale one is only used when the store has nothing better.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCrlLookup;

impl CrlLookup for DefaultCrlLookup {
    fn find_crl(
        &self,
        ctx: &mut StoreContext,
        certificate: &Certificate,
    ) -> Option<Arc<CertificateRevocationList>> {
        let issuer = certificate.issuer();
        let now = ctx.check_time();
        let mut best = None;
        for crl in ctx.crls.iter().filter(|crl| crl.issuer() == issuer) {
            if crl.is_current(now) {
                return Some(crl.clone());
            }
            best = Some(crl.clone());
        }

        match ctx.by_subject(ObjectKind::Crl, issuer) {
            Ok(Some(object)) => object.crl().cloned().or(best),
            Ok(None) => best,
            Err(error) => {
                warn!(%issuer, %error, "CRL lookup failed");
                best
            }
        }
    }
}

/// Checks a CRL's issuer, signature and validity window.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCrlCheck;

impl CrlCheck for DefaultCrlCheck {
    fn check_crl(&self, ctx: &mut StoreContext, crl: &Arc<CertificateRevocationList>) -> Verdict {
        let depth = ctx.error_depth;
        let last = ctx.chain.len() - 1;
        let issuer = if depth < last {
            ctx.chain[depth + 1].clone()
        } else {
            let issuer = ctx.chain[last].clone();
            if !ctx.check_issued(&issuer, &issuer)
                && ctx.fault(VerifyError::UnableToGetCrlIssuer).is_abort()
            {
                return Verdict::Abort;
            }
            issuer
        };
        ctx.current_issuer = Some(issuer.clone());

        let may_sign_crls = issuer
            .extensions()
            .key_usage
            .map_or(true, |usage| usage.contains(KeyUsage::CRL_SIGN));
        if !may_sign_crls && ctx.fault(VerifyError::KeyUsageNoCrlSign).is_abort() {
            return Verdict::Abort;
        }

        let signature_fault = match issuer.public_key() {
            None => Some(VerifyError::UnableToDecodeIssuerPublicKey),
            Some(key) => crl
                .verify_signature(key)
                .err()
                .map(|_| VerifyError::CrlSignatureFailure),
        };
        if let Some(fault) = signature_fault {
            if ctx.fault(fault).is_abort() {
                return Verdict::Abort;
            }
        }

        ctx.check_crl_time(crl)
    }
}

/// Looks the certificate's serial number up in the CRL.
///
/// A CRL carrying critical extensions is rejected unless
/// [`VerifyFlags::IGNORE_CRITICAL`] is set, none of them are understood.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCertificateCrlCheck;

impl CertificateCrlCheck for DefaultCertificateCrlCheck {
    fn check_certificate(
        &self,
        ctx: &mut StoreContext,
        crl: &Arc<CertificateRevocationList>,
        certificate: &Arc<Certificate>,
    ) -> Verdict {
        if crl.is_revoked(certificate.serial_number())
            && ctx.fault(VerifyError::CertRevoked).is_abort()
        {
            return Verdict::Abort;
        }
        if ctx.param.flags().contains(VerifyFlags::IGNORE_CRITICAL) {
            return Verdict::Continue;
        }
        if !crl.critical_extensions().is_empty() {
            return ctx.fault(VerifyError::UnhandledCriticalCrlExtension);
        }
        Verdict::Continue
    }
}

impl StoreContext {
    /// Record `error` at the current depth and ask the verify callback how to
    /// go on.
    fn fault(&mut self, error: VerifyError) -> Verdict {
        self.error = Some(error);
        self.notify(false)
    }

    /// Check the certificate at the session's error depth for revocation.
    fn check_certificate(&mut self) -> Verdict {
        let certificate = self.chain[self.error_depth].clone();
        self.current_certificate = Some(certificate.clone());

        let lookup = self.strategies.crl_lookup.clone();
        let Some(crl) = lookup.find_crl(self, &certificate) else {
            debug!(subject = %certificate.subject(), "no CRL for certificate");
            self.error = Some(VerifyError::UnableToGetCrl);
            let verdict = self.notify(false);
            self.current_crl = None;
            return verdict;
        };
        self.current_crl = Some(crl.clone());

        let crl_check = self.strategies.crl_check.clone();
        if crl_check.check_crl(self, &crl).is_abort() {
            self.current_crl = None;
            return Verdict::Abort;
        }

        let certificate_check = self.strategies.certificate_crl_check.clone();
        let verdict = certificate_check.check_certificate(self, &crl, &certificate);
        self.current_crl = None;
        verdict
    }

    /// Check `crl`'s update window against the check time.
    fn check_crl_time(&mut self, crl: &Arc<CertificateRevocationList>) -> Verdict {
        let now = self.check_time();
        self.current_crl = Some(crl.clone());

        if crl.this_update() >= now && self.fault(VerifyError::CrlNotYetValid).is_abort() {
            return Verdict::Abort;
        }
        if let Some(next_update) = crl.next_update() {
            if next_update <= now && self.fault(VerifyError::CrlHasExpired).is_abort() {
                return Verdict::Abort;
            }
        }

        self.current_crl = None;
        Verdict::Continue
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::Store;
    use crate::strategy::IssuedCheck;
    use crate::x509::{
        BasicConstraints, CertificateParts, CrlParts, DistinguishedName, Extensions, PublicKey,
        SignedBytes,
    };
    use const_oid::ObjectIdentifier;
    use core::str::FromStr;
    use core::time::Duration;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::{Signature, SigningKey};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;
    use x509_cert::certificate::Version;
    use x509_cert::spki::AlgorithmIdentifierOwned;
    use yare::parameterized;

    const NOW: u64 = 1_000_000;

    fn algorithm() -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),
            parameters: None,
        }
    }

    fn key(seed: u64) -> SigningKey {
        SigningKey::random(&mut StdRng::seed_from_u64(seed))
    }

    fn sign(key: &SigningKey, tbs: Vec<u8>) -> SignedBytes {
        let signature: Signature = key.sign(&tbs);
        SignedBytes::new(tbs, algorithm(), signature.to_der().as_bytes().to_vec())
    }

    fn certificate(
        name: &str,
        issuer: &str,
        serial: u8,
        key: &SigningKey,
        extensions: Extensions,
    ) -> Arc<Certificate> {
        Arc::new(Certificate::from_parts(CertificateParts {
            version: Version::V3,
            serial_number: vec![serial],
            subject: DistinguishedName::from_str(name).expect("valid name"),
            issuer: DistinguishedName::from_str(issuer).expect("valid name"),
            not_before: Duration::from_secs(0),
            not_after: Duration::from_secs(NOW * 2),
            public_key: Some(PublicKey::from(*key.verifying_key())),
            extensions,
            signed: SignedBytes::new(name.as_bytes().to_vec(), algorithm(), vec![]),
        }))
    }

    fn root(key: &SigningKey, key_usage: Option<KeyUsage>) -> Arc<Certificate> {
        let extensions = Extensions {
            basic_constraints: Some(BasicConstraints {
                ca: true,
                path_len: None,
            }),
            key_usage,
            ..Default::default()
        };
        certificate("CN=Root", "CN=Root", 1, key, extensions)
    }

    fn leaf(serial: u8) -> Arc<Certificate> {
        certificate("CN=Leaf", "CN=Root", serial, &key(99), Extensions::default())
    }

    struct Crl {
        this_update: u64,
        next_update: Option<u64>,
        revoked: Vec<Vec<u8>>,
        critical: Vec<ObjectIdentifier>,
    }

    impl Default for Crl {
        fn default() -> Self {
            Self {
                this_update: NOW - 10,
                next_update: Some(NOW + 10),
                revoked: vec![],
                critical: vec![],
            }
        }
    }

    impl Crl {
        fn signed_by(self, key: &SigningKey) -> Arc<CertificateRevocationList> {
            let mut tbs = self.this_update.to_be_bytes().to_vec();
            tbs.extend(self.revoked.iter().flatten());
            Arc::new(CertificateRevocationList::from_parts(CrlParts {
                issuer: DistinguishedName::from_str("CN=Root").expect("valid name"),
                this_update: Duration::from_secs(self.this_update),
                next_update: self.next_update.map(Duration::from_secs),
                revoked: self.revoked,
                critical: self.critical,
                signed: sign(key, tbs),
            }))
        }
    }

    type Faults = Arc<Mutex<Vec<(VerifyError, usize)>>>;

    /// Session over `[leaf, root]` with CRL checking on, recording every
    /// fault and continuing
    fn session(
        store: Option<Store>,
        chain: Vec<Arc<Certificate>>,
        crls: Vec<Arc<CertificateRevocationList>>,
    ) -> (StoreContext, Faults) {
        let faults = Faults::default();
        let recorded = faults.clone();
        let mut ctx = StoreContext::init(store, None, Vec::<Arc<Certificate>>::new())
            .expect("session");
        ctx.last_untrusted = 1;
        ctx.chain = chain;
        ctx.set_crls(crls);
        ctx.set_flags(VerifyFlags::CRL_CHECK);
        ctx.set_time(Duration::from_secs(NOW));
        ctx.set_verify_callback(move |ok: bool, ctx: &StoreContext| {
            if let (false, Some(error)) = (ok, ctx.error()) {
                recorded
                    .lock()
                    .expect("lock")
                    .push((error, ctx.error_depth()));
            }
            Verdict::Continue
        });
        (ctx, faults)
    }

    fn faults_of(faults: &Faults) -> Vec<(VerifyError, usize)> {
        faults.lock().expect("lock").clone()
    }

    #[test]
    fn current_crl_without_the_serial_passes() {
        let root_key = key(1);
        let crl = Crl::default().signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);

        assert_eq!(CrlRevocationCheck.check_revocation(&mut ctx), Verdict::Continue);
        assert!(faults_of(&faults).is_empty());
        assert!(ctx.current_crl().is_none());
    }

    #[test]
    fn revoked_serial() {
        let root_key = key(1);
        let crl = Crl {
            revoked: vec![vec![5]],
            ..Default::default()
        }
        .signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(faults_of(&faults), vec![(VerifyError::CertRevoked, 0)]);
    }

    #[test]
    fn revocation_is_off_without_crl_check() {
        let root_key = key(1);
        let crl = Crl {
            revoked: vec![vec![5]],
            ..Default::default()
        }
        .signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);
        ctx.param_mut().clear_flags(VerifyFlags::CRL_CHECK);

        assert_eq!(CrlRevocationCheck.check_revocation(&mut ctx), Verdict::Continue);
        assert!(faults_of(&faults).is_empty());
    }

    #[test]
    fn missing_crl() {
        let root_key = key(1);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![]);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(faults_of(&faults), vec![(VerifyError::UnableToGetCrl, 0)]);
    }

    #[test]
    fn missing_crl_aborts_with_default_callback() {
        let root_key = key(1);
        let mut ctx = StoreContext::init(None, None, Vec::<Arc<Certificate>>::new())
            .expect("storeless session");
        ctx.chain = vec![leaf(5), root(&root_key, None)];
        ctx.set_flags(VerifyFlags::CRL_CHECK);

        assert_eq!(CrlRevocationCheck.check_revocation(&mut ctx), Verdict::Abort);
        assert_eq!(ctx.error(), Some(VerifyError::UnableToGetCrl));
    }

    #[test]
    fn check_all_covers_the_whole_chain() {
        let root_key = key(1);
        let crl = Crl::default().signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);
        ctx.set_flags(VerifyFlags::CRL_CHECK_ALL);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert!(faults_of(&faults).is_empty());
        assert_eq!(ctx.error_depth(), 1);
    }

    #[test]
    fn crl_signed_by_another_key() {
        let root_key = key(1);
        let crl = Crl::default().signed_by(&key(2));
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(faults_of(&faults), vec![(VerifyError::CrlSignatureFailure, 0)]);
    }

    #[test]
    fn issuer_key_usage_must_allow_crl_signing() {
        let root_key = key(1);
        let crl = Crl::default().signed_by(&root_key);
        let issuer = root(&root_key, Some(KeyUsage::KEY_CERT_SIGN));
        let (mut ctx, faults) = session(None, vec![leaf(5), issuer], vec![crl]);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(faults_of(&faults), vec![(VerifyError::KeyUsageNoCrlSign, 0)]);
    }

    #[parameterized(
        not_yet_valid = { NOW + 1, Some(NOW + 10), VerifyError::CrlNotYetValid },
        expired = { NOW - 10, Some(NOW), VerifyError::CrlHasExpired },
    )]
    fn crl_validity_window(this_update: u64, next_update: Option<u64>, expected: VerifyError) {
        let root_key = key(1);
        let crl = Crl {
            this_update,
            next_update,
            ..Default::default()
        }
        .signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(faults_of(&faults), vec![(expected, 0)]);
    }

    #[test]
    fn crl_without_next_update_never_expires() {
        let root_key = key(1);
        let crl = Crl {
            next_update: None,
            ..Default::default()
        }
        .signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert!(faults_of(&faults).is_empty());
    }

    #[test]
    fn critical_crl_extension() {
        let root_key = key(1);
        let crl = Crl {
            critical: vec![ObjectIdentifier::new_unwrap("2.5.29.28")],
            ..Default::default()
        }
        .signed_by(&root_key);
        let chain = vec![leaf(5), root(&root_key, None)];

        let (mut ctx, faults) = session(None, chain.clone(), vec![crl.clone()]);
        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(
            faults_of(&faults),
            vec![(VerifyError::UnhandledCriticalCrlExtension, 0)]
        );

        let (mut ctx, faults) = session(None, chain, vec![crl]);
        ctx.set_flags(VerifyFlags::IGNORE_CRITICAL);
        CrlRevocationCheck.check_revocation(&mut ctx);
        assert!(faults_of(&faults).is_empty());
    }

    #[test]
    fn crl_issuer_outside_chain() {
        let root_key = key(1);
        let crl = Crl::default().signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5)], vec![crl]);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(
            faults_of(&faults),
            vec![
                (VerifyError::UnableToGetCrlIssuer, 0),
                (VerifyError::CrlSignatureFailure, 0),
            ]
        );
    }

    struct NeverIssued;

    impl IssuedCheck for NeverIssued {
        fn check_issued(
            &self,
            _ctx: &mut StoreContext,
            _certificate: &Arc<Certificate>,
            _issuer: &Arc<Certificate>,
        ) -> bool {
            false
        }
    }

    #[test]
    fn terminal_crl_issuer_follows_the_issued_check() {
        let root_key = key(1);
        let crl = Crl::default().signed_by(&root_key);
        let (mut ctx, faults) = session(None, vec![leaf(5), root(&root_key, None)], vec![crl]);
        ctx.set_flags(VerifyFlags::CRL_CHECK_ALL);
        ctx.strategies.issued_check = Arc::new(NeverIssued);

        CrlRevocationCheck.check_revocation(&mut ctx);
        assert_eq!(faults_of(&faults), vec![(VerifyError::UnableToGetCrlIssuer, 1)]);
    }

    #[test]
    fn current_session_crl_wins_over_stale_one() {
        let root_key = key(1);
        let stale = Crl {
            this_update: NOW - 20,
            next_update: Some(NOW - 10),
            ..Default::default()
        }
        .signed_by(&root_key);
        let current = Crl::default().signed_by(&root_key);
        let (mut ctx, _) = session(
            None,
            vec![leaf(5), root(&root_key, None)],
            vec![stale, current.clone()],
        );

        let found = DefaultCrlLookup.find_crl(&mut ctx, &leaf(5));
        assert_eq!(found, Some(current));
    }

    #[test]
    fn store_crl_is_used_when_session_has_none() {
        let root_key = key(1);
        let crl = Crl::default().signed_by(&root_key);
        let store = Store::new();
        store.add_crl(crl.clone()).expect("first CRL");
        let (mut ctx, _) = session(Some(store), vec![leaf(5), root(&root_key, None)], vec![]);

        let found = DefaultCrlLookup.find_crl(&mut ctx, &leaf(5));
        assert_eq!(found, Some(crl));
    }

    #[test]
    fn stale_session_crl_is_the_fallback() {
        let root_key = key(1);
        let stale = Crl {
            this_update: NOW - 20,
            next_update: Some(NOW - 10),
            ..Default::default()
        }
        .signed_by(&root_key);
        let (mut ctx, _) = session(
            Some(Store::new()),
            vec![leaf(5), root(&root_key, None)],
            vec![stale.clone()],
        );

        let found = DefaultCrlLookup.find_crl(&mut ctx, &leaf(5));
        assert_eq!(found, Some(stale));
        assert_eq!(ctx.error(), None);
    }
}
