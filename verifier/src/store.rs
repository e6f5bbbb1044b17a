// Copyright (c) 2023 The MobileCoin Foundation

//! The trust anchor store sessions verify against.

use crate::lookup::{Lookup, LookupResult, MemoryLookup};
use crate::param::{VerifyFlags, VerifyParameter};
use crate::purpose::Purpose;
use crate::strategy::{
    CertificateCrlCheck, ChainVerifier, Cleanup, CrlCheck, CrlLookup, IssuedCheck, IssuerLookup,
    RevocationCheck, Strategies, Verdict, VerifyCallback,
};
use crate::trust::TrustId;
use crate::x509::{
    Certificate, CertificateRevocationList, DistinguishedName, ObjectKind, X509Object,
};
use crate::{Error, Result, StoreContext, VerifyError};
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Provides trust material to [`Store::load`]
pub trait TrustSource {
    /// The certificates and CRLs to add.
    ///
    /// # Errors
    /// Whatever prevented the source from producing its objects.
    fn objects(&self) -> Result<Vec<X509Object>>;
}

impl TrustSource for Vec<X509Object> {
    fn objects(&self) -> Result<Vec<X509Object>> {
        Ok(self.clone())
    }
}

impl TrustSource for [X509Object] {
    fn objects(&self) -> Result<Vec<X509Object>> {
        Ok(self.to_vec())
    }
}

/// What [`Store::load`] did with a source's objects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loaded {
    /// Objects added to the store
    pub added: usize,
    /// Objects skipped because the store already held them
    pub duplicates: usize,
}

/// The result of [`Store::verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// The chain verified, possibly past faults the callback allowed
    pub ok: bool,
    /// The last fault reported, if any
    pub error: Option<VerifyError>,
    /// Chain index of the last fault
    pub error_depth: usize,
    /// The chain as built, target first
    pub chain: Vec<Arc<Certificate>>,
}

#[derive(Default)]
struct StoreState {
    objects: MemoryLookup,
    lookups: Vec<Box<dyn Lookup>>,
    param: VerifyParameter,
    strategies: Strategies,
}

/// A set of trusted certificates and CRLs, with the default parameters and
/// behavior overrides handed to every session verifying against it.
///
/// Clones share the same store. Sessions only read from it, so one store
/// can back many concurrent sessions.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<StoreState>>,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a trusted certificate.
    ///
    /// # Errors
    /// `Error::DuplicateCertificate` if the store already holds it.
    pub fn add_certificate(&self, certificate: impl Into<Arc<Certificate>>) -> Result<()> {
        let certificate = certificate.into();
        self.write()
            .objects
            .add(X509Object::Certificate(certificate))
    }

    /// Add a CRL.
    ///
    /// # Errors
    /// `Error::DuplicateCrl` if the store already holds it.
    pub fn add_crl(&self, crl: impl Into<Arc<CertificateRevocationList>>) -> Result<()> {
        self.write().objects.add(X509Object::Crl(crl.into()))
    }

    /// Add every object of `source`, skipping the ones already held.
    ///
    /// # Errors
    /// Whatever error `source` fails with, nothing is added in that case.
    pub fn load(&self, source: &(impl TrustSource + ?Sized)) -> Result<Loaded> {
        let objects = source.objects()?;
        let mut loaded = Loaded::default();
        let mut state = self.write();
        for object in objects {
            match state.objects.add(object) {
                Ok(()) => loaded.added += 1,
                Err(Error::DuplicateCertificate | Error::DuplicateCrl) => loaded.duplicates += 1,
                Err(error) => return Err(error),
            }
        }
        debug!(
            added = loaded.added,
            duplicates = loaded.duplicates,
            "loaded trust material"
        );
        Ok(loaded)
    }

    /// Search `lookup` after the store's own objects, and after any lookup
    /// added before it.
    pub fn add_lookup(&self, lookup: impl Lookup + 'static) {
        self.write().lookups.push(Box::new(lookup));
    }

    /// Number of certificates and CRLs the store itself holds
    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    /// The store itself holds no certificates or CRLs
    pub fn is_empty(&self) -> bool {
        self.read().objects.is_empty()
    }

    /// The first object of `kind` under `name`.
    ///
    /// # Errors
    /// `Error::ShouldRetry` when a lookup source can't answer now.
    pub fn by_subject(
        &self,
        kind: ObjectKind,
        name: &DistinguishedName,
    ) -> Result<Option<X509Object>> {
        match self.by_subject_from(kind, name, &mut 0) {
            LookupResult::Found(object) => Ok(Some(object)),
            LookupResult::NotFound => Ok(None),
            LookupResult::Retry => Err(Error::ShouldRetry),
        }
    }

    /// Search the store's objects, then each lookup source starting at
    /// `*method`.
    ///
    /// A source asking for a retry is remembered in `method` so the next
    /// search resumes there. Any other answer resets it.
    pub(crate) fn by_subject_from(
        &self,
        kind: ObjectKind,
        name: &DistinguishedName,
        method: &mut usize,
    ) -> LookupResult {
        let state = self.read();
        if let found @ LookupResult::Found(_) = state.objects.by_subject(kind, name) {
            *method = 0;
            return found;
        }
        for (index, lookup) in state.lookups.iter().enumerate().skip(*method) {
            match lookup.by_subject(kind, name) {
                LookupResult::NotFound => continue,
                LookupResult::Retry => {
                    *method = index;
                    return LookupResult::Retry;
                }
                found => {
                    *method = 0;
                    return found;
                }
            }
        }
        *method = 0;
        LookupResult::NotFound
    }

    /// Every object of `kind` the store itself holds under `name`
    pub(crate) fn all_by_subject(&self, kind: ObjectKind, name: &DistinguishedName) -> Vec<X509Object> {
        self.read().objects.all_by_subject(kind, name)
    }

    /// The default parameters of sessions verifying against this store
    pub fn param(&self) -> VerifyParameter {
        self.read().param.clone()
    }

    /// Merge `param` into the store defaults, its settings win.
    pub fn set_param(&self, param: &VerifyParameter) {
        self.write().param.set1(param);
    }

    /// Add `flags` to the default flags
    pub fn set_flags(&self, flags: VerifyFlags) {
        self.write().param.set_flags(flags);
    }

    /// Set the default purpose
    pub fn set_purpose(&self, purpose: Purpose) {
        self.write().param.set_purpose(purpose);
    }

    /// Set the default trust level
    pub fn set_trust(&self, trust: TrustId) {
        self.write().param.set_trust(trust);
    }

    /// Set the default maximum depth
    pub fn set_depth(&self, depth: usize) {
        self.write().param.set_depth(depth);
    }

    /// Check validity windows at `time` instead of now
    pub fn set_time(&self, time: Duration) {
        self.write().param.set_time(time);
    }

    pub(crate) fn strategies(&self) -> Strategies {
        self.read().strategies.clone()
    }

    fn set_strategy(&self, set: impl FnOnce(&mut Strategies)) {
        set(&mut self.write().strategies);
    }

    /// Override the verify callback
    pub fn set_verify_callback(&self, callback: impl VerifyCallback + 'static) {
        self.set_strategy(|s| s.verify_callback = Some(Arc::new(callback)));
    }

    /// Override the issuer lookup
    pub fn set_issuer_lookup(&self, lookup: impl IssuerLookup + 'static) {
        self.set_strategy(|s| s.issuer_lookup = Some(Arc::new(lookup)));
    }

    /// Override the issued-by predicate
    pub fn set_issued_check(&self, check: impl IssuedCheck + 'static) {
        self.set_strategy(|s| s.issued_check = Some(Arc::new(check)));
    }

    /// Override signature and validity window verification
    pub fn set_chain_verifier(&self, verifier: impl ChainVerifier + 'static) {
        self.set_strategy(|s| s.chain_verifier = Some(Arc::new(verifier)));
    }

    /// Override revocation checking
    pub fn set_revocation_check(&self, check: impl RevocationCheck + 'static) {
        self.set_strategy(|s| s.revocation_check = Some(Arc::new(check)));
    }

    /// Override CRL lookup
    pub fn set_crl_lookup(&self, lookup: impl CrlLookup + 'static) {
        self.set_strategy(|s| s.crl_lookup = Some(Arc::new(lookup)));
    }

    /// Override the CRL check
    pub fn set_crl_check(&self, check: impl CrlCheck + 'static) {
        self.set_strategy(|s| s.crl_check = Some(Arc::new(check)));
    }

    /// Override checking a certificate against a CRL
    pub fn set_certificate_crl_check(&self, check: impl CertificateCrlCheck + 'static) {
        self.set_strategy(|s| s.certificate_crl_check = Some(Arc::new(check)));
    }

    /// Override session cleanup
    pub fn set_cleanup(&self, cleanup: impl Cleanup + 'static) {
        self.set_strategy(|s| s.cleanup = Some(Arc::new(cleanup)));
    }

    /// Verify `certificate` against this store, with `chain` as untrusted
    /// intermediates.
    ///
    /// # Errors
    /// - `Error::UnknownProfile` if the `default` profile is not registered.
    /// - `Error::ShouldRetry` if a lookup source asked to be retried.
    pub fn verify<C>(
        &self,
        certificate: impl Into<Arc<Certificate>>,
        chain: impl IntoIterator<Item = C>,
    ) -> Result<VerifyOutcome>
    where
        C: Into<Arc<Certificate>>,
    {
        let mut ctx = StoreContext::init(Some(self.clone()), Some(certificate.into()), chain)?;
        Self::finish(&mut ctx)
    }

    /// [`Store::verify`] with `callback` in place of the store's verify
    /// callback.
    ///
    /// # Errors
    /// - `Error::UnknownProfile` if the `default` profile is not registered.
    /// - `Error::ShouldRetry` if a lookup source asked to be retried.
    pub fn verify_with<C, F>(
        &self,
        certificate: impl Into<Arc<Certificate>>,
        chain: impl IntoIterator<Item = C>,
        callback: F,
    ) -> Result<VerifyOutcome>
    where
        C: Into<Arc<Certificate>>,
        F: Fn(bool, &StoreContext) -> Verdict + Send + Sync + 'static,
    {
        let mut ctx = StoreContext::init(Some(self.clone()), Some(certificate.into()), chain)?;
        ctx.set_verify_callback(callback);
        Self::finish(&mut ctx)
    }

    fn finish(ctx: &mut StoreContext) -> Result<VerifyOutcome> {
        let ok = ctx.verify_certificate()?;
        Ok(ctx.outcome(ok))
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let state = self.read();
        f.debug_struct("Store")
            .field("objects", &state.objects.len())
            .field("lookups", &state.lookups.len())
            .field("param", &state.param)
            .field("strategies", &state.strategies)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ROOT_CA: &str = include_str!("../tests/data/root_ca.pem");
    const PROCESSOR_CA: &str = include_str!("../tests/data/processor_ca.pem");

    fn root() -> Arc<Certificate> {
        Arc::new(Certificate::from_pem(ROOT_CA).expect("Failed to decode certificate"))
    }

    fn processor() -> Arc<Certificate> {
        Arc::new(Certificate::from_pem(PROCESSOR_CA).expect("Failed to decode certificate"))
    }

    /// A source that answers from a fixed list, asking for a retry a set
    /// number of times first
    struct Flaky {
        retries: AtomicUsize,
        objects: MemoryLookup,
    }

    impl Flaky {
        fn new(retries: usize, objects: Vec<X509Object>) -> Self {
            let mut lookup = MemoryLookup::new();
            for object in objects {
                lookup.add(object).expect("distinct objects");
            }
            Self {
                retries: AtomicUsize::new(retries),
                objects: lookup,
            }
        }
    }

    impl Lookup for Flaky {
        fn add(&mut self, object: X509Object) -> Result<()> {
            self.objects.add(object)
        }

        fn by_subject(&self, kind: ObjectKind, name: &DistinguishedName) -> LookupResult {
            let pending = self.retries.load(Ordering::SeqCst);
            if pending > 0 {
                self.retries.store(pending - 1, Ordering::SeqCst);
                return LookupResult::Retry;
            }
            self.objects.by_subject(kind, name)
        }
    }

    #[test]
    fn add_certificate_once() {
        let store = Store::new();
        store.add_certificate(root()).expect("first insert");
        assert_matches!(store.add_certificate(root()), Err(Error::DuplicateCertificate));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clones_share_the_store() {
        let store = Store::new();
        let other = store.clone();
        other.add_certificate(root()).expect("first insert");
        assert!(!store.is_empty());
    }

    #[test]
    fn load_counts_duplicates() {
        let store = Store::new();
        store.add_certificate(root()).expect("first insert");
        let source: Vec<X509Object> = vec![root().into(), processor().into()];

        let loaded = store.load(&source).expect("source loads");
        assert_eq!(
            loaded,
            Loaded {
                added: 1,
                duplicates: 1
            }
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_failure_adds_nothing() {
        struct Broken;
        impl TrustSource for Broken {
            fn objects(&self) -> Result<Vec<X509Object>> {
                Err(Error::Der(der::Error::incomplete(der::Length::ZERO)))
            }
        }

        let store = Store::new();
        assert_matches!(store.load(&Broken), Err(Error::Der(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn own_objects_come_before_lookups() {
        let root = root();
        let store = Store::new();
        store.add_lookup(Flaky::new(5, vec![]));
        store.add_certificate(root.clone()).expect("first insert");

        let found = store
            .by_subject(ObjectKind::Certificate, root.subject())
            .expect("no retry");
        assert_eq!(found, Some(X509Object::Certificate(root)));
    }

    #[test]
    fn lookups_are_searched_in_order() {
        let root = root();
        let store = Store::new();
        store.add_lookup(Flaky::new(0, vec![]));
        store.add_lookup(Flaky::new(0, vec![root.clone().into()]));

        let found = store
            .by_subject(ObjectKind::Certificate, root.subject())
            .expect("no retry");
        assert_eq!(found, Some(X509Object::Certificate(root)));
        assert_eq!(
            store
                .by_subject(ObjectKind::Crl, processor().subject())
                .expect("no retry"),
            None
        );
    }

    #[test]
    fn retry_resumes_at_the_same_source() {
        let root = root();
        let store = Store::new();
        store.add_lookup(Flaky::new(0, vec![]));
        store.add_lookup(Flaky::new(1, vec![root.clone().into()]));

        let mut method = 0;
        assert_eq!(
            store.by_subject_from(ObjectKind::Certificate, root.subject(), &mut method),
            LookupResult::Retry
        );
        assert_eq!(method, 1);
        assert_eq!(
            store.by_subject_from(ObjectKind::Certificate, root.subject(), &mut method),
            LookupResult::Found(root.into())
        );
        assert_eq!(method, 0);
    }

    #[test]
    fn retry_is_an_error_for_plain_lookups() {
        let store = Store::new();
        store.add_lookup(Flaky::new(1, vec![]));
        assert_matches!(
            store.by_subject(ObjectKind::Certificate, root().subject()),
            Err(Error::ShouldRetry)
        );
    }

    #[test]
    fn parameters_accumulate() {
        let store = Store::new();
        store.set_flags(VerifyFlags::CRL_CHECK);
        store.set_flags(VerifyFlags::X509_STRICT);
        store.set_purpose(Purpose::SslServer);
        store.set_trust(TrustId::SslServer);
        store.set_depth(4);
        store.set_time(Duration::from_secs(10));

        let param = store.param();
        assert_eq!(
            param.flags(),
            VerifyFlags::CRL_CHECK | VerifyFlags::X509_STRICT | VerifyFlags::USE_CHECK_TIME
        );
        assert_eq!(param.purpose(), Some(Purpose::SslServer));
        assert_eq!(param.trust(), Some(TrustId::SslServer));
        assert_eq!(param.depth(), Some(4));
        assert_eq!(param.check_time(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn set_param_overrides_defaults() {
        let store = Store::new();
        store.set_depth(4);
        let mut param = VerifyParameter::default();
        param.set_depth(2);
        param.set_purpose(Purpose::SslClient);

        store.set_param(&param);
        assert_eq!(store.param().depth(), Some(2));
        assert_eq!(store.param().purpose(), Some(Purpose::SslClient));
    }

    #[test]
    fn strategies_are_recorded() {
        let store = Store::new();
        assert!(store.strategies().verify_callback.is_none());
        store.set_verify_callback(|_ok: bool, _ctx: &StoreContext| Verdict::Continue);
        assert!(store.strategies().verify_callback.is_some());
        assert!(store.strategies().crl_lookup.is_none());
    }

    #[test]
    fn debug_summarizes_contents() {
        let store = Store::new();
        store.add_certificate(root()).expect("first insert");
        let debug = format!("{store:?}");
        assert!(debug.contains("objects: 1"));
        assert!(debug.contains("lookups: 0"));
    }
}
