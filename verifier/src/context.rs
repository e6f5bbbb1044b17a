// Copyright (c) 2023 The MobileCoin Foundation

//! A single verification session.
//!
//! A [`StoreContext`] is created per verification. It takes its parameters
//! and behaviors from a [`Store`], builds a chain from the target certificate
//! toward a trust anchor and then runs the checks in a fixed order:
//! extensions, trust, revocation, signatures and the policy stage.
//!
//! Faults never abort on their own. Each one is recorded on the session and
//! handed to the verify callback, whose [`Verdict`] decides whether the
//! session goes on.

mod build;
mod extensions;
mod revocation;
mod signature;

pub use build::{check_issued_by, DefaultIssuedCheck, StackIssuerLookup, StoreIssuerLookup};
pub use revocation::{
    CrlRevocationCheck, DefaultCertificateCrlCheck, DefaultCrlCheck, DefaultCrlLookup,
};
pub use signature::InternalVerifier;

use crate::lookup::LookupResult;
use crate::param::{InheritFlags, VerifyFlags, VerifyParameter};
use crate::purpose::Purpose;
use crate::store::{Store, VerifyOutcome};
use crate::strategy::{
    CertificateCrlCheck, ChainVerifier, Cleanup, CrlCheck, CrlLookup, IssuedCheck, IssuerLookup,
    NoCleanup, NullCallback, RevocationCheck, Strategies, Verdict, VerifyCallback,
};
use crate::trust::TrustId;
use crate::x509::{
    Certificate, CertificateRevocationList, DistinguishedName, ObjectKind, X509Object,
};
use crate::{Error, Result, VerifyError};
use core::any::Any;
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

/// Number of extra data slots a session carries
pub const EX_DATA_SLOTS: usize = 6;

/// The extra data slot holding application data
pub const APP_DATA_SLOT: usize = 0;

type ExData = Option<Box<dyn Any + Send + Sync>>;

/// The behaviors a session runs with, store overrides or the defaults
#[derive(Clone)]
struct Resolved {
    verify_callback: Arc<dyn VerifyCallback>,
    issuer_lookup: Arc<dyn IssuerLookup>,
    issued_check: Arc<dyn IssuedCheck>,
    chain_verifier: Arc<dyn ChainVerifier>,
    revocation_check: Arc<dyn RevocationCheck>,
    crl_lookup: Arc<dyn CrlLookup>,
    crl_check: Arc<dyn CrlCheck>,
    certificate_crl_check: Arc<dyn CertificateCrlCheck>,
    cleanup: Arc<dyn Cleanup>,
}

impl Resolved {
    fn from_overrides(overrides: Strategies) -> Self {
        Self {
            verify_callback: overrides
                .verify_callback
                .unwrap_or_else(|| Arc::new(NullCallback)),
            issuer_lookup: overrides
                .issuer_lookup
                .unwrap_or_else(|| Arc::new(StoreIssuerLookup)),
            issued_check: overrides
                .issued_check
                .unwrap_or_else(|| Arc::new(DefaultIssuedCheck)),
            chain_verifier: overrides
                .chain_verifier
                .unwrap_or_else(|| Arc::new(InternalVerifier)),
            revocation_check: overrides
                .revocation_check
                .unwrap_or_else(|| Arc::new(CrlRevocationCheck)),
            crl_lookup: overrides
                .crl_lookup
                .unwrap_or_else(|| Arc::new(DefaultCrlLookup)),
            crl_check: overrides
                .crl_check
                .unwrap_or_else(|| Arc::new(DefaultCrlCheck)),
            certificate_crl_check: overrides
                .certificate_crl_check
                .unwrap_or_else(|| Arc::new(DefaultCertificateCrlCheck)),
            cleanup: overrides.cleanup.unwrap_or_else(|| Arc::new(NoCleanup)),
        }
    }
}

/// One verification session
pub struct StoreContext {
    store: Option<Store>,
    current_method: usize,
    certificate: Option<Arc<Certificate>>,
    untrusted: Vec<Arc<Certificate>>,
    crls: Vec<Arc<CertificateRevocationList>>,
    param: VerifyParameter,
    other_context: Option<Vec<Arc<Certificate>>>,
    strategies: Resolved,
    valid: bool,
    last_untrusted: usize,
    chain: Vec<Arc<Certificate>>,
    explicit_policy: bool,
    error: Option<VerifyError>,
    error_depth: usize,
    current_certificate: Option<Arc<Certificate>>,
    current_issuer: Option<Arc<Certificate>>,
    current_crl: Option<Arc<CertificateRevocationList>>,
    ex_data: Vec<ExData>,
}

impl StoreContext {
    /// Start a session verifying `certificate` with the untrusted `chain`.
    ///
    /// Parameters are inherited from `store` and then from the `default`
    /// profile. Without a store the session runs on the built-in defaults.
    ///
    /// # Errors
    /// `Error::UnknownProfile` if the `default` profile is not registered.
    pub fn init<C>(
        store: Option<Store>,
        certificate: Option<Arc<Certificate>>,
        chain: impl IntoIterator<Item = C>,
    ) -> Result<Self>
    where
        C: Into<Arc<Certificate>>,
    {
        let mut param = VerifyParameter::default();
        let overrides = match &store {
            Some(store) => {
                param.inherit(&store.param());
                store.strategies()
            }
            None => {
                param.set_inherit_flags(InheritFlags::DEFAULT | InheritFlags::ONCE);
                Strategies::default()
            }
        };
        let default = VerifyParameter::lookup("default")
            .ok_or_else(|| Error::UnknownProfile("default".to_owned()))?;
        param.inherit(&default);

        let untrusted = chain.into_iter().map(Into::into).collect::<Vec<_>>();
        debug!(
            subject = ?certificate.as_ref().map(|c| c.subject().to_string()),
            untrusted = untrusted.len(),
            with_store = store.is_some(),
            "starting verification session"
        );

        Ok(Self {
            store,
            current_method: 0,
            certificate,
            untrusted,
            crls: Vec::new(),
            param,
            other_context: None,
            strategies: Resolved::from_overrides(overrides),
            valid: false,
            last_untrusted: 0,
            chain: Vec::new(),
            explicit_policy: false,
            error: None,
            error_depth: 0,
            current_certificate: None,
            current_issuer: None,
            current_crl: None,
            ex_data: (0..EX_DATA_SLOTS).map(|_| None).collect(),
        })
    }

    /// Verify the target certificate.
    ///
    /// Returns `Ok(true)` when the chain verified, possibly with faults the
    /// callback chose to continue past, and `Ok(false)` when the callback
    /// aborted. [`StoreContext::error`] and [`StoreContext::error_depth`]
    /// describe the last fault either way.
    ///
    /// # Errors
    /// - `Error::NoCertificateSet` if there is no target certificate.
    /// - `Error::ShouldRetry` if a lookup source asked to be retried while
    ///   looking for an issuer.
    pub fn verify_certificate(&mut self) -> Result<bool> {
        let certificate = self.certificate.clone().ok_or(Error::NoCertificateSet)?;
        if self.chain.is_empty() {
            self.chain.push(certificate);
            self.last_untrusted = 1;
        }

        let built = self.build_chain()?;
        let ok = self.check_built_chain(built);
        self.valid = ok;
        debug!(ok, error = ?self.error, depth = self.error_depth, "verification finished");
        Ok(ok)
    }

    fn check_built_chain(&mut self, built: build::Built) -> bool {
        let bad_chain = match built {
            build::Built::Aborted => return false,
            build::Built::Complete => false,
            build::Built::Faulted => true,
        };

        if self.check_chain_extensions().is_abort() {
            return false;
        }
        if self.param.trust().is_some() && self.check_trust().is_abort() {
            return false;
        }

        let revocation = self.strategies.revocation_check.clone();
        if revocation.check_revocation(self).is_abort() {
            return false;
        }

        let verifier = self.strategies.chain_verifier.clone();
        if verifier.verify(self).is_abort() {
            return false;
        }

        if !bad_chain && self.param.flags().contains(VerifyFlags::POLICY_CHECK) {
            return self.check_policy().is_continue();
        }
        true
    }

    /// Certificate policies are not evaluated, the stage always passes and no
    /// policy tree is built.
    fn check_policy(&mut self) -> Verdict {
        trace!("policy stage passes without a policy tree");
        Verdict::Continue
    }

    /// Record `error` at `depth` against `certificate` and ask the verify
    /// callback how to go on.
    pub fn report(
        &mut self,
        error: VerifyError,
        depth: usize,
        certificate: &Arc<Certificate>,
    ) -> Verdict {
        self.error = Some(error);
        self.error_depth = depth;
        self.current_certificate = Some(certificate.clone());
        self.notify(false)
    }

    /// Invoke the verify callback with the session as it is.
    pub fn notify(&self, ok: bool) -> Verdict {
        let callback = self.strategies.verify_callback.clone();
        let verdict = callback.call(ok, self);
        if ok {
            trace!(depth = self.error_depth, ?verdict, "link observed");
        } else {
            debug!(
                error = ?self.error,
                code = self.error.map(|e| e.code()),
                depth = self.error_depth,
                ?verdict,
                "verification fault"
            );
        }
        verdict
    }

    fn check_issued(&mut self, certificate: &Arc<Certificate>, issuer: &Arc<Certificate>) -> bool {
        let check = self.strategies.issued_check.clone();
        check.check_issued(self, certificate, issuer)
    }

    fn get_issuer(&mut self, certificate: &Arc<Certificate>) -> Result<Option<Arc<Certificate>>> {
        let lookup = self.strategies.issuer_lookup.clone();
        lookup.find_issuer(self, certificate)
    }

    /// The first of `candidates` that issued `certificate`
    pub fn find_issuer(
        &mut self,
        candidates: &[Arc<Certificate>],
        certificate: &Arc<Certificate>,
    ) -> Option<Arc<Certificate>> {
        candidates
            .iter()
            .find(|candidate| self.check_issued(certificate, candidate))
            .cloned()
    }

    /// Look `name` up in the store's own objects and then its lookup
    /// sources.
    ///
    /// A source that asks to be retried is asked first on the next call.
    ///
    /// # Errors
    /// `Error::ShouldRetry` when a source can't answer now.
    pub fn by_subject(
        &mut self,
        kind: ObjectKind,
        name: &DistinguishedName,
    ) -> Result<Option<X509Object>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.by_subject_from(kind, name, &mut self.current_method) {
            LookupResult::Found(object) => {
                trace!(subject = %name, ?kind, "lookup hit");
                Ok(Some(object))
            }
            LookupResult::NotFound => {
                trace!(subject = %name, ?kind, "lookup miss");
                Ok(None)
            }
            LookupResult::Retry => {
                warn!(subject = %name, source = self.current_method, "lookup source asked to retry");
                Err(Error::ShouldRetry)
            }
        }
    }

    /// The time certificates and CRLs are checked against
    pub fn check_time(&self) -> Duration {
        match self.param.check_time() {
            Some(time) if self.param.flags().contains(VerifyFlags::USE_CHECK_TIME) => time,
            _ => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
        }
    }

    /// Merge a purpose and trust level into the session parameters.
    ///
    /// `purpose` falls back to `default_purpose`. When `trust` is not given
    /// the purpose's own trust level is used, [`Purpose::Any`] takes the
    /// trust level of `default_purpose`. Values already set on the session
    /// are kept.
    ///
    /// # Errors
    /// `Error::UnknownPurpose` when [`Purpose::Any`] has to borrow the trust
    /// level of a missing `default_purpose`.
    pub fn purpose_inherit(
        &mut self,
        default_purpose: Option<Purpose>,
        purpose: Option<Purpose>,
        trust: Option<TrustId>,
    ) -> Result<()> {
        let purpose = purpose.or(default_purpose);
        let mut trust = trust;
        if let Some(purpose) = purpose {
            let entry = match purpose.default_trust() {
                Some(_) => purpose,
                None => default_purpose.ok_or(Error::UnknownPurpose(0))?,
            };
            if trust.is_none() {
                trust = entry.default_trust();
            }
        }

        if let (Some(purpose), None) = (purpose, self.param.purpose()) {
            self.param.set_purpose(purpose);
        }
        if let (Some(trust), None) = (trust, self.param.trust()) {
            self.param.set_trust(trust);
        }
        Ok(())
    }

    /// Require the chain to be valid for `purpose`, along with the purpose's
    /// trust level unless one is set.
    pub fn set_purpose(&mut self, purpose: Purpose) -> Result<()> {
        self.purpose_inherit(None, Some(purpose), None)
    }

    /// Require the chain's anchor to be trusted for `trust`
    pub fn set_trust(&mut self, trust: TrustId) -> Result<()> {
        self.purpose_inherit(None, None, Some(trust))
    }

    /// Merge the named profile into the session parameters.
    ///
    /// # Errors
    /// `Error::UnknownProfile` when no profile has that name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        let profile =
            VerifyParameter::lookup(name).ok_or_else(|| Error::UnknownProfile(name.to_owned()))?;
        self.param.inherit(&profile);
        Ok(())
    }

    /// Replace the session parameters
    pub fn set_param(&mut self, param: VerifyParameter) {
        self.param = param;
    }

    /// The session parameters
    pub fn param(&self) -> &VerifyParameter {
        &self.param
    }

    /// The session parameters, for adjusting
    pub fn param_mut(&mut self) -> &mut VerifyParameter {
        &mut self.param
    }

    /// Add verification flags
    pub fn set_flags(&mut self, flags: VerifyFlags) {
        self.param.set_flags(flags);
    }

    /// Verify as of `time` since the unix epoch
    pub fn set_time(&mut self, time: Duration) {
        self.param.set_time(time);
    }

    /// Limit the number of untrusted certificates in the chain
    pub fn set_depth(&mut self, depth: usize) {
        self.param.set_depth(depth);
    }

    /// Use `callback` for this session instead of the store's
    pub fn set_verify_callback(&mut self, callback: impl VerifyCallback + 'static) {
        self.strategies.verify_callback = Arc::new(callback);
    }

    /// Look issuers up in `certificates` instead of the store
    pub fn trusted_stack(&mut self, certificates: Vec<Arc<Certificate>>) {
        self.other_context = Some(certificates);
        self.strategies.issuer_lookup = Arc::new(StackIssuerLookup);
    }

    /// The store this session was created from
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// The certificate being verified
    pub fn certificate(&self) -> Option<&Arc<Certificate>> {
        self.certificate.as_ref()
    }

    /// Replace the certificate being verified
    pub fn set_certificate(&mut self, certificate: Arc<Certificate>) {
        self.certificate = Some(certificate);
    }

    /// The untrusted certificates supplied with the target
    pub fn untrusted(&self) -> &[Arc<Certificate>] {
        &self.untrusted
    }

    /// Replace the untrusted certificates
    pub fn set_chain<C>(&mut self, chain: impl IntoIterator<Item = C>)
    where
        C: Into<Arc<Certificate>>,
    {
        self.untrusted = chain.into_iter().map(Into::into).collect();
    }

    /// CRLs supplied for this session
    pub fn crls(&self) -> &[Arc<CertificateRevocationList>] {
        &self.crls
    }

    /// Supply CRLs for this session, they are consulted before the store's
    pub fn set_crls<C>(&mut self, crls: impl IntoIterator<Item = C>)
    where
        C: Into<Arc<CertificateRevocationList>>,
    {
        self.crls = crls.into_iter().map(Into::into).collect();
    }

    /// The chain built so far, target first
    pub fn chain(&self) -> &[Arc<Certificate>] {
        &self.chain
    }

    /// Number of chain entries, from the target, that are not store trusted
    pub fn last_untrusted(&self) -> usize {
        self.last_untrusted
    }

    /// The last recorded fault, `None` when there was none
    pub fn error(&self) -> Option<VerifyError> {
        self.error
    }

    /// Overwrite the recorded fault
    pub fn set_error(&mut self, error: Option<VerifyError>) {
        self.error = error;
    }

    /// Chain index of the last fault or observation
    pub fn error_depth(&self) -> usize {
        self.error_depth
    }

    /// The certificate the last fault or observation is about
    pub fn current_certificate(&self) -> Option<&Arc<Certificate>> {
        self.current_certificate.as_ref()
    }

    /// The issuer the last fault or observation is about
    pub fn current_issuer(&self) -> Option<&Arc<Certificate>> {
        self.current_issuer.as_ref()
    }

    /// The CRL currently being checked
    pub fn current_crl(&self) -> Option<&Arc<CertificateRevocationList>> {
        self.current_crl.as_ref()
    }

    /// Whether the last [`StoreContext::verify_certificate`] succeeded
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether an explicit policy is required by the chain.
    ///
    /// Policies are not evaluated so this is always `false`.
    pub fn explicit_policy(&self) -> bool {
        self.explicit_policy
    }

    /// Store `data` in the extra data slot `index`.
    ///
    /// Returns `false` when there is no such slot.
    pub fn set_ex_data<T: Any + Send + Sync>(&mut self, index: usize, data: T) -> bool {
        match self.ex_data.get_mut(index) {
            Some(slot) => {
                *slot = Some(Box::new(data));
                true
            }
            None => false,
        }
    }

    /// The extra data in slot `index` if it holds a `T`
    pub fn ex_data<T: Any>(&self, index: usize) -> Option<&T> {
        self.ex_data
            .get(index)
            .and_then(Option::as_ref)
            .and_then(|data| data.downcast_ref::<T>())
    }

    /// Store application data
    pub fn set_app_data<T: Any + Send + Sync>(&mut self, data: T) {
        self.set_ex_data(APP_DATA_SLOT, data);
    }

    /// The application data if it is a `T`
    pub fn app_data<T: Any>(&self) -> Option<&T> {
        self.ex_data(APP_DATA_SLOT)
    }

    pub(crate) fn outcome(&self, ok: bool) -> VerifyOutcome {
        VerifyOutcome {
            ok,
            error: self.error,
            error_depth: self.error_depth,
            chain: self.chain.clone(),
        }
    }

    /// End the session, running the cleanup behavior first
    pub fn cleanup(mut self) {
        let cleanup = self.strategies.cleanup.clone();
        cleanup.cleanup(&mut self);
        self.chain.clear();
        self.ex_data.clear();
    }
}

impl Debug for StoreContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreContext")
            .field("certificate", &self.certificate)
            .field("untrusted", &self.untrusted.len())
            .field("crls", &self.crls.len())
            .field("param", &self.param)
            .field("chain", &self.chain.len())
            .field("last_untrusted", &self.last_untrusted)
            .field("error", &self.error)
            .field("error_depth", &self.error_depth)
            .field("valid", &self.valid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use yare::parameterized;

    const ROOT_CA: &str = include_str!("../tests/data/root_ca.pem");

    fn storeless() -> StoreContext {
        StoreContext::init(None, None, Vec::<Arc<Certificate>>::new()).expect("storeless session")
    }

    #[test]
    fn storeless_session_uses_default_profile() {
        let ctx = storeless();
        assert_eq!(ctx.param().depth(), Some(100));
        assert_eq!(ctx.param().inherit_flags(), InheritFlags::empty());
        assert!(ctx.store().is_none());
        assert_eq!(ctx.error(), None);
    }

    #[test]
    fn store_parameters_win_over_default_profile() {
        let store = Store::new();
        store.set_depth(3);
        store.set_flags(VerifyFlags::X509_STRICT);
        let ctx = StoreContext::init(Some(store), None, Vec::<Arc<Certificate>>::new())
            .expect("session");
        assert_eq!(ctx.param().depth(), Some(3));
        assert!(ctx.param().flags().contains(VerifyFlags::X509_STRICT));
    }

    #[test]
    fn no_certificate_is_fatal() {
        let mut ctx = storeless();
        assert_matches!(ctx.verify_certificate(), Err(Error::NoCertificateSet));
        assert!(ctx.chain().is_empty());
    }

    #[parameterized(
        ssl_server = { Purpose::SslServer, TrustId::SslServer },
        smime_sign = { Purpose::SmimeSign, TrustId::Email },
        crl_sign = { Purpose::CrlSign, TrustId::Compat },
    )]
    fn set_purpose_brings_trust(purpose: Purpose, trust: TrustId) {
        let mut ctx = storeless();
        ctx.set_purpose(purpose).expect("known purpose");
        assert_eq!(ctx.param().purpose(), Some(purpose));
        assert_eq!(ctx.param().trust(), Some(trust));
    }

    #[test]
    fn explicit_trust_wins_over_purpose_trust() {
        let mut ctx = storeless();
        ctx.set_trust(TrustId::ObjectSign).expect("known trust");
        ctx.set_purpose(Purpose::SslClient).expect("known purpose");
        assert_eq!(ctx.param().purpose(), Some(Purpose::SslClient));
        assert_eq!(ctx.param().trust(), Some(TrustId::ObjectSign));
    }

    #[test]
    fn any_purpose_needs_a_default() {
        let mut ctx = storeless();
        assert_matches!(
            ctx.set_purpose(Purpose::Any),
            Err(Error::UnknownPurpose(0))
        );
        assert_eq!(ctx.param().purpose(), None);

        ctx.purpose_inherit(Some(Purpose::SmimeSign), Some(Purpose::Any), None)
            .expect("default purpose given");
        assert_eq!(ctx.param().purpose(), Some(Purpose::Any));
        assert_eq!(ctx.param().trust(), Some(TrustId::Email));
    }

    #[test]
    fn purpose_already_set_is_kept() {
        let mut ctx = storeless();
        ctx.set_purpose(Purpose::SslServer).expect("known purpose");
        ctx.set_purpose(Purpose::SmimeSign).expect("known purpose");
        assert_eq!(ctx.param().purpose(), Some(Purpose::SslServer));
    }

    #[test]
    fn set_default_profile() {
        let mut ctx = storeless();
        ctx.set_default("ssl_client").expect("builtin profile");
        assert_eq!(ctx.param().purpose(), Some(Purpose::SslClient));

        assert_matches!(
            ctx.set_default("missing_profile"),
            Err(Error::UnknownProfile(name)) if name == "missing_profile"
        );
    }

    #[test]
    fn fixed_check_time() {
        let mut ctx = storeless();
        ctx.set_time(Duration::from_secs(1_000));
        assert_eq!(ctx.check_time(), Duration::from_secs(1_000));

        ctx.param_mut().clear_flags(VerifyFlags::USE_CHECK_TIME);
        assert!(ctx.check_time() > Duration::from_secs(1_000));
    }

    #[test]
    fn ex_data_slots() {
        let mut ctx = storeless();
        ctx.set_app_data(String::from("application"));
        assert!(ctx.set_ex_data(5, 42_u32));
        assert!(!ctx.set_ex_data(EX_DATA_SLOTS, 1_u8));

        assert_eq!(ctx.app_data::<String>().map(String::as_str), Some("application"));
        assert_eq!(ctx.ex_data::<u32>(5), Some(&42));
        assert_eq!(ctx.ex_data::<u64>(5), None);
        assert_eq!(ctx.ex_data::<u32>(3), None);
    }

    #[test]
    fn report_records_fault_and_asks_callback() {
        let root = Arc::new(Certificate::from_pem(ROOT_CA).expect("Failed to decode certificate"));
        let mut ctx = storeless();

        assert_eq!(
            ctx.report(VerifyError::CertRevoked, 2, &root),
            Verdict::Abort
        );
        assert_eq!(ctx.error(), Some(VerifyError::CertRevoked));
        assert_eq!(ctx.error_depth(), 2);
        assert_eq!(ctx.current_certificate(), Some(&root));

        ctx.set_verify_callback(|_ok: bool, ctx: &StoreContext| {
            Verdict::from(ctx.error() == Some(VerifyError::CertRevoked))
        });
        assert_eq!(
            ctx.report(VerifyError::CertRevoked, 0, &root),
            Verdict::Continue
        );
    }

    struct CountingCleanup(Arc<AtomicUsize>);

    impl Cleanup for CountingCleanup {
        fn cleanup(&self, ctx: &mut StoreContext) {
            assert!(ctx.app_data::<u8>().is_some());
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cleanup_runs_store_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = Store::new();
        store.set_cleanup(CountingCleanup(calls.clone()));

        let mut ctx = StoreContext::init(Some(store), None, Vec::<Arc<Certificate>>::new())
            .expect("session");
        ctx.set_app_data(7_u8);
        ctx.cleanup();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
