// Copyright (c) 2023 The MobileCoin Foundation

//! The behaviors a [`Store`](crate::Store) can override for the sessions it
//! creates.
//!
//! Each behavior is its own trait with a built-in default. A session takes
//! the store's override when there is one and the default otherwise, every
//! behavior is resolved independently.

use crate::x509::{Certificate, CertificateRevocationList};
use crate::{Result, StoreContext};
use core::fmt::{Debug, Formatter};
use std::sync::Arc;

/// What the verify callback wants to happen after a fault or observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Keep going, the fault stays recorded on the session
    Continue,
    /// Stop verification, the session fails
    Abort,
}

impl Verdict {
    /// Whether verification should go on
    pub fn is_continue(self) -> bool {
        self == Verdict::Continue
    }

    /// Whether verification should stop
    pub fn is_abort(self) -> bool {
        self == Verdict::Abort
    }
}

impl From<bool> for Verdict {
    fn from(ok: bool) -> Self {
        if ok {
            Verdict::Continue
        } else {
            Verdict::Abort
        }
    }
}

/// Decides whether verification continues after a fault.
///
/// `ok` is `false` when a fault was just recorded on the session and `true`
/// for the per link observation made after a signature checks out.
pub trait VerifyCallback: Send + Sync {
    /// Decide how verification continues
    fn call(&self, ok: bool, ctx: &StoreContext) -> Verdict;
}

impl<F> VerifyCallback for F
where
    F: Fn(bool, &StoreContext) -> Verdict + Send + Sync,
{
    fn call(&self, ok: bool, ctx: &StoreContext) -> Verdict {
        self(ok, ctx)
    }
}

/// The default callback, it keeps going exactly when `ok` is `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCallback;

impl VerifyCallback for NullCallback {
    fn call(&self, ok: bool, _ctx: &StoreContext) -> Verdict {
        Verdict::from(ok)
    }
}

/// Finds the issuer of a certificate outside of the supplied chain
pub trait IssuerLookup: Send + Sync {
    /// The issuer of `certificate`, `None` when there is none.
    ///
    /// # Errors
    /// `Error::ShouldRetry` when a source can't answer now.
    fn find_issuer(
        &self,
        ctx: &mut StoreContext,
        certificate: &Arc<Certificate>,
    ) -> Result<Option<Arc<Certificate>>>;
}

/// Decides whether one certificate issued another
pub trait IssuedCheck: Send + Sync {
    /// `true` when `issuer` issued `certificate`
    fn check_issued(
        &self,
        ctx: &mut StoreContext,
        certificate: &Arc<Certificate>,
        issuer: &Arc<Certificate>,
    ) -> bool;
}

/// Checks the signatures and validity windows along a built chain
pub trait ChainVerifier: Send + Sync {
    /// Verify the session's chain
    fn verify(&self, ctx: &mut StoreContext) -> Verdict;
}

/// Checks the certificates of a built chain for revocation
pub trait RevocationCheck: Send + Sync {
    /// Check the session's chain
    fn check_revocation(&self, ctx: &mut StoreContext) -> Verdict;
}

/// Finds the CRL covering a certificate
pub trait CrlLookup: Send + Sync {
    /// A CRL from the issuer of `certificate`
    fn find_crl(
        &self,
        ctx: &mut StoreContext,
        certificate: &Certificate,
    ) -> Option<Arc<CertificateRevocationList>>;
}

/// Checks a CRL itself, its issuer, signature and validity window
pub trait CrlCheck: Send + Sync {
    /// Check `crl` for the certificate at the session's error depth
    fn check_crl(&self, ctx: &mut StoreContext, crl: &Arc<CertificateRevocationList>) -> Verdict;
}

/// Checks a certificate against a CRL
pub trait CertificateCrlCheck: Send + Sync {
    /// Check `certificate` against `crl`
    fn check_certificate(
        &self,
        ctx: &mut StoreContext,
        crl: &Arc<CertificateRevocationList>,
        certificate: &Arc<Certificate>,
    ) -> Verdict;
}

/// Runs when a session is cleaned up
pub trait Cleanup: Send + Sync {
    /// Release whatever the session's owner attached to it
    fn cleanup(&self, ctx: &mut StoreContext);
}

/// Cleanup that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCleanup;

impl Cleanup for NoCleanup {
    fn cleanup(&self, _ctx: &mut StoreContext) {}
}

/// The overrides a store hands to its sessions, `None` means the built-in
/// default.
#[derive(Clone, Default)]
pub struct Strategies {
    /// Verify callback
    pub verify_callback: Option<Arc<dyn VerifyCallback>>,
    /// Issuer lookup
    pub issuer_lookup: Option<Arc<dyn IssuerLookup>>,
    /// Issued-by predicate
    pub issued_check: Option<Arc<dyn IssuedCheck>>,
    /// Chain verification
    pub chain_verifier: Option<Arc<dyn ChainVerifier>>,
    /// Revocation checking
    pub revocation_check: Option<Arc<dyn RevocationCheck>>,
    /// CRL lookup
    pub crl_lookup: Option<Arc<dyn CrlLookup>>,
    /// CRL checking
    pub crl_check: Option<Arc<dyn CrlCheck>>,
    /// Certificate against CRL checking
    pub certificate_crl_check: Option<Arc<dyn CertificateCrlCheck>>,
    /// Session cleanup
    pub cleanup: Option<Arc<dyn Cleanup>>,
}

impl Debug for Strategies {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Strategies")
            .field("verify_callback", &self.verify_callback.is_some())
            .field("issuer_lookup", &self.issuer_lookup.is_some())
            .field("issued_check", &self.issued_check.is_some())
            .field("chain_verifier", &self.chain_verifier.is_some())
            .field("revocation_check", &self.revocation_check.is_some())
            .field("crl_lookup", &self.crl_lookup.is_some())
            .field("crl_check", &self.crl_check.is_some())
            .field("certificate_crl_check", &self.certificate_crl_check.is_some())
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}
