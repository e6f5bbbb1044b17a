// Copyright (c) 2023 The MobileCoin Foundation

//! Chain construction and the issued-by predicate.

use super::StoreContext;
use crate::param::VerifyFlags;
use crate::strategy::{IssuedCheck, IssuerLookup};
use crate::x509::{Certificate, KeyUsage, ObjectKind};
use crate::{Result, VerifyError};
use std::sync::Arc;
use tracing::{debug, trace};

/// Depth used when the session parameters have none
const DEFAULT_DEPTH: usize = 100;

/// How chain construction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Built {
    /// The chain ends in a trust anchor
    Complete,
    /// A fault was recorded and the callback chose to continue
    Faulted,
    /// The callback aborted
    Aborted,
}

/// Check that `issuer` could have issued `certificate` from the names, key
/// identifiers and key usage alone. Signatures are not checked.
///
/// # Errors
/// The reason `issuer` can't be the issuer of `certificate`.
pub fn check_issued_by(
    issuer: &Certificate,
    certificate: &Certificate,
) -> core::result::Result<(), VerifyError> {
    if issuer.subject() != certificate.issuer() {
        return Err(VerifyError::SubjectIssuerMismatch);
    }

    if let Some(akid) = &certificate.extensions().authority_key_id {
        if let (Some(key_id), Some(subject_key_id)) =
            (&akid.key_id, &issuer.extensions().subject_key_id)
        {
            if key_id != subject_key_id {
                return Err(VerifyError::AkidSkidMismatch);
            }
        }
        if let Some(serial_number) = &akid.serial_number {
            if serial_number.as_slice() != issuer.serial_number() {
                return Err(VerifyError::AkidIssuerSerialMismatch);
            }
        }
    }

    let key_usage = issuer.extensions().key_usage;
    if certificate.extensions().proxy_cert_info.is_some() {
        if key_usage.map_or(false, |ku| !ku.contains(KeyUsage::DIGITAL_SIGNATURE)) {
            return Err(VerifyError::KeyUsageNoDigitalSignature);
        }
    } else if key_usage.map_or(false, |ku| !ku.contains(KeyUsage::KEY_CERT_SIGN)) {
        return Err(VerifyError::KeyUsageNoCertSign);
    }
    Ok(())
}

/// The default issued-by predicate.
///
/// With [`VerifyFlags::CB_ISSUER_CHECK`] a mismatch is reported through the
/// verify callback, whose verdict then decides the answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIssuedCheck;

impl IssuedCheck for DefaultIssuedCheck {
    fn check_issued(
        &self,
        ctx: &mut StoreContext,
        certificate: &Arc<Certificate>,
        issuer: &Arc<Certificate>,
    ) -> bool {
        let Err(reason) = check_issued_by(issuer, certificate) else {
            return true;
        };
        if !ctx.param.flags().contains(VerifyFlags::CB_ISSUER_CHECK) {
            return false;
        }
        ctx.error = Some(reason);
        ctx.current_certificate = Some(certificate.clone());
        ctx.current_issuer = Some(issuer.clone());
        ctx.notify(false).is_continue()
    }
}

/// The default issuer lookup, searching the session's store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreIssuerLookup;

impl IssuerLookup for StoreIssuerLookup {
    fn find_issuer(
        &self,
        ctx: &mut StoreContext,
        certificate: &Arc<Certificate>,
    ) -> Result<Option<Arc<Certificate>>> {
        ctx.first_issuer(certificate)
    }
}

/// Issuer lookup over the certificates given to
/// [`StoreContext::trusted_stack`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StackIssuerLookup;

impl IssuerLookup for StackIssuerLookup {
    fn find_issuer(
        &self,
        ctx: &mut StoreContext,
        certificate: &Arc<Certificate>,
    ) -> Result<Option<Arc<Certificate>>> {
        let candidates = ctx.other_context.clone().unwrap_or_default();
        Ok(ctx.find_issuer(&candidates, certificate))
    }
}

impl StoreContext {
    /// The first store certificate that issued `certificate`.
    ///
    /// The first certificate found under the issuer name is tried, then every
    /// certificate the store itself holds under that name.
    ///
    /// # Errors
    /// `Error::ShouldRetry` when a lookup source can't answer now.
    pub fn first_issuer(
        &mut self,
        certificate: &Arc<Certificate>,
    ) -> Result<Option<Arc<Certificate>>> {
        let Some(store) = self.store.clone() else {
            return Ok(None);
        };
        let name = certificate.issuer();
        let found = self
            .by_subject(ObjectKind::Certificate, name)?
            .and_then(|object| object.certificate().cloned());
        let Some(first) = found else {
            return Ok(None);
        };
        if self.check_issued(certificate, &first) {
            return Ok(Some(first));
        }

        let candidates = store
            .all_by_subject(ObjectKind::Certificate, name)
            .into_iter()
            .filter_map(|object| object.certificate().cloned())
            .collect::<Vec<_>>();
        Ok(self.find_issuer(&candidates, certificate))
    }

    /// Extend the chain from its last certificate toward a trust anchor.
    ///
    /// Issuers are taken from the untrusted certificates first and from the
    /// issuer lookup after that. The number of certificates in the chain is
    /// bounded by the parameter depth.
    pub(super) fn build_chain(&mut self) -> Result<Built> {
        let depth = self.param.depth().unwrap_or(DEFAULT_DEPTH);
        let mut pool = self.untrusted.clone();
        let mut num = self.chain.len();
        let mut tail = self.chain[num - 1].clone();

        while depth >= num && !self.check_issued(&tail, &tail) {
            let Some(issuer) = self.find_issuer(&pool, &tail) else {
                break;
            };
            if let Some(index) = pool.iter().position(|c| Arc::ptr_eq(c, &issuer)) {
                pool.remove(index);
            }
            self.chain.push(issuer.clone());
            self.last_untrusted += 1;
            tail = issuer;
            num += 1;
        }

        let mut built = Built::Complete;
        let mut self_signed = None;
        if self.check_issued(&tail, &tail) {
            if self.chain.len() == 1 {
                let anchor = match self.get_issuer(&tail) {
                    Ok(Some(anchor)) if anchor == tail => Some(anchor),
                    Ok(_) => None,
                    Err(err) => {
                        trace!(%err, "no anchor for self signed target");
                        None
                    }
                };
                match anchor {
                    Some(anchor) => {
                        self.chain[0] = anchor.clone();
                        tail = anchor;
                        self.last_untrusted = 0;
                    }
                    None => {
                        built = Built::Faulted;
                        if self
                            .report(VerifyError::DepthZeroSelfSignedCert, 0, &tail)
                            .is_abort()
                        {
                            return Ok(Built::Aborted);
                        }
                    }
                }
            } else {
                self_signed = self.chain.pop();
                self.last_untrusted = self.last_untrusted.saturating_sub(1);
                num -= 1;
                tail = self.chain[num - 1].clone();
            }
        }

        while depth >= num && !self.check_issued(&tail, &tail) {
            let Some(issuer) = self.get_issuer(&tail)? else {
                break;
            };
            self.chain.push(issuer.clone());
            tail = issuer;
            num += 1;
        }

        if !self.check_issued(&tail, &tail) {
            let (error, current) = match self_signed {
                Some(root) if self.check_issued(&tail, &root) => {
                    self.chain.push(root.clone());
                    num += 1;
                    self.last_untrusted = num;
                    (VerifyError::SelfSignedCertInChain, root)
                }
                _ if self.last_untrusted >= num => (VerifyError::UnableToGetIssuerCertLocally, tail),
                _ => (VerifyError::UnableToGetIssuerCert, tail),
            };
            built = Built::Faulted;
            if self.report(error, num - 1, &current).is_abort() {
                return Ok(Built::Aborted);
            }
        }

        debug!(
            length = self.chain.len(),
            last_untrusted = self.last_untrusted,
            ?built,
            "chain built"
        );
        Ok(built)
    }
}
