// Copyright (c) 2023 The MobileCoin Foundation

//! Signature and validity window checks along a built chain.

use super::StoreContext;
use crate::strategy::{ChainVerifier, Verdict};
use crate::x509::Certificate;
use crate::VerifyError;
use std::sync::Arc;
use tracing::trace;

/// The built-in chain verifier.
///
/// Walks the chain from the anchor down to the target checking each
/// signature with the key of the certificate above it. An anchor that the
/// session's issued check accepts as its own issuer is checked against its
/// own key. Only a signature that checked out is cached, later sessions
/// skip it but always check the validity window.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalVerifier;

impl ChainVerifier for InternalVerifier {
    fn verify(&self, ctx: &mut StoreContext) -> Verdict {
        let Some(mut depth) = ctx.chain.len().checked_sub(1) else {
            return Verdict::Continue;
        };
        ctx.error_depth = depth;
        let mut issuer = ctx.chain[depth].clone();

        let mut subject = if ctx.check_issued(&issuer, &issuer) {
            issuer.clone()
        } else if depth == 0 {
            ctx.error = Some(VerifyError::UnableToVerifyLeafSignature);
            ctx.current_certificate = Some(issuer);
            ctx.notify(false);
            return Verdict::Abort;
        } else {
            depth -= 1;
            ctx.chain[depth].clone()
        };

        loop {
            ctx.error_depth = depth;
            if !subject.is_verified() {
                match signature_fault(&subject, &issuer) {
                    Some(fault) => {
                        if ctx.report(fault, depth, &subject).is_abort() {
                            return Verdict::Abort;
                        }
                    }
                    None => subject.mark_verified(),
                }
            }

            if ctx.check_certificate_time(&subject).is_abort() {
                return Verdict::Abort;
            }

            ctx.current_issuer = Some(issuer.clone());
            ctx.current_certificate = Some(subject.clone());
            trace!(depth, subject = %subject.subject(), "link verified");
            if ctx.notify(true).is_abort() {
                return Verdict::Abort;
            }

            if depth == 0 {
                break;
            }
            depth -= 1;
            issuer = subject;
            subject = ctx.chain[depth].clone();
        }
        Verdict::Continue
    }
}

fn signature_fault(subject: &Certificate, issuer: &Certificate) -> Option<VerifyError> {
    match issuer.public_key() {
        None => Some(VerifyError::UnableToDecodeIssuerPublicKey),
        Some(key) => subject
            .verify_signature(key)
            .err()
            .map(|_| VerifyError::CertSignatureFailure),
    }
}

impl StoreContext {
    /// Check `certificate`'s validity window against the check time.
    ///
    /// Each bound is reported on its own at the current error depth.
    pub(super) fn check_certificate_time(&mut self, certificate: &Arc<Certificate>) -> Verdict {
        let now = self.check_time();
        let depth = self.error_depth;
        if certificate.not_before() >= now
            && self
                .report(VerifyError::CertNotYetValid, depth, certificate)
                .is_abort()
        {
            return Verdict::Abort;
        }
        if certificate.not_after() <= now
            && self
                .report(VerifyError::CertHasExpired, depth, certificate)
                .is_abort()
        {
            return Verdict::Abort;
        }
        Verdict::Continue
    }
}
