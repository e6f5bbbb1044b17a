// Copyright (c) 2023 The MobileCoin Foundation

//! Extension constraints along the untrusted part of the chain, and the
//! trust check of the certificate the chain ends in.

use super::StoreContext;
use crate::param::VerifyFlags;
use crate::purpose::CaStatus;
use crate::strategy::Verdict;
use crate::trust::TrustStatus;
use crate::x509::{
    Certificate, OID_BASIC_CONSTRAINTS, OID_EXT_KEY_USAGE, OID_KEY_USAGE, OID_NETSCAPE_CERT_TYPE,
    OID_PROXY_CERT_INFO, OID_SUBJECT_ALT_NAME,
};
use crate::VerifyError;
use const_oid::ObjectIdentifier;
use tracing::debug;

const ALLOW_PROXY_CERTS_ENV: &str = "OPENSSL_ALLOW_PROXY_CERTS";

/// Critical extensions path validation knows how to honor
const SUPPORTED_CRITICAL: [ObjectIdentifier; 6] = [
    OID_NETSCAPE_CERT_TYPE,
    OID_KEY_USAGE,
    OID_SUBJECT_ALT_NAME,
    OID_BASIC_CONSTRAINTS,
    OID_EXT_KEY_USAGE,
    OID_PROXY_CERT_INFO,
];

/// What the next certificate up the chain has to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaRequirement {
    /// The target, either is fine
    Either,
    /// Issued a proxy certificate, so must not be a CA
    NonCa,
    /// Issued a regular certificate
    Ca,
}

fn has_unhandled_critical(certificate: &Certificate) -> bool {
    certificate
        .extensions()
        .critical
        .iter()
        .any(|oid| !SUPPORTED_CRITICAL.contains(oid))
}

fn proxy_certs_allowed_by_env() -> bool {
    std::env::var(ALLOW_PROXY_CERTS_ENV).map_or(false, |value| !value.eq_ignore_ascii_case("false"))
}

impl StoreContext {
    /// Check the extensions of every untrusted certificate, target first.
    pub(super) fn check_chain_extensions(&mut self) -> Verdict {
        let flags = self.param.flags();
        let strict = flags.contains(VerifyFlags::X509_STRICT);
        let allow_proxy =
            flags.contains(VerifyFlags::ALLOW_PROXY_CERTS) || proxy_certs_allowed_by_env();
        let purpose = self.param.purpose();
        let mut requirement = CaRequirement::Either;
        let mut proxy_path_length = 0_usize;

        let untrusted = self.last_untrusted.min(self.chain.len());
        debug!(untrusted, ?purpose, strict, "checking chain extensions");
        for depth in 0..untrusted {
            let certificate = self.chain[depth].clone();
            let extensions = certificate.extensions();

            if !flags.contains(VerifyFlags::IGNORE_CRITICAL)
                && has_unhandled_critical(&certificate)
                && self
                    .report(VerifyError::UnhandledCriticalExtension, depth, &certificate)
                    .is_abort()
            {
                return Verdict::Abort;
            }

            if !allow_proxy
                && extensions.proxy_cert_info.is_some()
                && self
                    .report(VerifyError::ProxyCertificatesNotAllowed, depth, &certificate)
                    .is_abort()
            {
                return Verdict::Abort;
            }

            let ca = CaStatus::of(&certificate);
            let ca_fault = match requirement {
                CaRequirement::Either => {
                    (strict && !matches!(ca, CaStatus::Ca | CaStatus::NotCa))
                        .then_some(VerifyError::InvalidCa)
                }
                CaRequirement::NonCa => (ca != CaStatus::NotCa).then_some(VerifyError::InvalidNonCa),
                CaRequirement::Ca => (ca == CaStatus::NotCa || (strict && ca != CaStatus::Ca))
                    .then_some(VerifyError::InvalidCa),
            };
            if let Some(fault) = ca_fault {
                if self.report(fault, depth, &certificate).is_abort() {
                    return Verdict::Abort;
                }
            }

            if let Some(purpose) = purpose {
                let suitability = purpose.check(&certificate, requirement == CaRequirement::Ca);
                if !suitability.passes(strict)
                    && self
                        .report(VerifyError::InvalidPurpose, depth, &certificate)
                        .is_abort()
                {
                    return Verdict::Abort;
                }
            }

            let path_len = extensions
                .basic_constraints
                .filter(|constraints| constraints.ca)
                .and_then(|constraints| constraints.path_len);
            if let Some(path_len) = path_len {
                if depth > 1
                    && depth > path_len as usize + proxy_path_length + 1
                    && self
                        .report(VerifyError::PathLengthExceeded, depth, &certificate)
                        .is_abort()
                {
                    return Verdict::Abort;
                }
            }

            match extensions.proxy_cert_info {
                Some(proxy) => {
                    if let Some(path_len) = proxy.path_len {
                        if depth > path_len as usize
                            && self
                                .report(VerifyError::ProxyPathLengthExceeded, depth, &certificate)
                                .is_abort()
                        {
                            return Verdict::Abort;
                        }
                    }
                    proxy_path_length += 1;
                    requirement = CaRequirement::NonCa;
                }
                None => requirement = CaRequirement::Ca,
            }
        }
        Verdict::Continue
    }

    /// Classify the certificate the chain ends in against the trust level.
    pub(super) fn check_trust(&mut self) -> Verdict {
        let Some(trust) = self.param.trust() else {
            return Verdict::Continue;
        };
        let depth = self.chain.len().saturating_sub(1);
        let Some(anchor) = self.chain.get(depth).cloned() else {
            return Verdict::Continue;
        };
        let status = trust.check(&anchor);
        debug!(?trust, ?status, "checking trust");
        match status {
            TrustStatus::Trusted => Verdict::Continue,
            TrustStatus::Rejected => self.report(VerifyError::CertRejected, depth, &anchor),
            TrustStatus::Untrusted => self.report(VerifyError::CertUntrusted, depth, &anchor),
        }
    }
}
