// Copyright (c) 2023 The MobileCoin Foundation

//! Verification parameters and the named profiles sessions fall back to.
//!
//! A [`VerifyParameter`] bundles the options for one verification: flags,
//! purpose, trust, maximum depth and an optional fixed check time. Parameters
//! are layered by [`VerifyParameter::inherit`], a session starts empty,
//! inherits the store's parameters and then the `default` profile.
//!
//! Profiles live in a process wide registry seeded with `default`, `pkcs7`,
//! `smime_sign`, `ssl_client` and `ssl_server`.

use crate::purpose::Purpose;
use crate::trust::TrustId;
use crate::{Error, Result};
use bitflags::bitflags;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::sync::{OnceLock, PoisonError, RwLock};
use tracing::debug;

bitflags! {
    /// Flags controlling verification
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct VerifyFlags: u32 {
        /// Report issuer check failures through the verify callback
        const CB_ISSUER_CHECK = 0x1;
        /// Use the parameter's check time instead of the current time
        const USE_CHECK_TIME = 0x2;
        /// Check the leaf certificate against CRLs
        const CRL_CHECK = 0x4;
        /// Check every certificate in the chain against CRLs
        const CRL_CHECK_ALL = 0x8;
        /// Ignore unhandled critical extensions
        const IGNORE_CRITICAL = 0x10;
        /// Reject certificates that are only tolerated
        const X509_STRICT = 0x20;
        /// Allow proxy certificates
        const ALLOW_PROXY_CERTS = 0x40;
        /// Run the policy stage
        const POLICY_CHECK = 0x80;
        /// Require an explicit policy
        const EXPLICIT_POLICY = 0x100;
        /// Inhibit the any policy
        const INHIBIT_ANY = 0x200;
        /// Inhibit policy mapping
        const INHIBIT_MAP = 0x400;
        /// Notify the callback about policy
        const NOTIFY_POLICY = 0x800;
    }
}

impl Default for VerifyFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Flags controlling how parameters are merged by
    /// [`VerifyParameter::inherit`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct InheritFlags: u32 {
        /// Copy values from the source even when the destination has them
        const DEFAULT = 0x1;
        /// Copy every value from the source, set or not
        const OVERWRITE = 0x2;
        /// Clear the destination flags before merging them
        const RESET_FLAGS = 0x4;
        /// Never merge into the destination
        const LOCKED = 0x8;
        /// Clear the destination's inherit flags after the next merge
        const ONCE = 0x10;
    }
}

impl Default for InheritFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Options for a verification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyParameter {
    name: Option<String>,
    inherit_flags: InheritFlags,
    flags: VerifyFlags,
    purpose: Option<Purpose>,
    trust: Option<TrustId>,
    depth: Option<usize>,
    check_time: Option<Duration>,
}

impl VerifyParameter {
    /// Create a new named, otherwise empty, parameter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Load a parameter from JSON, e.g.
    ///
    /// ```json
    /// {"name": "strict_server", "flags": "X509_STRICT | CRL_CHECK", "purpose": "ssl_server", "depth": 4}
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Self::try_from(json)
    }

    /// The profile name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The verification flags
    pub fn flags(&self) -> VerifyFlags {
        self.flags
    }

    /// Add `flags` to the verification flags
    pub fn set_flags(&mut self, flags: VerifyFlags) {
        self.flags |= flags;
    }

    /// Remove `flags` from the verification flags
    pub fn clear_flags(&mut self, flags: VerifyFlags) {
        self.flags &= !flags;
    }

    /// The inherit flags
    pub fn inherit_flags(&self) -> InheritFlags {
        self.inherit_flags
    }

    /// Replace the inherit flags
    pub fn set_inherit_flags(&mut self, flags: InheritFlags) {
        self.inherit_flags = flags;
    }

    /// The purpose chains must be valid for
    pub fn purpose(&self) -> Option<Purpose> {
        self.purpose
    }

    /// Set the purpose
    pub fn set_purpose(&mut self, purpose: Purpose) {
        self.purpose = Some(purpose);
    }

    /// The trust level the chain's anchor is checked against
    pub fn trust(&self) -> Option<TrustId> {
        self.trust
    }

    /// Set the trust level
    pub fn set_trust(&mut self, trust: TrustId) {
        self.trust = Some(trust);
    }

    /// Maximum number of untrusted certificates in a chain
    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    /// Set the maximum depth
    pub fn set_depth(&mut self, depth: usize) {
        self.depth = Some(depth);
    }

    /// The fixed check time, only used with [`VerifyFlags::USE_CHECK_TIME`]
    pub fn check_time(&self) -> Option<Duration> {
        self.check_time
    }

    /// Verify as of `time` since the unix epoch instead of now
    pub fn set_time(&mut self, time: Duration) {
        self.check_time = Some(time);
        self.flags |= VerifyFlags::USE_CHECK_TIME;
    }

    /// Merge `src` into this parameter.
    ///
    /// Purpose, trust and depth are taken from `src` when overwriting, or
    /// when `src` has them and either this parameter lacks them or
    /// [`InheritFlags::DEFAULT`] is in effect. The check time is taken unless
    /// this parameter already uses its own. Flags are always added.
    pub fn inherit(&mut self, src: &VerifyParameter) {
        let inherit_flags = self.inherit_flags | src.inherit_flags;
        if inherit_flags.contains(InheritFlags::ONCE) {
            self.inherit_flags = InheritFlags::empty();
        }
        if inherit_flags.contains(InheritFlags::LOCKED) {
            return;
        }
        let to_default = inherit_flags.contains(InheritFlags::DEFAULT);
        let to_overwrite = inherit_flags.contains(InheritFlags::OVERWRITE);

        fn copy<T: Copy>(dest: &mut Option<T>, src: Option<T>, to_default: bool, overwrite: bool) {
            if overwrite || (src.is_some() && (to_default || dest.is_none())) {
                *dest = src;
            }
        }
        copy(&mut self.purpose, src.purpose, to_default, to_overwrite);
        copy(&mut self.trust, src.trust, to_default, to_overwrite);
        copy(&mut self.depth, src.depth, to_default, to_overwrite);

        if to_overwrite || !self.flags.contains(VerifyFlags::USE_CHECK_TIME) {
            self.check_time = src.check_time;
            // Comes back below if `src` uses its check time
            self.flags.remove(VerifyFlags::USE_CHECK_TIME);
        }
        if inherit_flags.contains(InheritFlags::RESET_FLAGS) {
            self.flags = VerifyFlags::empty();
        }
        self.flags |= src.flags;
    }

    /// Merge `src` into this parameter with [`InheritFlags::DEFAULT`] in
    /// effect, so every value `src` has replaces this one's.
    pub fn set1(&mut self, src: &VerifyParameter) {
        let saved = self.inherit_flags;
        self.inherit_flags |= InheritFlags::DEFAULT;
        self.inherit(src);
        self.inherit_flags = saved;
    }

    /// Look up a named profile
    pub fn lookup(name: &str) -> Option<VerifyParameter> {
        let profiles = registry().read().unwrap_or_else(PoisonError::into_inner);
        profiles
            .iter()
            .find(|profile| profile.name() == Some(name))
            .cloned()
    }

    /// Register `param` as a named profile, replacing any profile with the
    /// same name.
    pub fn add_profile(param: VerifyParameter) -> Result<()> {
        let name = param.name().ok_or(Error::UnnamedProfile)?.to_owned();
        let mut profiles = registry().write().unwrap_or_else(PoisonError::into_inner);
        match profiles.iter_mut().find(|p| p.name() == Some(name.as_str())) {
            Some(existing) => *existing = param,
            None => profiles.push(param),
        }
        debug!(profile = %name, "registered verification profile");
        Ok(())
    }

    /// Names of all registered profiles
    pub fn profile_names() -> Vec<String> {
        let profiles = registry().read().unwrap_or_else(PoisonError::into_inner);
        profiles
            .iter()
            .filter_map(|profile| profile.name.clone())
            .collect()
    }
}

impl TryFrom<&str> for VerifyParameter {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        let param: VerifyParameter = serde_json::from_str(value)?;
        Ok(param)
    }
}

fn registry() -> &'static RwLock<Vec<VerifyParameter>> {
    static REGISTRY: OnceLock<RwLock<Vec<VerifyParameter>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(builtin_profiles()))
}

fn builtin_profiles() -> Vec<VerifyParameter> {
    let profile = |name: &str, purpose: Option<Purpose>, trust: Option<TrustId>, depth| {
        VerifyParameter {
            name: Some(name.to_owned()),
            purpose,
            trust,
            depth,
            ..Default::default()
        }
    };
    vec![
        profile("default", None, None, Some(100)),
        profile(
            "pkcs7",
            Some(Purpose::SmimeSign),
            Some(TrustId::Email),
            None,
        ),
        profile(
            "smime_sign",
            Some(Purpose::SmimeSign),
            Some(TrustId::Email),
            None,
        ),
        profile(
            "ssl_client",
            Some(Purpose::SslClient),
            Some(TrustId::SslClient),
            None,
        ),
        profile(
            "ssl_server",
            Some(Purpose::SslServer),
            Some(TrustId::SslServer),
            None,
        ),
    ]
}
