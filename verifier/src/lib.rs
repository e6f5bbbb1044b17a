// Copyright (c) 2023 The MobileCoin Foundation

#![doc = include_str!("../README.md")]
#![deny(missing_docs, missing_debug_implementations, unsafe_code)]

mod context;
mod error;
mod lookup;
mod param;
mod purpose;
mod store;
mod strategy;
mod trust;
mod verify_error;
pub mod x509;

pub use crate::context::{
    check_issued_by, CrlRevocationCheck, DefaultCertificateCrlCheck, DefaultCrlCheck,
    DefaultCrlLookup, DefaultIssuedCheck, InternalVerifier, StackIssuerLookup, StoreContext,
    StoreIssuerLookup, APP_DATA_SLOT, EX_DATA_SLOTS,
};
pub use crate::error::{Error, Result};
pub use crate::lookup::{Lookup, LookupResult, MemoryLookup};
pub use crate::param::{InheritFlags, VerifyFlags, VerifyParameter};
pub use crate::purpose::{CaStatus, Purpose, Suitability};
pub use crate::store::{Loaded, Store, TrustSource, VerifyOutcome};
pub use crate::strategy::{
    CertificateCrlCheck, ChainVerifier, Cleanup, CrlCheck, CrlLookup, IssuedCheck, IssuerLookup,
    NoCleanup, NullCallback, RevocationCheck, Strategies, Verdict, VerifyCallback,
};
pub use crate::trust::{TrustId, TrustSettings, TrustStatus};
pub use crate::verify_error::VerifyError;
