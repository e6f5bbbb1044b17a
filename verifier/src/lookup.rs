// Copyright (c) 2023 The MobileCoin Foundation

//! Sources of certificates and CRLs indexed by subject name.

use crate::x509::{DistinguishedName, NameKey, ObjectKind, X509Object};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::trace;

/// Result of asking a [`Lookup`] for an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// The first matching object
    Found(X509Object),
    /// Nothing matches
    NotFound,
    /// The source can't answer now, ask again later
    Retry,
}

/// A source of certificates and CRLs indexed by subject name.
///
/// CRLs are indexed by their issuer name.
pub trait Lookup: Send + Sync {
    /// Add `object` to the source.
    ///
    /// # Errors
    /// `Error::DuplicateCertificate` or `Error::DuplicateCrl` when the object
    /// is already present.
    fn add(&mut self, object: X509Object) -> Result<()>;

    /// The first object of `kind` indexed by `name`
    fn by_subject(&self, kind: ObjectKind, name: &DistinguishedName) -> LookupResult;

    /// Every object of `kind` indexed by `name`, in insertion order
    fn all_by_subject(&self, kind: ObjectKind, name: &DistinguishedName) -> Vec<X509Object> {
        match self.by_subject(kind, name) {
            LookupResult::Found(object) => vec![object],
            _ => vec![],
        }
    }
}

/// In memory [`Lookup`], the store's own index
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    objects: BTreeMap<NameKey, Vec<X509Object>>,
}

impl MemoryLookup {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects held
    pub fn len(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }

    /// No objects are held
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every object, ordered by subject
    pub fn objects(&self) -> impl Iterator<Item = &X509Object> {
        self.objects.values().flatten()
    }

    fn matching<'a>(
        &'a self,
        kind: ObjectKind,
        name: &DistinguishedName,
    ) -> impl Iterator<Item = &'a X509Object> {
        self.objects
            .get(name.key())
            .into_iter()
            .flatten()
            .filter(move |object| object.kind() == kind)
    }
}

impl Lookup for MemoryLookup {
    fn add(&mut self, object: X509Object) -> Result<()> {
        let entries = self.objects.entry(object.key().clone()).or_default();
        if entries.contains(&object) {
            return Err(match object.kind() {
                ObjectKind::Certificate => Error::DuplicateCertificate,
                ObjectKind::Crl => Error::DuplicateCrl,
            });
        }
        trace!(subject = %object.subject(), kind = ?object.kind(), "added object");
        entries.push(object);
        Ok(())
    }

    fn by_subject(&self, kind: ObjectKind, name: &DistinguishedName) -> LookupResult {
        match self.matching(kind, name).next() {
            Some(object) => LookupResult::Found(object.clone()),
            None => LookupResult::NotFound,
        }
    }

    fn all_by_subject(&self, kind: ObjectKind, name: &DistinguishedName) -> Vec<X509Object> {
        self.matching(kind, name).cloned().collect()
    }
}
