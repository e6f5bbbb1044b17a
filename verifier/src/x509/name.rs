// Copyright (c) 2023 The MobileCoin Foundation

//! Distinguished names used as certificate subjects, issuers and CRL issuers.
//!
//! Names are compared as described in
//! [RFC5280 section 7.1](https://datatracker.ietf.org/doc/html/rfc5280#section-7.1):
//! attribute types must match exactly and `DirectoryString` values are
//! compared after [RFC4518](https://www.rfc-editor.org/rfc/rfc4518) string
//! preparation and case folding.
//!
//! Supported `DirectoryString` choices are `PrintableString`, `UTF8String`
//! and `IA5String`. Values of any other type are compared on their exact
//! encoding.
//!
//! Every [`DistinguishedName`] carries a precomputed [`NameKey`] so that
//! equality and ordering are cheap. The key is what the store indexes
//! objects by.

use crate::{Error, Result};
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use unicode_normalization::UnicodeNormalization;
use x509_cert::attr::AttributeValue;
use x509_cert::der::asn1::{Ia5StringRef, PrintableStringRef, Utf8StringRef};
use x509_cert::der::{Encode, Tag, Tagged};
use x509_cert::name::Name;

/// The comparison form of a name.
///
/// One entry per relative distinguished name, each holding the attribute
/// type and the prepared value of every attribute in it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NameKey(Vec<Vec<(String, String)>>);

/// An X509 distinguished name
#[derive(Debug, Clone)]
pub struct DistinguishedName {
    name: Name,
    key: NameKey,
}

impl DistinguishedName {
    /// The underlying ASN.1 name
    pub fn as_name(&self) -> &Name {
        &self.name
    }

    /// The comparison key for this name
    pub fn key(&self) -> &NameKey {
        &self.key
    }

    /// `true` when the name has no relative distinguished names
    pub fn is_empty(&self) -> bool {
        self.name.0.is_empty()
    }
}

impl From<Name> for DistinguishedName {
    fn from(name: Name) -> Self {
        let key = NameKey(
            name.0
                .iter()
                .map(|rdn| {
                    rdn.0
                        .iter()
                        .map(|attr| (attr.oid.to_string(), comparison_value(&attr.value)))
                        .collect()
                })
                .collect(),
        );
        Self { name, key }
    }
}

impl From<&Name> for DistinguishedName {
    fn from(name: &Name) -> Self {
        Self::from(name.clone())
    }
}

/// Parses an RFC4514 string such as `CN=Test Root,O=Example`
impl FromStr for DistinguishedName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = Name::from_str(s)?;
        Ok(Self::from(name))
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for DistinguishedName {}

impl Display for DistinguishedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn comparison_value(value: &AttributeValue) -> String {
    match directory_str(value) {
        Some(s) => caseless::default_case_fold_str(&prepare(s)),
        None => {
            // Keep the tag in the key so that equal bytes under different
            // string types stay distinct.
            let encoded = value.to_der().unwrap_or_default();
            format!("#{:02x}{}", value.tag().octet(), hex::encode(encoded))
        }
    }
}

fn directory_str(value: &AttributeValue) -> Option<&str> {
    match value.tag() {
        Tag::PrintableString => PrintableStringRef::try_from(value)
            .ok()
            .map(|s| s.as_str()),
        Tag::Utf8String => Utf8StringRef::try_from(value).ok().map(|s| s.as_str()),
        Tag::Ia5String => Ia5StringRef::try_from(value).ok().map(|s| s.as_str()),
        _ => None,
    }
}

/// RFC4518 string preparation: map, normalize (NFKC) and compress
/// insignificant spaces.
fn prepare(s: &str) -> String {
    let normalized = s
        .chars()
        .filter_map(map_char)
        .nfkc()
        .collect::<String>();
    compress_spaces(&normalized)
}

/// The map step of
/// [RFC4518 section 2.2](https://www.rfc-editor.org/rfc/rfc4518#section-2.2).
///
/// Whitespace maps to a space and the listed control, joiner and variation
/// selector code points map to nothing. The variation selector range is
/// `FE00-FE0F` as in RFC3454 appendix B.1.
fn map_char(c: char) -> Option<char> {
    if c.is_whitespace() {
        return Some(' ');
    }
    match c {
        '\u{0000}'..='\u{0008}'
        | '\u{000E}'..='\u{001F}'
        | '\u{007F}'..='\u{0084}'
        | '\u{0086}'..='\u{009F}'
        | '\u{00AD}'
        | '\u{034F}'
        | '\u{06DD}'
        | '\u{070F}'
        | '\u{1806}'
        | '\u{180B}'..='\u{180E}'
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2063}'
        | '\u{206A}'..='\u{206F}'
        | '\u{FE00}'..='\u{FE0F}'
        | '\u{FEFF}'
        | '\u{FFF9}'..='\u{FFFC}'
        | '\u{1D173}'..='\u{1D17A}'
        | '\u{E0001}'
        | '\u{E0020}'..='\u{E0074}' => None,
        c => Some(c),
    }
}

/// Insignificant space handling from
/// [RFC4518 section 2.6.1](https://www.rfc-editor.org/rfc/rfc4518#section-2.6.1).
///
/// The result starts and ends with exactly one space and every inner run of
/// spaces becomes exactly two.
fn compress_spaces(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push(' ');
    for word in s.split(' ').filter(|w| !w.is_empty()) {
        if result.len() > 1 {
            result.push_str("  ");
        }
        result.push_str(word);
    }
    result.push(' ');
    result
}
