//! The `String` class.
//!
//! [`Str`] is a typed handle to an instance of the core `String` class: an
//! immutable UTF-8 value object. It overrides the root behaviour with value
//! semantics:
//!
//! - `equals` compares text, `hash_sum` hashes it with FxHash
//! - `to_string` and `clone` return the same object (it never changes)
//! - `compare_to` orders lexicographically
//! - `to_i64` and `to_f64` parse a leading number, C style
//!
//! # Example
//!
//! ```rust
//! use finch::Str;
//!
//! let a = Str::new("Ωmega 42");
//! let b = Str::new(String::from("Ωmega 42"));
//!
//! assert_eq!(a, b);
//! assert_eq!(a.hash_sum(), b.hash_sum());
//! assert_eq!(a.find("42"), Some(6));
//! assert_eq!(a.find("zeta"), None);
//! ```

use crate::error::{Error, Result};
use crate::runtime::vtable::{Imp, Payload};
use crate::runtime::{Class, Object, registry};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

/// Payload of `String` instances.
#[derive(Debug, Default)]
pub(crate) struct StrIvars {
    text: Box<str>,
}

pub(crate) fn alloc_ivars() -> Payload {
    Box::new(StrIvars::default())
}

pub(crate) const STRING_METHODS: &[Imp] = &[
    Imp::Equals(str_equals),
    Imp::HashSum(str_hash_sum),
    Imp::ToString(str_to_string),
    Imp::Clone(str_clone),
    Imp::CompareTo(str_compare_to),
    Imp::ToI64(str_to_i64),
    Imp::ToF64(str_to_f64),
];

/// Handle to a `String` object.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Str(Object);

impl Str {
    /// The core `String` class.
    #[must_use]
    pub fn class() -> Class {
        registry::core().string
    }

    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let ivars = StrIvars {
            text: text.into().into_boxed_str(),
        };
        Str(Object::alloc(Self::class(), Box::new(ivars)))
    }

    /// Builds a string from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] if `bytes` is not valid UTF-8.
    pub fn from_utf8(bytes: &[u8]) -> Result<Self> {
        std::str::from_utf8(bytes)
            .map(Str::new)
            .map_err(|_| Error::InvalidUtf8)
    }

    /// Views a generic object as a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassMismatch`] unless the object is a `String`
    /// (or a subclass) carrying string data.
    pub fn from_object(obj: Object) -> Result<Self> {
        obj.certify(&Self::class())?;
        if obj.payload::<StrIvars>().is_none() {
            return Err(Error::class_mismatch(Self::class().name(), obj.class_name()));
        }
        Ok(Str(obj))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.payload::<StrIvars>().map_or("", |ivars| &ivars.text)
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    /// Number of code points.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.as_str().chars().count()
    }

    /// Code-point index of the first occurrence of `needle`.
    ///
    /// An empty needle is found at 0.
    #[must_use]
    pub fn find(&self, needle: &str) -> Option<usize> {
        let text = self.as_str();
        text.find(needle).map(|byte| text[..byte].chars().count())
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.as_str().contains(needle)
    }

    #[must_use]
    pub fn as_object(&self) -> &Object {
        &self.0
    }

    #[must_use]
    pub fn into_object(self) -> Object {
        self.0
    }
}

impl Deref for Str {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

impl From<&str> for Str {
    fn from(text: &str) -> Self {
        Str::new(text)
    }
}

impl From<String> for Str {
    fn from(text: String) -> Self {
        Str::new(text)
    }
}

impl PartialEq<str> for Str {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Str {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Str").field(&self.as_str()).finish()
    }
}

fn text_of(obj: &Object) -> Option<&str> {
    obj.payload::<StrIvars>().map(|ivars| &*ivars.text)
}

fn str_equals(obj: &Object, other: &Object) -> bool {
    if obj.is_same(other) {
        return true;
    }
    match (text_of(obj), text_of(other)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn str_hash_sum(obj: &Object) -> u32 {
    fxhash::hash32(text_of(obj).unwrap_or_default().as_bytes())
}

fn str_to_string(obj: &Object) -> Str {
    Str(obj.inc_ref())
}

fn str_clone(obj: &Object) -> Result<Object> {
    Ok(obj.inc_ref())
}

fn str_compare_to(obj: &Object, other: &Object) -> Result<Ordering> {
    let theirs = text_of(other)
        .ok_or_else(|| Error::class_mismatch(Str::class().name(), other.class_name()))?;
    Ok(text_of(obj).unwrap_or_default().cmp(theirs))
}

fn str_to_i64(obj: &Object) -> Result<i64> {
    Ok(parse_i64_prefix(text_of(obj).unwrap_or_default()))
}

fn str_to_f64(obj: &Object) -> Result<f64> {
    Ok(parse_f64_prefix(text_of(obj).unwrap_or_default()))
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Decimal integer at the start of `text`, after optional whitespace and
/// sign. Saturates at the `i64` bounds; 0 when there are no digits.
fn parse_i64_prefix(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |value, b| {
            let digit = i64::from(b - b'0');
            if negative {
                value.saturating_mul(10).saturating_sub(digit)
            } else {
                value.saturating_mul(10).saturating_add(digit)
            }
        })
}

/// Longest decimal floating-point prefix of `text`; 0.0 when there is none.
fn parse_f64_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    trimmed[..end].parse().unwrap_or(0.0)
}
