//! Value types shared across the checkout engine.
//!
//! Identifiers, money, form records and file references. Everything here is
//! a plain value: cheap to clone, comparable, and serializable into the
//! local draft.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::sync::Arc;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a catalog item
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key of a form group.
///
/// Derived from the participating item ids and the structural hash of the
/// group's field set, so previously entered data stays attached to the group
/// across rebuilds. Lowercase hex, safe to embed in multipart part names.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSignature(String);

impl GroupSignature {
    /// Wrap an already computed signature
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the signature text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// An amount of Indian rupees, stored as integer paise.
///
/// Integer storage keeps every total exact to two decimal places. Arithmetic
/// saturates instead of overflowing; a festival order never comes close to
/// `u64::MAX` paise.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero rupees
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from paise
    #[must_use]
    pub const fn from_paise(paise: u64) -> Self {
        Self(paise)
    }

    /// Creates a `Money` value from whole rupees
    #[must_use]
    pub const fn from_rupees(rupees: u64) -> Self {
        Self(rupees.saturating_mul(100))
    }

    /// Creates a `Money` value from a (wire) rupee amount, rounded to the
    /// nearest paisa. Negative and non-finite values become zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_rupees_f64(rupees: f64) -> Self {
        if !rupees.is_finite() || rupees <= 0.0 {
            return Self::ZERO;
        }
        Self((rupees * 100.0).round() as u64)
    }

    /// Returns the amount in paise
    #[must_use]
    pub const fn paise(&self) -> u64 {
        self.0
    }

    /// Returns the amount in whole rupees (rounded down)
    #[must_use]
    pub const fn rupees(&self) -> u64 {
        self.0 / 100
    }

    /// Returns the amount in rupees for wire formats
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_rupees_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Subtracts, stopping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by a quantity, saturating
    #[must_use]
    pub const fn times(self, quantity: u64) -> Self {
        Self(self.0.saturating_mul(quantity))
    }

    /// Absolute difference between two amounts
    #[must_use]
    pub const fn abs_diff(self, other: Self) -> Self {
        Self(self.0.abs_diff(other.0))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paise = self.0 % 100;
        if paise == 0 {
            write!(f, "₹{}", self.rupees())
        } else {
            write!(f, "₹{}.{paise:02}", self.rupees())
        }
    }
}

/// Serde adapter that puts [`Money`] on the wire as a rupee number.
///
/// The backend speaks rupees (`"orderAmount": 268.5`); the engine keeps paise.
pub mod rupees {
    use super::Money;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a rupee `f64`
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(amount: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(amount.as_rupees_f64())
    }

    /// Deserialize from a rupee number
    ///
    /// # Errors
    ///
    /// Fails when the value is not a number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        f64::deserialize(deserializer).map(Money::from_rupees_f64)
    }
}

// ============================================================================
// Form data
// ============================================================================

/// Values entered into one form, keyed by field name.
pub type Record = BTreeMap<String, String>;

/// Read a field from a record, trimmed, treating blank as absent.
#[must_use]
pub fn field_value<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// A file the user attached to a form field.
///
/// The bytes are shared, so cloning a `FileRef` into an upload effect does
/// not copy the file.
#[derive(Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Original file name
    pub name: String,
    /// MIME type reported for the file
    pub content_type: String,
    /// File contents
    pub bytes: Arc<[u8]>,
}

impl FileRef {
    /// Create a file reference
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRef")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
