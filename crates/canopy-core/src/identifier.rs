//! Identifier management using string interning for efficient string storage and comparison
//!
//! This module provides the [`Id`] type used for DEF names, namespace names and
//! node type names.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for efficient identifier storage.
///
/// # Thread Safety
///
/// This uses `Mutex` for thread-safe access to the string interner.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock")
}

/// Efficient identifier type using string interning
///
/// # Examples
///
/// ```
/// use canopy_core::identifier::Id;
///
/// let def = Id::new("Door");
/// assert_eq!(def, "Door");
///
/// let (scope, local) = Id::new("House__Door").split_scoped("__").unwrap();
/// assert_eq!(scope, "House");
/// assert_eq!(local, "Door");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from &str.
    ///
    /// # Arguments
    ///
    /// * `name` - The string representation of the identifier
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Splits a scope-qualified identifier such as `Scope__Local` at the first
    /// occurrence of `separator`.
    ///
    /// Returns `None` when the separator does not occur. Anything after a
    /// second separator stays part of the local name.
    ///
    /// # Examples
    ///
    /// ```
    /// use canopy_core::identifier::Id;
    ///
    /// assert!(Id::new("plain").split_scoped("__").is_none());
    ///
    /// let (scope, local) = Id::new("a__b__c").split_scoped("__").unwrap();
    /// assert_eq!(scope, "a");
    /// assert_eq!(local, "b__c");
    /// ```
    pub fn split_scoped(&self, separator: &str) -> Option<(Id, Id)> {
        if separator.is_empty() {
            return None;
        }
        let (scope, local) = {
            let guard = interner();
            let full = guard.resolve(self.0).expect("Symbol should exist in interner");
            let (scope, local) = full.split_once(separator)?;
            (scope.to_string(), local.to_string())
        };
        Some((Self::new(&scope), Self::new(&local)))
    }

    /// Returns the identifier with ASCII letters lowercased.
    ///
    /// Tag and type lookups are case-insensitive and go through this form.
    pub fn to_ascii_lowercase(&self) -> Id {
        let lower = {
            let guard = interner();
            guard
                .resolve(self.0)
                .expect("Symbol should exist in interner")
                .to_ascii_lowercase()
        };
        Self::new(&lower)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str_value = interner()
            .resolve(self.0)
            .expect("Symbol should exist in interner")
            .to_string();
        write!(f, "{}", str_value)
    }
}

impl std::str::FromStr for Id {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Id {
    /// Creates an `Id` from a string slice
    ///
    /// ```
    /// use canopy_core::identifier::Id;
    ///
    /// let id: Id = "Box".into();
    /// assert_eq!(id, "Box");
    /// ```
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        let guard = interner();
        let self_str = guard.resolve(self.0).expect("Symbol should exist in interner");
        self_str == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
