//! Typed field values for scene nodes.
//!
//! Every scene node exposes a [`FieldMap`] of named [`FieldValue`]s. Values
//! fall into two groups:
//!
//! - **Clonable** values (vectors, colors, rotations and every multi-valued
//!   type) are duplicated whenever they cross the node boundary, so a caller
//!   never holds the node's live instance.
//! - **Primitive** values (booleans, numbers, strings) are plain copies.
//!
//! Multi-valued (`MF*`) fields are additionally *by-reference*: they are the
//! only fields a caller may borrow mutably through a field reference.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised while converting attribute text into field values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("unknown field type `{0}`")]
    UnknownKind(String),

    #[error("invalid {kind} value `{text}`")]
    InvalidValue { kind: FieldKind, text: String },

    #[error("{kind} expects a multiple of {arity} numbers, got {count}")]
    Arity {
        kind: FieldKind,
        arity: usize,
        count: usize,
    },
}

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    SFBool,
    SFInt32,
    SFFloat,
    SFTime,
    SFString,
    SFVec2f,
    SFVec3f,
    SFColor,
    SFRotation,
    MFString,
    MFInt32,
    MFFloat,
    MFVec3f,
    MFColor,
}

impl FieldKind {
    /// Returns the type name as written in documents (e.g. `SFVec3f`).
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::SFBool => "SFBool",
            FieldKind::SFInt32 => "SFInt32",
            FieldKind::SFFloat => "SFFloat",
            FieldKind::SFTime => "SFTime",
            FieldKind::SFString => "SFString",
            FieldKind::SFVec2f => "SFVec2f",
            FieldKind::SFVec3f => "SFVec3f",
            FieldKind::SFColor => "SFColor",
            FieldKind::SFRotation => "SFRotation",
            FieldKind::MFString => "MFString",
            FieldKind::MFInt32 => "MFInt32",
            FieldKind::MFFloat => "MFFloat",
            FieldKind::MFVec3f => "MFVec3f",
            FieldKind::MFColor => "MFColor",
        }
    }

    /// Parse attribute text into a value of this kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use canopy_core::field::{FieldKind, FieldValue};
    ///
    /// let value = FieldKind::SFVec3f.parse("1 2 3").unwrap();
    /// assert_eq!(value, FieldValue::SFVec3f([1.0, 2.0, 3.0]));
    ///
    /// let names = FieldKind::MFString.parse(r#""a.x3d#Door" "b.x3d""#).unwrap();
    /// assert_eq!(
    ///     names,
    ///     FieldValue::MFString(vec!["a.x3d#Door".to_string(), "b.x3d".to_string()])
    /// );
    /// ```
    pub fn parse(self, text: &str) -> Result<FieldValue, FieldError> {
        let invalid = || FieldError::InvalidValue {
            kind: self,
            text: text.to_string(),
        };
        match self {
            FieldKind::SFBool => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(FieldValue::SFBool(true)),
                "false" => Ok(FieldValue::SFBool(false)),
                _ => Err(invalid()),
            },
            FieldKind::SFInt32 => text
                .trim()
                .parse()
                .map(FieldValue::SFInt32)
                .map_err(|_| invalid()),
            FieldKind::SFFloat => text
                .trim()
                .parse()
                .map(FieldValue::SFFloat)
                .map_err(|_| invalid()),
            FieldKind::SFTime => text
                .trim()
                .parse()
                .map(FieldValue::SFTime)
                .map_err(|_| invalid()),
            FieldKind::SFString => Ok(FieldValue::SFString(text.to_string())),
            FieldKind::SFVec2f => fixed::<2>(self, text).map(FieldValue::SFVec2f),
            FieldKind::SFVec3f => fixed::<3>(self, text).map(FieldValue::SFVec3f),
            FieldKind::SFColor => fixed::<3>(self, text).map(FieldValue::SFColor),
            FieldKind::SFRotation => fixed::<4>(self, text).map(FieldValue::SFRotation),
            FieldKind::MFString => Ok(FieldValue::MFString(split_mf_string(text))),
            FieldKind::MFInt32 => numbers::<i32>(self, text).map(FieldValue::MFInt32),
            FieldKind::MFFloat => numbers::<f32>(self, text).map(FieldValue::MFFloat),
            FieldKind::MFVec3f => tuples::<3>(self, text).map(FieldValue::MFVec3f),
            FieldKind::MFColor => tuples::<3>(self, text).map(FieldValue::MFColor),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "SFBool" => FieldKind::SFBool,
            "SFInt32" => FieldKind::SFInt32,
            "SFFloat" => FieldKind::SFFloat,
            "SFTime" => FieldKind::SFTime,
            "SFString" => FieldKind::SFString,
            "SFVec2f" => FieldKind::SFVec2f,
            "SFVec3f" => FieldKind::SFVec3f,
            "SFColor" => FieldKind::SFColor,
            "SFRotation" => FieldKind::SFRotation,
            "MFString" => FieldKind::MFString,
            "MFInt32" => FieldKind::MFInt32,
            "MFFloat" => FieldKind::MFFloat,
            "MFVec3f" => FieldKind::MFVec3f,
            "MFColor" => FieldKind::MFColor,
            other => return Err(FieldError::UnknownKind(other.to_string())),
        };
        Ok(kind)
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    SFBool(bool),
    SFInt32(i32),
    SFFloat(f32),
    SFTime(f64),
    SFString(String),
    SFVec2f([f32; 2]),
    SFVec3f([f32; 3]),
    SFColor([f32; 3]),
    SFRotation([f32; 4]),
    MFString(Vec<String>),
    MFInt32(Vec<i32>),
    MFFloat(Vec<f32>),
    MFVec3f(Vec<[f32; 3]>),
    MFColor(Vec<[f32; 3]>),
}

impl FieldValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::SFBool(_) => FieldKind::SFBool,
            FieldValue::SFInt32(_) => FieldKind::SFInt32,
            FieldValue::SFFloat(_) => FieldKind::SFFloat,
            FieldValue::SFTime(_) => FieldKind::SFTime,
            FieldValue::SFString(_) => FieldKind::SFString,
            FieldValue::SFVec2f(_) => FieldKind::SFVec2f,
            FieldValue::SFVec3f(_) => FieldKind::SFVec3f,
            FieldValue::SFColor(_) => FieldKind::SFColor,
            FieldValue::SFRotation(_) => FieldKind::SFRotation,
            FieldValue::MFString(_) => FieldKind::MFString,
            FieldValue::MFInt32(_) => FieldKind::MFInt32,
            FieldValue::MFFloat(_) => FieldKind::MFFloat,
            FieldValue::MFVec3f(_) => FieldKind::MFVec3f,
            FieldValue::MFColor(_) => FieldKind::MFColor,
        }
    }

    /// Whether this value exposes a duplication operation.
    ///
    /// Clonable values are always handed out as duplicates; primitive values
    /// are copied by value.
    pub fn is_clonable(&self) -> bool {
        !matches!(
            self,
            FieldValue::SFBool(_)
                | FieldValue::SFInt32(_)
                | FieldValue::SFFloat(_)
                | FieldValue::SFTime(_)
                | FieldValue::SFString(_)
        )
    }

    /// Whether the node keeps this value by reference internally.
    ///
    /// Only by-reference values can be borrowed mutably through a field
    /// reference.
    pub fn is_by_reference(&self) -> bool {
        matches!(
            self,
            FieldValue::MFString(_)
                | FieldValue::MFInt32(_)
                | FieldValue::MFFloat(_)
                | FieldValue::MFVec3f(_)
                | FieldValue::MFColor(_)
        )
    }

    /// Returns a fresh duplicate of this value.
    ///
    /// Multi-valued duplicates never share storage with the original.
    pub fn duplicate(&self) -> FieldValue {
        self.clone()
    }

    /// Formats the value the way it would be written in an attribute.
    ///
    /// ```
    /// use canopy_core::field::FieldValue;
    ///
    /// assert_eq!(FieldValue::SFVec3f([1.0, 0.5, 0.0]).to_attribute_string(), "1 0.5 0");
    /// assert_eq!(FieldValue::SFBool(true).to_attribute_string(), "true");
    /// ```
    pub fn to_attribute_string(&self) -> String {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        }
        fn join_tuples(items: &[[f32; 3]]) -> String {
            items
                .iter()
                .map(|t| join(t))
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            FieldValue::SFBool(v) => v.to_string(),
            FieldValue::SFInt32(v) => v.to_string(),
            FieldValue::SFFloat(v) => v.to_string(),
            FieldValue::SFTime(v) => v.to_string(),
            FieldValue::SFString(v) => v.clone(),
            FieldValue::SFVec2f(v) => join(v),
            FieldValue::SFVec3f(v) | FieldValue::SFColor(v) => join(v),
            FieldValue::SFRotation(v) => join(v),
            FieldValue::MFString(v) => v
                .iter()
                .map(|s| format!("\"{s}\""))
                .collect::<Vec<_>>()
                .join(" "),
            FieldValue::MFInt32(v) => join(v),
            FieldValue::MFFloat(v) => join(v),
            FieldValue::MFVec3f(v) | FieldValue::MFColor(v) => join_tuples(v),
        }
    }

    /// Returns the strings of an `SFString` or `MFString` value.
    pub fn as_strings(&self) -> Vec<&str> {
        match self {
            FieldValue::SFString(s) => vec![s.as_str()],
            FieldValue::MFString(v) => v.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

fn number_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

fn numbers<T: FromStr>(kind: FieldKind, text: &str) -> Result<Vec<T>, FieldError> {
    number_tokens(text)
        .map(|t| {
            t.parse::<T>().map_err(|_| FieldError::InvalidValue {
                kind,
                text: text.to_string(),
            })
        })
        .collect()
}

fn fixed<const N: usize>(kind: FieldKind, text: &str) -> Result<[f32; N], FieldError> {
    let values = numbers::<f32>(kind, text)?;
    values
        .try_into()
        .map_err(|values: Vec<f32>| FieldError::Arity {
            kind,
            arity: N,
            count: values.len(),
        })
}

fn tuples<const N: usize>(kind: FieldKind, text: &str) -> Result<Vec<[f32; N]>, FieldError> {
    let values = numbers::<f32>(kind, text)?;
    if values.len() % N != 0 {
        return Err(FieldError::Arity {
            kind,
            arity: N,
            count: values.len(),
        });
    }
    Ok(values
        .chunks_exact(N)
        .map(|chunk| {
            let mut tuple = [0.0; N];
            tuple.copy_from_slice(chunk);
            tuple
        })
        .collect())
}

/// Split an MFString attribute: quoted entries, or the whole text as one
/// entry when it carries no quotes.
fn split_mf_string(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if !trimmed.contains('"') {
        return vec![trimmed.to_string()];
    }

    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = trimmed.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                entries.push(std::mem::take(&mut current));
                in_quotes = false;
            }
            '"' => in_quotes = true,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            _ if in_quotes => current.push(c),
            _ => {}
        }
    }
    entries
}

/// Ordered map of a node's fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: IndexMap<String, FieldValue>,
}

impl FieldMap {
    /// Create an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Borrow the live value of a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Borrow the live value of a field mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(name)
    }

    /// Whether the field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse `text` into the declared kind of `name` and store it.
    ///
    /// Returns `Ok(false)` when the field is not declared.
    pub fn update_from_str(&mut self, name: &str, text: &str) -> Result<bool, FieldError> {
        let Some(slot) = self.fields.get_mut(name) else {
            return Ok(false);
        };
        *slot = slot.kind().parse(text)?;
        Ok(true)
    }
}
