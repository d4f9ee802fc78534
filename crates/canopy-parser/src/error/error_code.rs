//! Error codes for the Canopy diagnostic system.
//!
//! Codes are organized by phase:
//! - `E0xx` - Markup errors found while scanning
//! - `E1xx` - Structure errors found while assembling the element tree
//! - `W1xx` - Warnings recovered while building the scene

use std::fmt;

/// Codes for categorizing diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Markup Errors (E0xx)
    // =========================================================================
    /// Unterminated construct.
    ///
    /// A tag, comment, CDATA section or processing instruction was opened
    /// but the input ended before it was closed.
    E001,

    /// Unexpected character.
    ///
    /// A character was encountered that is not valid in this context.
    E002,

    /// Unterminated attribute value.
    ///
    /// An attribute value was opened with a quote but never closed.
    E003,

    /// Unknown entity.
    ///
    /// An `&name;` reference is neither one of the five predefined entities
    /// nor a valid numeric character reference.
    E004,

    // =========================================================================
    // Structure Errors (E1xx)
    // =========================================================================
    /// Mismatched closing tag.
    ///
    /// A closing tag does not match the innermost open element.
    E100,

    /// Unclosed element.
    ///
    /// The input ended while an element was still open.
    E101,

    /// Missing root element.
    ///
    /// The document contains no element at all.
    E102,

    /// Duplicate attribute.
    ///
    /// The same attribute name appears twice on one element.
    E103,

    // =========================================================================
    // Build Warnings (W1xx)
    // =========================================================================
    /// Unresolved reference.
    ///
    /// A `USE` names a node that is not registered in any searched namespace.
    W100,

    /// Unrecognized element.
    ///
    /// The tag is neither a registered node type nor an auxiliary tag.
    W101,

    /// Re-entrant build.
    ///
    /// The element already has a live node and was built again.
    W102,

    /// Missing connect link.
    ///
    /// An `IS` element has no `connect` child.
    W103,

    /// Pending route.
    ///
    /// A `ROUTE` could not resolve both endpoints and is waiting.
    W104,

    /// Unknown template.
    ///
    /// A `ProtoInstance` names a template that is not declared in scope.
    W105,

    /// Template load failure.
    ///
    /// An external template could not be fetched or did not contain the
    /// requested declaration.
    W106,

    /// Invalid highlight color.
    ///
    /// The color passed to the highlight operation could not be parsed.
    W107,

    /// Too many pending loads.
    ///
    /// The external template load queue is full.
    W108,
}

impl ErrorCode {
    /// Returns the code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Markup errors
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            // Structure errors
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            // Build warnings
            ErrorCode::W100 => "W100",
            ErrorCode::W101 => "W101",
            ErrorCode::W102 => "W102",
            ErrorCode::W103 => "W103",
            ErrorCode::W104 => "W104",
            ErrorCode::W105 => "W105",
            ErrorCode::W106 => "W106",
            ErrorCode::W107 => "W107",
            ErrorCode::W108 => "W108",
        }
    }

    /// Returns a short description of what this code means.
    pub fn description(&self) -> &'static str {
        match self {
            // Markup errors
            ErrorCode::E001 => "unterminated construct",
            ErrorCode::E002 => "unexpected character",
            ErrorCode::E003 => "unterminated attribute value",
            ErrorCode::E004 => "unknown entity",
            // Structure errors
            ErrorCode::E100 => "mismatched closing tag",
            ErrorCode::E101 => "unclosed element",
            ErrorCode::E102 => "missing root element",
            ErrorCode::E103 => "duplicate attribute",
            // Build warnings
            ErrorCode::W100 => "unresolved reference",
            ErrorCode::W101 => "unrecognized element",
            ErrorCode::W102 => "re-entrant build",
            ErrorCode::W103 => "missing connect link",
            ErrorCode::W104 => "pending route",
            ErrorCode::W105 => "unknown template",
            ErrorCode::W106 => "template load failure",
            ErrorCode::W107 => "invalid highlight color",
            ErrorCode::W108 => "too many pending loads",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
