//! Canopy Core Types and Definitions
//!
//! This crate provides the foundational types shared by the Canopy reader and
//! scene builder. It includes:
//!
//! - **Identifiers**: Efficient string-interned identifiers ([`identifier::Id`])
//! - **Colors**: CSS and `r g b` color handling ([`color::Color`])
//! - **Spans**: Byte ranges into document sources ([`span::Span`])
//! - **Fields**: Typed field values and field maps ([`field`] module)
//! - **Element trees**: The external, DOM-like document tree ([`tree`] module)
//! - **Nodes**: The scene node capability trait and type registry ([`node`] module)
//! - **Catalog**: A small set of built-in node types ([`nodes`] module)

pub mod color;
pub mod field;
pub mod identifier;
pub mod node;
pub mod nodes;
pub mod span;
pub mod tree;
