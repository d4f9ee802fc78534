//! Error and diagnostic system for Canopy documents.
//!
//! Reader failures and scene-building warnings share one representation:
//! a [`Diagnostic`] with a severity, an optional [`ErrorCode`], labelled
//! source spans and help text. Reader failures are returned as a
//! [`ParseError`] holding one or more diagnostics; build warnings are
//! recorded on the document session.
//!
//! # Example
//!
//! ```
//! # use canopy_parser::error::{Diagnostic, ErrorCode};
//! # use canopy_parser::Span;
//!
//! let diag = Diagnostic::warning("no node named `Wheel` in scope")
//!     .with_code(ErrorCode::W100)
//!     .with_label(Span::new(40..58), "referenced here")
//!     .with_help("declare it with `DEF=\"Wheel\"` before use");
//!
//! assert_eq!(diag.to_string(), "warning[W100]: no node named `Wheel` in scope");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
