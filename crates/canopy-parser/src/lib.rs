//! # Canopy Parser
//!
//! Reader for Canopy scene documents: XML-encoded scene graphs with an
//! optional declaration and document type, comments, CDATA sections and the
//! predefined entities. The result is a [`canopy_core::tree::ElementTree`]
//! whose elements carry source spans for diagnostics.
//!
//! ## Usage
//!
//! ```
//! # use canopy_parser::{parse, error::ParseError};
//!
//! fn main() -> Result<(), ParseError> {
//!     let source = r#"
//!         <X3D>
//!           <Scene>
//!             <Transform DEF="T"><Shape/></Transform>
//!           </Scene>
//!         </X3D>
//!     "#;
//!
//!     let tree = parse(source)?;
//!     let root = tree.document_element().unwrap();
//!     assert_eq!(tree.element(root).unwrap().tag(), "X3D");
//!     Ok(())
//! }
//! ```

pub mod error;
mod lexer;
mod reader;
mod tokens;

pub use canopy_core::span::Span;

use log::info;

use canopy_core::tree::ElementTree;

use error::ParseError;

/// Read a document or document fragment into an element tree.
///
/// The pipeline has two steps:
///
/// 1. **Tokenize** - split the text into markup tokens, decoding entities
/// 2. **Assemble** - match tags into a tree of elements and text
///
/// # Errors
///
/// Returns a [`ParseError`] with the first markup error, or with every
/// structural error found while assembling.
pub fn parse(source: &str) -> Result<ElementTree, ParseError> {
    // Step 1: Tokenize
    let tokens = lexer::tokenize(source)?;

    // Step 2: Assemble
    let tree = reader::assemble(&tokens)?;

    info!(bytes = source.len(), nodes = tree.len(); "Document read");
    Ok(tree)
}
