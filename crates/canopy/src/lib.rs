//! Canopy - a namespace-scoped scene graph builder.
//!
//! Reads X3D-style scene documents and builds a live scene graph from them:
//! `DEF`/`USE` names resolve through nested namespaces, `ROUTE`s wire
//! dataflow edges between node fields (or wait until their endpoints exist),
//! and templates (`ProtoDeclare`, `ExternProtoDeclare`) expand into fresh
//! namespaces, possibly after their bodies were loaded from elsewhere.

pub mod config;
pub mod events;
pub mod loader;
pub mod namespace;
pub mod scene;
pub mod template;

mod builder;
mod document;
mod error;
mod field_access;
mod summary;

pub use canopy_core::{color, field, identifier, node, nodes, span, tree};
pub use canopy_parser::error::{Diagnostic, ErrorCode, Severity};

pub use document::Document;
pub use error::CanopyError;
pub use summary::Summary;

use log::{debug, info};

use canopy_core::node::{NodeFactory, NodeTypeRegistry};

use config::AppConfig;

/// Builder for loading scene documents.
///
/// Holds the configuration and the node type registry shared by every
/// document it loads. The built-in node catalog is registered up front.
///
/// # Examples
///
/// ```rust
/// use canopy::{SceneBuilder, config::AppConfig};
///
/// let source = r#"
///     <X3D><Scene>
///       <Transform DEF="T"><Shape><Box/></Shape></Transform>
///       <Transform USE="T"/>
///     </Scene></X3D>
/// "#;
///
/// let builder = SceneBuilder::new(AppConfig::default());
/// let document = builder.load(source, "scenes/demo.x3d")
///     .expect("Failed to load");
///
/// assert!(document.named_node("T").is_some());
/// assert!(document.warnings().is_empty());
/// ```
#[derive(Debug)]
pub struct SceneBuilder {
    config: AppConfig,
    registry: NodeTypeRegistry,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl SceneBuilder {
    /// Create a scene builder with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration with build and loader settings
    pub fn new(config: AppConfig) -> Self {
        let mut registry = NodeTypeRegistry::new();
        nodes::register_builtins(&mut registry);
        Self { config, registry }
    }

    /// Register (or replace) a node type.
    ///
    /// Type names are matched ignoring ASCII case.
    pub fn register_type(&mut self, name: &str, factory: NodeFactory) {
        debug!(name; "Registering node type");
        self.registry.register(name, factory);
    }

    /// The node types known to this builder.
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Read a document and build its scene.
    ///
    /// `url` is where the document came from; relative template URLs resolve
    /// against it. Problems with individual elements do not fail the load;
    /// they are collected in [`Document::warnings`].
    ///
    /// # Arguments
    ///
    /// * `source` - Document text
    /// * `url` - Location of the document, may be empty
    ///
    /// # Errors
    ///
    /// Returns `CanopyError::Parse` when the document does not read.
    pub fn load(&self, source: &str, url: &str) -> Result<Document, CanopyError> {
        info!(url; "Loading scene document");

        let tree = canopy_parser::parse(source)
            .map_err(|err| CanopyError::new_parse_error(err, source))?;

        let mut document = Document::new(tree, url, self.registry.clone(), self.config.clone());
        document.build();

        info!(
            nodes = document.graph().node_count(),
            warnings = document.warnings().len(),
            pending_loads = document.load_requests().len();
            "Scene built"
        );
        Ok(document)
    }
}
