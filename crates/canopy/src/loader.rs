//! Loading external template bodies.
//!
//! Instantiating an external template whose body is not known yet queues a
//! [`LoadRequest`]. The host fetches one of the request's URLs however it
//! likes and reports back with [`Document::complete_load`] or
//! [`Document::fail_load`]; [`Document::run_loads`] does both in one go with a
//! [`Fetcher`]. Completing a load builds every instance that waited for it
//! and retries the waiting routes of their namespaces.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, info, warn};

use canopy_core::{
    node::{NamespaceId, NodeId},
    tree::{ElementId, ElementTree},
};
use canopy_parser::error::ErrorCode;

use crate::{
    builder::TreeBuilder,
    document::Document,
    error::CanopyError,
    namespace::base_of,
    template::{TemplateRef, TemplateState, read_declaration},
};

/// Handle of a queued load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(u64);

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load{}", self.0)
    }
}

/// What the host is asked to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub id: LoadId,
    /// Candidate URLs in preference order; `file#Name` picks a declaration.
    pub urls: Vec<String>,
    /// Name of the template being loaded.
    pub template: String,
}

/// An instance waiting for its template body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitingInstance {
    pub(crate) element: ElementId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) namespace: NamespaceId,
    pub(crate) direct: bool,
}

#[derive(Debug)]
pub(crate) struct PendingLoad {
    request: LoadRequest,
    template: TemplateRef,
    waiting: Vec<WaitingInstance>,
}

/// Loads requested and not yet completed, oldest first.
#[derive(Debug, Default)]
pub(crate) struct LoadQueue {
    next_id: u64,
    pending: IndexMap<LoadId, PendingLoad>,
}

impl LoadQueue {
    fn take(&mut self, id: LoadId) -> Option<PendingLoad> {
        self.pending.shift_remove(&id)
    }
}

/// Fetches documents by URL.
pub trait Fetcher {
    /// Return the text at `url` (without any `#` fragment).
    fn fetch(&self, url: &str) -> Result<String, CanopyError>;
}

/// Fetches from the local file system.
///
/// `file://` URLs and plain paths are supported. Relative paths are tried as
/// given and then under each search directory.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    search_paths: Vec<PathBuf>,
}

impl FileFetcher {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<String, CanopyError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        if path.contains("://") {
            return Err(CanopyError::Load(format!("`{url}` is not a file URL")));
        }

        let path = Path::new(path);
        let candidates = std::iter::once(path.to_path_buf()).chain(
            self.search_paths
                .iter()
                .filter(|_| path.is_relative())
                .map(|dir| dir.join(path)),
        );
        for candidate in candidates {
            if candidate.is_file() {
                debug!(url, path:? = candidate; "Reading template document");
                return Ok(fs::read_to_string(&candidate)?);
            }
        }
        Err(CanopyError::Load(format!("`{url}` not found")))
    }
}

/// Split `file#Name` into the fetchable part and the declaration name.
fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((file, name)) if !name.is_empty() => (file, Some(name)),
        Some((file, _)) => (file, None),
        None => (url, None),
    }
}

/// The first `ProtoDeclare` named `name` anywhere in `tree`.
fn find_declaration(tree: &ElementTree, name: &str) -> Option<ElementId> {
    tree.roots()
        .iter()
        .flat_map(|root| tree.descendants(*root))
        .find(|id| {
            tree.element(*id).is_some_and(|el| {
                el.is_tag("ProtoDeclare") && el.attribute("name") == Some(name)
            })
        })
}

impl Document {
    /// Loads waiting to be fetched, oldest first.
    pub fn load_requests(&self) -> Vec<LoadRequest> {
        self.loads
            .pending
            .values()
            .map(|load| load.request.clone())
            .collect()
    }

    /// Queue `instance` behind the load of `template`, requesting the load
    /// when it is not running yet.
    pub(crate) fn enqueue_instance(&mut self, template: TemplateRef, instance: WaitingInstance) {
        if let TemplateState::Loading(id) = self.template(template).state() {
            if let Some(load) = self.loads.pending.get_mut(&id) {
                if !load.waiting.iter().any(|w| w.element == instance.element) {
                    load.waiting.push(instance);
                }
                return;
            }
        }

        let max = self.config.loader().max_pending_loads();
        let name = self.template(template).name().to_string();
        if self.loads.pending.len() >= max {
            self.warn(
                instance.element,
                ErrorCode::W108,
                format!("cannot load template `{name}`: {max} loads already pending"),
            );
            return;
        }

        self.loads.next_id += 1;
        let id = LoadId(self.loads.next_id);
        let request = LoadRequest {
            id,
            urls: self.template(template).urls().to_vec(),
            template: name,
        };
        info!(
            load:% = id,
            template = request.template.as_str(),
            urls:? = request.urls;
            "Template load requested"
        );
        self.loads.pending.insert(
            id,
            PendingLoad {
                request,
                template,
                waiting: vec![instance],
            },
        );
        self.template_mut(template)
            .set_state(TemplateState::Loading(id));
    }

    /// Finish a load with the text fetched from `url`.
    ///
    /// The declaration named by the URL fragment (or named like the template)
    /// becomes the template body. Every waiting instance is built and
    /// attached, and the waiting routes of their namespaces are retried.
    /// Returns the instance nodes.
    ///
    /// # Errors
    ///
    /// Fails for an unknown `id`, for text that does not read, and when the
    /// text declares no matching template. The template is marked failed in
    /// the last two cases.
    pub fn complete_load(
        &mut self,
        id: LoadId,
        url: &str,
        source: &str,
    ) -> Result<Vec<NodeId>, CanopyError> {
        let load = self
            .loads
            .take(id)
            .ok_or_else(|| CanopyError::Load(format!("no pending load {id}")))?;

        let fetched = match canopy_parser::parse(source) {
            Ok(tree) => tree,
            Err(err) => {
                self.abandon_load(&load, &format!("`{url}` does not read"));
                return Err(CanopyError::new_parse_error(err, source));
            }
        };

        let (file, fragment) = split_fragment(url);
        let wanted = fragment.unwrap_or(load.request.template.as_str());
        let Some(found) = find_declaration(&fetched, wanted) else {
            let reason = format!("`{file}` declares no template `{wanted}`");
            self.abandon_load(&load, &reason);
            return Err(CanopyError::Load(reason));
        };

        let declaring = self.template(load.template).element();
        let imported = self.tree.import_subtree(&fetched, found, Some(declaring));
        let (body, interface) = read_declaration(&self.tree, imported);
        self.template_mut(load.template)
            .load_body(body, interface, base_of(file));

        let mut nodes = Vec::new();
        let mut namespaces: Vec<NamespaceId> = Vec::new();
        for waiting in &load.waiting {
            let built = TreeBuilder::new(self, waiting.namespace).expand(
                load.template,
                waiting.element,
                waiting.direct,
            );
            if let Some(node) = built {
                if let Some(parent) = waiting.parent {
                    self.attach_child(parent, node, waiting.element);
                }
                nodes.push(node);
            }
            if !namespaces.contains(&waiting.namespace) {
                namespaces.push(waiting.namespace);
            }
        }
        for namespace in namespaces {
            self.resolve_pending_routes(namespace);
        }
        self.needs_redraw = true;

        info!(load:% = id, url, instances = nodes.len(); "Template load completed");
        Ok(nodes)
    }

    /// Give up on a load. Nothing is registered for its instances.
    ///
    /// Returns `false` for an unknown `id`.
    pub fn fail_load(&mut self, id: LoadId, reason: &str) -> bool {
        match self.loads.take(id) {
            Some(load) => {
                self.abandon_load(&load, reason);
                true
            }
            None => false,
        }
    }

    fn abandon_load(&mut self, load: &PendingLoad, reason: &str) {
        self.template_mut(load.template)
            .set_state(TemplateState::Failed);
        let declaring = self.template(load.template).element();
        self.warn(
            declaring,
            ErrorCode::W106,
            format!(
                "template `{}` failed to load: {reason}",
                load.request.template
            ),
        );
        for waiting in &load.waiting {
            debug!(element:% = waiting.element; "Instance left unbuilt");
        }
    }

    /// Fetch and complete every queued load, including loads queued by
    /// the templates loaded on the way.
    ///
    /// Each request's URLs are tried in order. Returns how many loads
    /// completed.
    pub fn run_loads(&mut self, fetcher: &dyn Fetcher) -> usize {
        let mut completed = 0;
        while let Some(request) = self.load_requests().into_iter().next() {
            let mut failures = Vec::new();
            let mut fetched = None;
            for url in &request.urls {
                match fetcher.fetch(split_fragment(url).0) {
                    Ok(source) => {
                        fetched = Some((url.clone(), source));
                        break;
                    }
                    Err(err) => failures.push(format!("{url}: {err}")),
                }
            }

            match fetched {
                Some((url, source)) => match self.complete_load(request.id, &url, &source) {
                    Ok(_) => completed += 1,
                    Err(err) => warn!(load:% = request.id, err:%; "Template load failed"),
                },
                None if failures.is_empty() => {
                    self.fail_load(request.id, "no URL given");
                }
                None => {
                    self.fail_load(request.id, &failures.join("; "));
                }
            }
        }
        completed
    }
}
