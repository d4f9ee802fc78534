//! Event listeners on elements and their mirrors on scene nodes.
//!
//! Listeners are registered on elements. Once an element has been bridged by
//! the builder, every add and remove is mirrored on the registry of the node
//! the element is linked to, so the node can enumerate and replay them.

use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use canopy_core::{node::NodeId, tree::ElementId};

/// Handle returned when a listener is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// What a listener is called with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: String,
    pub element: Option<ElementId>,
    pub node: Option<NodeId>,
}

/// A listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Listeners grouped by event type, in registration order.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    by_type: IndexMap<String, Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event_type: &str, id: ListenerId, listener: Listener) {
        self.by_type
            .entry(event_type.to_string())
            .or_default()
            .push((id, listener));
    }

    /// Remove every registration of `id` for `event_type`.
    pub fn remove(&mut self, event_type: &str, id: ListenerId) -> bool {
        let Some(list) = self.by_type.get_mut(event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    /// Ids registered for `event_type`.
    pub fn ids(&self, event_type: &str) -> Vec<ListenerId> {
        self.by_type
            .get(event_type)
            .map(|list| list.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }

    /// Callbacks registered for `event_type`.
    pub fn callbacks(&self, event_type: &str) -> Vec<Listener> {
        self.by_type
            .get(event_type)
            .map(|list| list.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Every registration as `(event type, id, callback)`.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, ListenerId, &Listener)> {
        self.by_type.iter().flat_map(|(event_type, list)| {
            list.iter()
                .map(move |(id, listener)| (event_type.as_str(), *id, listener))
        })
    }

    /// Event types with at least one listener.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.by_type
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(event_type, _)| event_type.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.by_type.iter().map(|(event_type, list)| {
            let ids: Vec<_> = list.iter().map(|(id, _)| *id).collect();
            (event_type, ids)
        });
        f.debug_map().entries(entries).finish()
    }
}
