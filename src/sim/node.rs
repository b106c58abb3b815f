//! Simulation nodes
//!
//! A node is a named slot in the tree with a handler table and optional local
//! state. It owns no clock or queue: those belong to the kernel of the tree's
//! root, which every node reaches through its id.

use super::context::Ctx;
use super::error::SimError;
use super::event::Event;
use super::id::NodeId;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Event handler. Runs with the target node's state in scope.
pub type Handler = Box<dyn FnMut(&mut Ctx<'_>, Event) -> Result<(), SimError>>;

pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// `None` while the handler is running.
    pub(crate) handlers: HashMap<&'static str, Option<Handler>>,
    pub(crate) state: Option<Box<dyn Any>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            children: Vec::new(),
            handlers: HashMap::new(),
            state: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&&str> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("handlers", &kinds)
            .field("has_state", &self.state.is_some())
            .finish()
    }
}
