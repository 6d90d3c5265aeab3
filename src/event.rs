use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{graph::VisibleGraph, properties::NodeId};

/// Indicates where a collapse/expand originated, which decides its side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventOrigin {
    /// A gesture from this session's user. Persisted through the store and recorded as the
    /// latest local change, which holds off reconciliation for the debounce window.
    #[default]
    Local,

    /// State replayed from a store (load-time restore, reconciliation against the remote
    /// store). Applied in memory only: the store already holds it.
    Remote,
}

/// Notifications for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GraphEvent {
    /// The visible node/edge set changed and should be redrawn.
    VisibleGraphChanged(VisibleGraph),
    /// Center on and select this node.
    Focus(NodeId),
}

impl Display for GraphEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GraphEvent::VisibleGraphChanged(view) => write!(
                f,
                "VisibleGraphChanged({} nodes, {} edges)",
                view.nodes.len(),
                view.edges.len()
            ),
            GraphEvent::Focus(id) => write!(f, "Focus({id})"),
        }
    }
}

/// Gestures the renderer reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    NodeSelected(NodeId),
    NodeDeselected,
    /// On a parent this toggles collapse; on a leaf the renderer handles it (opening the url).
    NodeDoubleClicked(NodeId),
}

impl Display for UserEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            UserEvent::NodeSelected(id) => write!(f, "NodeSelected({id})"),
            UserEvent::NodeDeselected => write!(f, "NodeDeselected"),
            UserEvent::NodeDoubleClicked(id) => write!(f, "NodeDoubleClicked({id})"),
        }
    }
}
