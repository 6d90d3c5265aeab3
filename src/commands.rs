use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    graph::VisibleGraph,
    properties::{Node, NodeId},
    reveal::RevealOutcome,
    sync::ReconcileOutcome,
};

/// Content changes to an existing node. `None` leaves a field alone; an empty `url` or `note`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEdit {
    pub label: Option<String>,
    pub url: Option<String>,
    pub note: Option<String>,
    pub is_parent: Option<bool>,
}

impl NodeEdit {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.url.is_none()
            && self.note.is_none()
            && self.is_parent.is_none()
    }
}

/// Command interface between a host (CLI, UI bridge) and a [`crate::session::Session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Current visible graph.
    View,
    Collapse(NodeId),
    Expand(NodeId),
    /// Double-click semantics.
    Toggle(NodeId),
    /// Reveal without asking for confirmation.
    Reveal(NodeId),
    AddChild {
        parent: NodeId,
        label: String,
        url: Option<String>,
        note: Option<String>,
        is_parent: bool,
    },
    AddRoot {
        label: String,
        url: Option<String>,
        note: Option<String>,
    },
    Edit(NodeId, NodeEdit),
    /// Delete a node and everything below it.
    Delete(NodeId),
    /// Every node, for an external search UI.
    SearchIndex,
    Reconcile,
    Save,
    /// Structural self-check of the graph store.
    BuiltInTest,
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Op::View => write!(f, "View"),
            Op::Collapse(id) => write!(f, "Collapse({id})"),
            Op::Expand(id) => write!(f, "Expand({id})"),
            Op::Toggle(id) => write!(f, "Toggle({id})"),
            Op::Reveal(id) => write!(f, "Reveal({id})"),
            Op::AddChild { parent, label, .. } => write!(f, "AddChild({parent}, {label:?})"),
            Op::AddRoot { label, .. } => write!(f, "AddRoot({label:?})"),
            Op::Edit(id, _) => write!(f, "Edit({id})"),
            Op::Delete(id) => write!(f, "Delete({id})"),
            Op::SearchIndex => write!(f, "SearchIndex"),
            Op::Reconcile => write!(f, "Reconcile"),
            Op::Save => write!(f, "Save"),
            Op::BuiltInTest => write!(f, "BuiltInTest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OpResult {
    Ok,
    View(VisibleGraph),
    /// Ids newly collapsed, in application order.
    Collapsed(Vec<NodeId>),
    Changed(bool),
    Reveal(RevealOutcome),
    Created(NodeId),
    Removed(Vec<NodeId>),
    Nodes(Vec<Node>),
    Reconcile(ReconcileOutcome),
    Diagnostics(Vec<String>),
}

impl Display for OpResult {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            OpResult::Ok => write!(f, "Ok"),
            OpResult::View(view) => write!(
                f,
                "View({} nodes, {} edges)",
                view.nodes.len(),
                view.edges.len()
            ),
            OpResult::Collapsed(ids) => write!(
                f,
                "Collapsed({})",
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            OpResult::Changed(changed) => write!(f, "Changed({changed})"),
            OpResult::Reveal(RevealOutcome::Revealed {
                target,
                expanded_ancestors,
            }) => write!(
                f,
                "Revealed({target}, expanded {})",
                expanded_ancestors.len()
            ),
            OpResult::Reveal(RevealOutcome::NotRevealed { reason, .. }) => {
                write!(f, "NotRevealed({reason})")
            }
            OpResult::Created(id) => write!(f, "Created({id})"),
            OpResult::Removed(ids) => write!(f, "Removed({} nodes)", ids.len()),
            OpResult::Nodes(nodes) => write!(f, "Nodes({})", nodes.len()),
            OpResult::Reconcile(outcome) => write!(f, "Reconcile({outcome:?})"),
            OpResult::Diagnostics(errors) => write!(f, "Diagnostics({})", errors.len()),
        }
    }
}
