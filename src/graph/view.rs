//! The visible graph: a pure function of the full store and the collapsed-set.
//!
//! Nothing here mutates state or performs I/O, so the view can be re-derived at any moment
//! (after a reconnect, after a reconciliation pass, after each step of a reveal).

use crate::{
    graph::{CollapsedSet, GraphStore},
    properties::{Edge, Node, NodeId},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Size given to every non-cluster node, and the floor for cluster sizes.
pub const BASE_NODE_SIZE: u32 = 25;
/// Cluster size grows by this much per direct child.
pub const CLUSTER_SIZE_PER_CHILD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClusterColor {
    pub background: &'static str,
    pub border: &'static str,
}

pub const CLUSTER_PALETTE: [ClusterColor; 6] = [
    ClusterColor {
        background: "#FF6B6B",
        border: "#FF5252",
    },
    ClusterColor {
        background: "#4ECDC4",
        border: "#26A69A",
    },
    ClusterColor {
        background: "#45B7D1",
        border: "#2196F3",
    },
    ClusterColor {
        background: "#96CEB4",
        border: "#66BB6A",
    },
    ClusterColor {
        background: "#FECA57",
        border: "#FF9800",
    },
    ClusterColor {
        background: "#FF9FF3",
        border: "#E91E63",
    },
];

/// Palette entry for a cluster. Stable across runs and processes: the id's UTF-16 code units
/// are folded with the 32-bit `h * 31 + c` string hash and the absolute value picks the slot.
pub fn cluster_color(id: &NodeId) -> ClusterColor {
    let hash = id.as_str().encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32)
    });
    CLUSTER_PALETTE[hash.unsigned_abs() as usize % CLUSTER_PALETTE.len()]
}

pub fn cluster_label(label: &str, direct_children: usize) -> String {
    format!("{label} (+{direct_children})")
}

pub fn cluster_size(direct_children: usize) -> u32 {
    let scaled = u32::try_from(direct_children)
        .unwrap_or(u32::MAX)
        .saturating_mul(CLUSTER_SIZE_PER_CHILD);
    scaled.max(BASE_NODE_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Ellipse,
    Box,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleNode {
    pub id: NodeId,
    /// Display label; clusters carry the `(+N)` suffix.
    pub label: String,
    pub url: Option<String>,
    pub note: Option<String>,
    pub is_parent: bool,
    pub is_root: bool,
    pub is_cluster: bool,
    pub direct_children: usize,
    pub shape: Shape,
    pub size: u32,
    pub color: Option<ClusterColor>,
}

impl VisibleNode {
    fn plain(node: &Node, direct_children: usize) -> VisibleNode {
        let shape = if node.is_root {
            Shape::Circle
        } else if node.is_parent {
            Shape::Ellipse
        } else {
            Shape::Box
        };
        VisibleNode {
            id: node.id.clone(),
            label: node.label.clone(),
            url: node.url.clone(),
            note: node.note.clone(),
            is_parent: node.is_parent,
            is_root: node.is_root,
            is_cluster: false,
            direct_children,
            shape,
            size: BASE_NODE_SIZE,
            color: None,
        }
    }

    fn cluster(node: &Node, direct_children: usize) -> VisibleNode {
        VisibleNode {
            label: cluster_label(&node.label, direct_children),
            is_cluster: true,
            shape: Shape::Circle,
            size: cluster_size(direct_children),
            color: Some(cluster_color(&node.id)),
            ..VisibleNode::plain(node, direct_children)
        }
    }
}

/// What the renderer draws. Nodes and edges are ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisibleGraph {
    pub nodes: Vec<VisibleNode>,
    pub edges: Vec<Edge>,
}

impl VisibleGraph {
    pub fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: &NodeId) -> Option<&VisibleNode> {
        self.nodes
            .binary_search_by(|n| n.id.cmp(id))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }
}

/// Hidden-ness of every node: true when some ancestor is collapsed.
///
/// Each walk climbs until it meets a collapsed parent, a node already classified, or a root;
/// every node on the walked path shares the outcome, so each node is classified once.
fn hidden_map(store: &GraphStore, collapsed: &CollapsedSet) -> BTreeMap<NodeId, bool> {
    let mut hidden: BTreeMap<NodeId, bool> = BTreeMap::new();
    for node in store.nodes() {
        if hidden.contains_key(&node.id) {
            continue;
        }
        let mut path = vec![&node.id];
        let mut on_path = BTreeSet::from([&node.id]);
        let mut current = &node.id;
        let outcome = loop {
            let Some(parent) = store.parent(current) else {
                break false;
            };
            if collapsed.contains(parent) {
                break true;
            }
            if let Some(known) = hidden.get(parent) {
                break *known;
            }
            if !on_path.insert(parent) {
                tracing::warn!("[view] cycle above {}; treating it as visible", node.id);
                break false;
            }
            path.push(parent);
            current = parent;
        };
        for id in path {
            hidden.insert(id.clone(), outcome);
        }
    }
    hidden
}

/// Whether `id` is currently drawn. Unknown ids are not visible.
pub fn is_visible(store: &GraphStore, collapsed: &CollapsedSet, id: &NodeId) -> bool {
    if !store.contains(id) {
        return false;
    }
    let mut visited = BTreeSet::from([id]);
    let mut current = id;
    while let Some(parent) = store.parent(current) {
        if collapsed.contains(parent) {
            return false;
        }
        if !visited.insert(parent) {
            return true;
        }
        current = parent;
    }
    true
}

/// Derive the visible graph.
///
/// A node is visible iff none of its ancestors is collapsed; only the outermost collapsed
/// ancestor matters, nested collapsed state below it is carried but has no effect. A visible
/// collapsed parent is drawn as a cluster. An edge is visible iff both endpoints are.
pub fn project(store: &GraphStore, collapsed: &CollapsedSet) -> VisibleGraph {
    let hidden = hidden_map(store, collapsed);
    let is_hidden = |id: &NodeId| hidden.get(id).copied().unwrap_or(false);

    let nodes = store
        .nodes()
        .filter(|node| !is_hidden(&node.id))
        .map(|node| {
            let direct_children = store.child_count(&node.id);
            if collapsed.contains(&node.id) && node.is_parent {
                VisibleNode::cluster(node, direct_children)
            } else {
                VisibleNode::plain(node, direct_children)
            }
        })
        .collect::<Vec<_>>();

    let edges = store
        .edges()
        .filter(|edge| !is_hidden(&edge.from) && !is_hidden(&edge.to))
        .cloned()
        .collect::<Vec<_>>();

    VisibleGraph { nodes, edges }
}
