//! Graph module: the full node/edge store, the collapsed-set, and the visible projection.
//!
//! # Module Organization
//!
//! - [`store`]: [`GraphStore`], the arena of nodes plus the children-by-parent and
//!   parent-by-child indexes
//! - [`collapsed`]: [`CollapsedSet`], the one piece of view state reconciled across stores
//! - [`view`]: the pure projection `(GraphStore, CollapsedSet) -> VisibleGraph`
//!
//! ```rust
//! use orbit_core::graph::{view, CollapsedSet, GraphStore};
//! use orbit_core::properties::{Edge, Node, NodeId};
//!
//! let root = Node::parent("Root").with_id("root");
//! let leaf = Node::new("Leaf").with_id("leaf");
//! let edge = Edge::new(root.id.clone(), leaf.id.clone());
//! let (store, diagnostics) = GraphStore::load(vec![root, leaf], vec![edge]);
//! assert!(diagnostics.is_empty());
//!
//! let collapsed: CollapsedSet = [NodeId::from("root")].into_iter().collect();
//! let visible = view::project(&store, &collapsed);
//! assert_eq!(visible.nodes.len(), 1);
//! assert_eq!(visible.nodes[0].label, "Root (+1)");
//! ```

pub mod collapsed;
pub mod store;
pub mod view;


pub use collapsed::CollapsedSet;
pub use store::{GraphStore, Removed};
pub use view::{project, ClusterColor, Shape, VisibleGraph, VisibleNode};
