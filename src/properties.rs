//! Node and edge records, their identifiers, and the whole-graph snapshot format.
//!
//! These are the durable shapes every [`crate::persistence::PersistenceAdapter`] loads and
//! stores. Rendering hints (shape, size, cluster color) are not stored here; they are derived
//! by [`crate::graph::view`].

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Identifiers arrive either as strings (remote rows, UUIDs) or as integers (older local
/// snapshots keyed by creation timestamp). Both collapse into the same textual form.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> String {
        match raw {
            RawId::Int(i) => i.to_string(),
            RawId::Text(s) => s,
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
        #[serde(from = "RawId", into = "String")]
        pub struct $name(String);

        impl $name {
            /// A fresh random (v4 UUID) identifier.
            pub fn generate() -> Self {
                $name(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<RawId> for $name {
            fn from(raw: RawId) -> Self {
                $name(raw.into())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<i64> for $name {
            fn from(i: i64) -> Self {
                $name(i.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Stable node identifier, identical across local and remote round-trips.
    NodeId
);

string_id!(
    /// Edge identifier. Snapshots that predate edge ids get one generated on load.
    EdgeId
);

/// Older snapshots store absent urls and notes as empty strings.
fn empty_as_none<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(de)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub label: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<String>,
    /// Only parents may own a collapsed subtree.
    #[serde(default, alias = "is_parent")]
    pub is_parent: bool,
    /// Maintained by [`crate::graph::GraphStore`]: true iff the node has no incoming edge.
    #[serde(default, alias = "is_root")]
    pub is_root: bool,
    /// Durable projection of [`crate::graph::CollapsedSet`] membership.
    #[serde(default, alias = "is_collapsed")]
    pub is_collapsed: bool,
}

impl Node {
    /// A leaf node with a freshly generated id.
    pub fn new<L: Into<String>>(label: L) -> Node {
        Node {
            id: NodeId::generate(),
            label: label.into(),
            url: None,
            note: None,
            is_parent: false,
            is_root: false,
            is_collapsed: false,
        }
    }

    /// A node that may own children.
    pub fn parent<L: Into<String>>(label: L) -> Node {
        Node {
            is_parent: true,
            ..Node::new(label)
        }
    }

    pub fn with_id<I: Into<NodeId>>(mut self, id: I) -> Node {
        self.id = id.into();
        self
    }

    pub fn with_url<U: Into<String>>(mut self, url: U) -> Node {
        self.url = Some(url.into()).filter(|u: &String| !u.trim().is_empty());
        self
    }

    pub fn with_note<N: Into<String>>(mut self, note: N) -> Node {
        self.note = Some(note.into()).filter(|n: &String| !n.trim().is_empty());
        self
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.label, self.id)
    }
}

/// Directed parent -> child link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default = "EdgeId::generate")]
    pub id: EdgeId,
    #[serde(alias = "from_node", alias = "from_node_id")]
    pub from: NodeId,
    #[serde(alias = "to_node", alias = "to_node_id")]
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId) -> Edge {
        Edge {
            id: EdgeId::generate(),
            from,
            to,
        }
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-->{}", self.from, self.to)
    }
}

/// Whole-graph payload: the local store's on-disk format and the overwrite unit for
/// anonymous sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub collapsed: Vec<NodeId>,
}

impl GraphSnapshot {
    /// The graph a brand new user starts from: one root parent.
    pub fn starter(label: &str, note: &str) -> GraphSnapshot {
        let mut root = Node::parent(label).with_note(note);
        root.is_root = true;
        GraphSnapshot {
            nodes: vec![root],
            edges: Vec::new(),
            collapsed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every id the snapshot marks as collapsed, whether through the `collapsed` list or the
    /// per-node flag.
    pub fn collapsed_ids(&self) -> Vec<NodeId> {
        let mut ids = self.collapsed.clone();
        ids.extend(
            self.nodes
                .iter()
                .filter(|n| n.is_collapsed)
                .map(|n| n.id.clone()),
        );
        ids.sort();
        ids.dedup();
        ids
    }
}
