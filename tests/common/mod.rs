//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use orbit_core::properties::{Edge, GraphSnapshot, Node, NodeId};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

/// A small topic tree:
///
/// ```text
/// Root
/// ├── Rust (parent)
/// │   ├── Ownership
/// │   └── Async (parent)
/// │       └── Tokio
/// └── Notes
/// ```
#[allow(dead_code)]
pub fn topic_tree() -> GraphSnapshot {
    let mut root = Node::parent("Root").with_id("root");
    root.is_root = true;
    let nodes = vec![
        root,
        Node::parent("Rust").with_id("rust"),
        Node::new("Ownership")
            .with_id("ownership")
            .with_url("https://doc.rust-lang.org/book/ch04-00-understanding-ownership.html"),
        Node::parent("Async").with_id("async"),
        Node::new("Tokio").with_id("tokio").with_note("runtime"),
        Node::new("Notes").with_id("notes"),
    ];
    let edge = |from: &str, to: &str| Edge {
        id: format!("{from}-{to}").into(),
        from: id(from),
        to: id(to),
    };
    GraphSnapshot {
        nodes,
        edges: vec![
            edge("root", "rust"),
            edge("rust", "ownership"),
            edge("rust", "async"),
            edge("async", "tokio"),
            edge("root", "notes"),
        ],
        collapsed: Vec::new(),
    }
}
