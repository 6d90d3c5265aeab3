//! The narrow interface every backing store implements, and the stores shipped with the crate.
//!
//! - [`MemoryStore`]: shared in-process store, used for embedding and tests
//! - [`LocalStore`]: a single JSON snapshot file, the anonymous (local-only) store
//! - `crate::db::DbConnection` (`service` feature): SQLite relational store standing in for
//!   the authenticated remote store
//!
//! Anonymous sessions persist by overwriting the whole snapshot; authenticated sessions write
//! per-node collapsed flags and granular node/edge changes.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use crate::{
    error::OrbitError,
    properties::{Edge, GraphSnapshot, Node, NodeId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which persistence path a session uses; mirrors the presence of an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    /// Local-only use. Every change folds into a whole-graph snapshot write.
    Anonymous,
    /// Remote-backed use. Changes are written per record and collapsed state is reconciled.
    Authenticated,
}

pub trait PersistenceAdapter: Sync {
    fn load_all(
        &self,
    ) -> impl std::future::Future<Output = Result<GraphSnapshot, OrbitError>> + Send;

    /// Per-node durable collapsed flags.
    ///
    /// Default implementation reads them out of [`PersistenceAdapter::load_all`], which is
    /// what snapshot-shaped stores want.
    fn load_collapsed_flags(
        &self,
    ) -> impl std::future::Future<Output = Result<BTreeMap<NodeId, bool>, OrbitError>> + Send {
        async move {
            let snapshot = self.load_all().await?;
            let collapsed = snapshot.collapsed_ids();
            Ok(snapshot
                .nodes
                .iter()
                .map(|n| (n.id.clone(), collapsed.binary_search(&n.id).is_ok()))
                .collect())
        }
    }

    /// Best-effort write of one node's collapsed flag.
    fn save_node_flag(
        &self,
        id: &NodeId,
        is_collapsed: bool,
    ) -> impl std::future::Future<Output = Result<(), OrbitError>> + Send;

    /// Whole-graph overwrite.
    fn save_snapshot(
        &self,
        snapshot: &GraphSnapshot,
    ) -> impl std::future::Future<Output = Result<(), OrbitError>> + Send;

    fn upsert_node(
        &self,
        node: &Node,
    ) -> impl std::future::Future<Output = Result<(), OrbitError>> + Send;

    fn insert_edge(
        &self,
        edge: &Edge,
    ) -> impl std::future::Future<Output = Result<(), OrbitError>> + Send;

    /// Remove the given nodes and every edge touching them.
    fn remove_nodes(
        &self,
        ids: &[NodeId],
    ) -> impl std::future::Future<Output = Result<(), OrbitError>> + Send;
}
