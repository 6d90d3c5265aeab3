use crate::{
    error::OrbitError,
    persistence::PersistenceAdapter,
    properties::{Edge, GraphSnapshot, Node, NodeId},
};
use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
};

/// Whole-graph JSON file (`{nodes, edges, collapsed}`). The local-only store.
///
/// Granular writes are applied as read-modify-write of the full file, so the file on disk is
/// always one complete snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> LocalStore {
        LocalStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<GraphSnapshot, OrbitError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(GraphSnapshot::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    "[LocalStore] no snapshot at {:?}, starting empty",
                    self.path
                );
                Ok(GraphSnapshot::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write(&self, snapshot: &GraphSnapshot) -> Result<(), OrbitError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let text = serde_json::to_string_pretty(snapshot)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(
            "[LocalStore] wrote {} nodes, {} edges to {:?}",
            snapshot.nodes.len(),
            snapshot.edges.len(),
            self.path
        );
        Ok(())
    }
}

impl PersistenceAdapter for LocalStore {
    async fn load_all(&self) -> Result<GraphSnapshot, OrbitError> {
        self.read().await
    }

    async fn save_node_flag(&self, id: &NodeId, is_collapsed: bool) -> Result<(), OrbitError> {
        let mut snapshot = self.read().await?;
        let Some(node) = snapshot.nodes.iter_mut().find(|n| &n.id == id) else {
            return Err(OrbitError::NotFound(format!("node {id}")));
        };
        node.is_collapsed = is_collapsed;
        snapshot.collapsed.retain(|c| c != id);
        if is_collapsed {
            snapshot.collapsed.push(id.clone());
        }
        self.write(&snapshot).await
    }

    async fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<(), OrbitError> {
        self.write(snapshot).await
    }

    async fn upsert_node(&self, node: &Node) -> Result<(), OrbitError> {
        let mut snapshot = self.read().await?;
        match snapshot.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node.clone(),
            None => snapshot.nodes.push(node.clone()),
        }
        self.write(&snapshot).await
    }

    async fn insert_edge(&self, edge: &Edge) -> Result<(), OrbitError> {
        let mut snapshot = self.read().await?;
        snapshot.edges.retain(|e| e.id != edge.id);
        snapshot.edges.push(edge.clone());
        self.write(&snapshot).await
    }

    async fn remove_nodes(&self, ids: &[NodeId]) -> Result<(), OrbitError> {
        let mut snapshot = self.read().await?;
        let doomed: BTreeSet<&NodeId> = ids.iter().collect();
        snapshot.nodes.retain(|n| !doomed.contains(&n.id));
        snapshot
            .edges
            .retain(|e| !doomed.contains(&e.from) && !doomed.contains(&e.to));
        snapshot.collapsed.retain(|c| !doomed.contains(c));
        self.write(&snapshot).await
    }
}
