//! Collapse/expand over the graph store, and the persistence side effects that go with them.
//!
//! [`ClusterEngine`] is the only writer of the [`CollapsedSet`]. Every mutation carries an
//! [`EventOrigin`]: local gestures are written through the [`PersistenceAdapter`] and recorded as
//! the latest local change, remote-originated replays are applied in memory only.

use crate::{
    error::OrbitError,
    event::EventOrigin,
    graph::{project, view::is_visible, CollapsedSet, GraphStore, VisibleGraph},
    persistence::{PersistenceAdapter, SessionMode},
    properties::{Edge, GraphSnapshot, Node, NodeId},
};
use petgraph::{algo::toposort, graphmap::DiGraphMap};
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Instant,
};

/// A graph edit an authenticated store has not acknowledged yet. Node writes are replayed from
/// the node's current state, so later edits of the same node fold into one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRecord {
    Node(NodeId),
    Edge(Edge),
    Removal(Vec<NodeId>),
}

#[derive(Debug)]
pub struct ClusterEngine<S> {
    store: S,
    mode: SessionMode,
    graph: GraphStore,
    collapsed: CollapsedSet,
    /// Members collapsed only because an ancestor's collapse reached them, mapped to that
    /// ancestor. A local expand of the ancestor expands them again.
    pulled_in: BTreeMap<NodeId, NodeId>,
    /// Flag writes that failed, keyed by node, holding the value still owed to the store.
    pending_flags: BTreeMap<NodeId, bool>,
    /// Record writes that failed, in the order they were issued.
    pending_records: Vec<PendingRecord>,
    /// Anonymous sessions only: the last snapshot write failed.
    dirty: bool,
    last_local_change: Option<Instant>,
}

impl<S: PersistenceAdapter> ClusterEngine<S> {
    /// An engine over an already built store with nothing collapsed.
    pub fn new(store: S, mode: SessionMode, graph: GraphStore) -> ClusterEngine<S> {
        ClusterEngine {
            store,
            mode,
            graph,
            collapsed: CollapsedSet::new(),
            pulled_in: BTreeMap::new(),
            pending_flags: BTreeMap::new(),
            pending_records: Vec::new(),
            dirty: false,
            last_local_change: None,
        }
    }

    /// Build the graph from `snapshot` and replay its collapsed state.
    ///
    /// Authenticated sessions take the collapsed flags from
    /// [`PersistenceAdapter::load_collapsed_flags`], falling back to the snapshot's own flags
    /// if that call fails. Returns the load diagnostics of [`GraphStore::load`].
    #[tracing::instrument(skip_all, fields(mode = ?mode))]
    pub async fn from_snapshot(
        store: S,
        mode: SessionMode,
        snapshot: GraphSnapshot,
    ) -> Result<(ClusterEngine<S>, Vec<OrbitError>), OrbitError> {
        let mut collapsed_ids = snapshot.collapsed_ids();
        let (graph, diagnostics) = GraphStore::load(snapshot.nodes, snapshot.edges);
        let mut engine = ClusterEngine::new(store, mode, graph);

        if mode == SessionMode::Authenticated {
            match engine.store.load_collapsed_flags().await {
                Ok(flags) => {
                    collapsed_ids = flags
                        .into_iter()
                        .filter_map(|(id, is_collapsed)| is_collapsed.then_some(id))
                        .collect();
                }
                Err(e) => tracing::warn!(
                    "[ClusterEngine] could not load collapsed flags, using snapshot state: {e}"
                ),
            }
        }

        let restored = engine.restore(&collapsed_ids).await?;
        tracing::info!(
            "[ClusterEngine] loaded {} nodes, {} edges, {} collapsed",
            engine.graph.len(),
            engine.graph.edges().count(),
            restored.len()
        );
        Ok((engine, diagnostics))
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut GraphStore {
        &mut self.graph
    }

    pub fn collapsed(&self) -> &CollapsedSet {
        &self.collapsed
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn view(&self) -> VisibleGraph {
        project(&self.graph, &self.collapsed)
    }

    pub fn is_visible(&self, id: &NodeId) -> bool {
        is_visible(&self.graph, &self.collapsed, id)
    }

    pub fn is_collapsed(&self, id: &NodeId) -> bool {
        self.collapsed.contains(id)
    }

    pub fn last_local_change(&self) -> Option<Instant> {
        self.last_local_change
    }

    pub fn pending_flags(&self) -> &BTreeMap<NodeId, bool> {
        &self.pending_flags
    }

    pub fn pending_records(&self) -> &[PendingRecord] {
        &self.pending_records
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a local edit for the reconciler's debounce window.
    pub(crate) fn touch_local(&mut self) {
        self.last_local_change = Some(Instant::now());
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.snapshot(&self.collapsed)
    }

    /// Collapse `id` and every un-collapsed parent below it, deepest first.
    ///
    /// A no-op (empty result) unless `id` is a known, un-collapsed parent with at least one
    /// child. Returns the ids newly collapsed, in the order they were applied.
    #[tracing::instrument(skip(self))]
    pub async fn collapse(
        &mut self,
        id: &NodeId,
        origin: EventOrigin,
    ) -> Result<Vec<NodeId>, OrbitError> {
        let Some(node) = self.graph.get(id) else {
            tracing::debug!("[collapse] unknown node {id}");
            return Ok(Vec::new());
        };
        if !node.is_parent || self.collapsed.contains(id) || self.graph.child_count(id) == 0 {
            return Ok(Vec::new());
        }

        let descendants = self.graph.descendants(id)?;
        let mut applied = Vec::new();
        for descendant in descendants.iter().rev() {
            let collapsible = self.graph.get(descendant).is_some_and(|n| n.is_parent)
                && !self.collapsed.contains(descendant)
                && self.graph.child_count(descendant) > 0;
            if collapsible {
                applied.push(descendant.clone());
            }
        }
        applied.push(id.clone());

        for cid in applied.iter() {
            self.collapsed.insert(cid.clone());
            self.graph.set_collapsed_flag(cid, true);
            if cid != id {
                self.pulled_in.insert(cid.clone(), id.clone());
            }
        }
        tracing::debug!("[collapse] {id} ({origin:?}) collapsed {} nodes", applied.len());

        if origin == EventOrigin::Local {
            self.touch_local();
            let changes = applied.iter().map(|cid| (cid.clone(), true)).collect::<Vec<_>>();
            self.persist_flags(&changes).await;
        }
        Ok(applied)
    }

    /// Shallow expand: `id` leaves the collapsed-set and children keep their own state.
    ///
    /// A local expand also reverts the members that collapsing `id` pulled in, so a collapse
    /// followed by an expand restores the earlier view; parents that were collapsed on their
    /// own beforehand stay collapsed. Remote expands mirror the remote flags exactly and only
    /// drop the pulled-in bookkeeping.
    #[tracing::instrument(skip(self))]
    pub async fn expand(&mut self, id: &NodeId, origin: EventOrigin) -> Result<bool, OrbitError> {
        if !self.collapsed.remove(id) {
            return Ok(false);
        }
        self.graph.set_collapsed_flag(id, false);
        self.pulled_in.remove(id);
        let dependents = self
            .pulled_in
            .iter()
            .filter(|(_, by)| *by == id)
            .map(|(member, _)| member.clone())
            .collect::<Vec<_>>();
        self.pulled_in.retain(|_, by| by != id);

        let mut changes = vec![(id.clone(), false)];
        if origin == EventOrigin::Local {
            for member in dependents {
                if self.collapsed.remove(&member) {
                    self.graph.set_collapsed_flag(&member, false);
                    changes.push((member, false));
                }
            }
        }
        tracing::debug!("[expand] {id} ({origin:?}) expanded {} nodes", changes.len());

        if origin == EventOrigin::Local {
            self.touch_local();
            self.persist_flags(&changes).await;
        }
        Ok(true)
    }

    /// Double-click semantics. Returns whether anything changed; leaves are ignored.
    pub async fn toggle(&mut self, id: &NodeId, origin: EventOrigin) -> Result<bool, OrbitError> {
        if self.collapsed.contains(id) {
            return self.expand(id, origin).await;
        }
        match self.graph.get(id) {
            Some(node) if node.is_parent => Ok(!self.collapse(id, origin).await?.is_empty()),
            _ => Ok(false),
        }
    }

    /// Order `ids` so that every id comes after all of its descendants in the list.
    ///
    /// Each id is linked to its nearest ancestor that is also in the list, then the links are
    /// topologically sorted. Unknown ids are dropped.
    pub fn bottom_up_order(&self, ids: &[NodeId]) -> Result<Vec<NodeId>, OrbitError> {
        let members: BTreeSet<&NodeId> = ids.iter().filter(|i| self.graph.contains(i)).collect();
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for id in members.iter() {
            graph.add_node(id.as_str());
        }
        for id in members.iter() {
            let ancestors = self.graph.ancestors(id)?;
            if let Some(nearest) = ancestors.iter().find_map(|a| members.get(a)) {
                graph.add_edge(id.as_str(), nearest.as_str(), ());
            }
        }
        let order = toposort(&graph, None).map_err(|cycle| {
            OrbitError::Structural(format!(
                "collapsed ids form a cycle at {:?}",
                cycle.node_id()
            ))
        })?;
        Ok(order.into_iter().map(NodeId::from).collect())
    }

    /// Replay persisted collapsed state, deepest first. Ids that are unknown or not parents are
    /// dropped with a warning. Returns every id the replay collapsed.
    pub async fn restore(&mut self, ids: &[NodeId]) -> Result<Vec<NodeId>, OrbitError> {
        let valid = ids
            .iter()
            .filter(|id| match self.graph.get(id) {
                Some(node) if node.is_parent => true,
                Some(_) => {
                    tracing::warn!("[restore] {id} is not a parent, ignoring collapsed flag");
                    false
                }
                None => {
                    tracing::warn!("[restore] {id} is not in the graph, ignoring collapsed flag");
                    false
                }
            })
            .cloned()
            .collect::<Vec<_>>();

        let mut restored = Vec::new();
        for id in self.bottom_up_order(&valid)? {
            restored.extend(self.collapse(&id, EventOrigin::Remote).await?);
        }
        Ok(restored)
    }

    /// Drop collapsed state and owed writes for nodes that no longer exist.
    pub(crate) fn forget(&mut self, ids: &[NodeId]) {
        for id in ids {
            self.collapsed.remove(id);
            self.pulled_in.remove(id);
            self.pending_flags.remove(id);
        }
        self.pulled_in.retain(|_, by| !ids.contains(by));
    }

    async fn persist_flags(&mut self, changes: &[(NodeId, bool)]) {
        match self.mode {
            SessionMode::Authenticated => {
                for (id, is_collapsed) in changes {
                    match self.store.save_node_flag(id, *is_collapsed).await {
                        Ok(()) => {
                            self.pending_flags.remove(id);
                        }
                        Err(e) if !e.is_recoverable() => {
                            tracing::warn!("[ClusterEngine] flag write for {id} rejected: {e}");
                            self.pending_flags.remove(id);
                        }
                        Err(e) => {
                            tracing::warn!(
                                "[ClusterEngine] flag write for {id} failed, will retry: {e}"
                            );
                            self.pending_flags.insert(id.clone(), *is_collapsed);
                        }
                    }
                }
            }
            SessionMode::Anonymous => {
                if let Err(e) = self.write_snapshot().await {
                    tracing::warn!("[ClusterEngine] snapshot write failed, will retry: {e}");
                }
            }
        }
    }

    async fn write_snapshot(&mut self) -> Result<(), OrbitError> {
        let snapshot = self.snapshot();
        match self.store.save_snapshot(&snapshot).await {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }

    /// Write graph edits to an authenticated store, or fold them into the snapshot for an
    /// anonymous one. Failed record writes are queued behind any already owed and retried by
    /// [`ClusterEngine::flush_pending`]; the in-memory edit stands either way.
    pub(crate) async fn persist_records(
        &mut self,
        nodes: &[Node],
        edges: &[Edge],
        removed: &[NodeId],
    ) {
        if self.mode == SessionMode::Anonymous {
            self.persist_snapshot().await;
            return;
        }
        self.pending_records
            .extend(nodes.iter().map(|n| PendingRecord::Node(n.id.clone())));
        self.pending_records
            .extend(edges.iter().cloned().map(PendingRecord::Edge));
        if !removed.is_empty() {
            self.pending_records
                .push(PendingRecord::Removal(removed.to_vec()));
        }
        self.write_records().await;
    }

    /// Replay owed record writes in order, stopping at the first one the store still refuses.
    async fn write_records(&mut self) {
        let mut owed = std::mem::take(&mut self.pending_records).into_iter();
        while let Some(record) = owed.next() {
            let result = match &record {
                PendingRecord::Node(id) => match self.graph.get(id) {
                    Some(node) => self.store.upsert_node(node).await,
                    None => Ok(()),
                },
                PendingRecord::Edge(edge) => {
                    match self.graph.contains(&edge.from) && self.graph.contains(&edge.to) {
                        true => self.store.insert_edge(edge).await,
                        false => Ok(()),
                    }
                }
                PendingRecord::Removal(ids) => self.store.remove_nodes(ids).await,
            };
            match result {
                Ok(()) => {}
                Err(e) if !e.is_recoverable() => {
                    tracing::warn!("[ClusterEngine] store rejected {record:?}: {e}");
                }
                Err(e) => {
                    tracing::warn!("[ClusterEngine] record write failed, will retry: {e}");
                    self.pending_records.push(record);
                    self.pending_records.extend(owed);
                    return;
                }
            }
        }
    }

    /// Retry every owed record write, then every owed flag write. Returns the ids whose flags
    /// are still pending afterwards.
    pub async fn flush_pending(&mut self) -> BTreeSet<NodeId> {
        if !self.pending_records.is_empty() {
            tracing::debug!(
                "[ClusterEngine] retrying {} pending record writes",
                self.pending_records.len()
            );
            self.write_records().await;
        }
        let owed = std::mem::take(&mut self.pending_flags);
        if !owed.is_empty() {
            tracing::debug!("[ClusterEngine] retrying {} pending flag writes", owed.len());
        }
        for (id, is_collapsed) in owed {
            if !self.graph.contains(&id) {
                continue;
            }
            match self.store.save_node_flag(&id, is_collapsed).await {
                Ok(()) => {}
                Err(e) if !e.is_recoverable() => {
                    tracing::warn!("[ClusterEngine] flag write for {id} rejected: {e}");
                }
                Err(e) => {
                    tracing::debug!("[ClusterEngine] flag write for {id} still failing: {e}");
                    self.pending_flags.insert(id, is_collapsed);
                }
            }
        }
        self.pending_flags.keys().cloned().collect()
    }

    /// Explicit save. Authenticated sessions flush owed record and flag writes and fail while
    /// any remain; anonymous sessions write the whole snapshot.
    pub async fn save(&mut self) -> Result<(), OrbitError> {
        match self.mode {
            SessionMode::Authenticated => {
                let still_pending = self.flush_pending().await;
                match still_pending.is_empty() && self.pending_records.is_empty() {
                    true => Ok(()),
                    false => Err(OrbitError::Persistence(format!(
                        "{} graph edits and {} collapsed flags could not be written",
                        self.pending_records.len(),
                        still_pending.len()
                    ))),
                }
            }
            SessionMode::Anonymous => self.write_snapshot().await,
        }
    }

    /// Whole-snapshot write used after CRUD edits in anonymous sessions. Failures are logged and
    /// leave the engine dirty.
    pub(crate) async fn persist_snapshot(&mut self) {
        if let Err(e) = self.write_snapshot().await {
            tracing::warn!("[ClusterEngine] snapshot write failed, will retry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::Shape,
        persistence::MemoryStore,
        tests::helpers::{chain_snapshot, id, memory_store, scenario_snapshot},
    };
    use test_log::test;

    async fn engine(
        snapshot: GraphSnapshot,
        mode: SessionMode,
    ) -> (ClusterEngine<MemoryStore>, MemoryStore) {
        let store = memory_store(snapshot.clone());
        let (engine, diagnostics) = ClusterEngine::from_snapshot(store.clone(), mode, snapshot)
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        (engine, store)
    }

    #[test(tokio::test)]
    async fn test_concrete_scenario() {
        let (mut engine, _) = engine(scenario_snapshot(), SessionMode::Anonymous).await;
        let before = engine.view();
        assert_eq!(before.node_ids().len(), 4);

        let applied = engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        assert_eq!(applied, vec![id("A")]);
        let view = engine.view();
        assert_eq!(view.node_ids(), [id("A"), id("Root")].into_iter().collect());
        let cluster = view.node(&id("A")).unwrap();
        assert_eq!(cluster.label, "A (+2)");
        assert!(cluster.is_cluster);
        assert_eq!(cluster.shape, Shape::Circle);
        assert_eq!(view.edges.len(), 1);

        assert!(engine.expand(&id("A"), EventOrigin::Local).await.unwrap());
        assert_eq!(engine.view(), before);
    }

    #[test(tokio::test)]
    async fn test_collapse_and_expand_are_idempotent() {
        let (mut engine, store) = engine(scenario_snapshot(), SessionMode::Authenticated).await;
        engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        let once = (engine.view(), engine.collapsed().clone());
        let writes = store.writes();

        let again = engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        assert!(again.is_empty());
        assert_eq!((engine.view(), engine.collapsed().clone()), once);
        assert_eq!(store.writes(), writes);

        assert!(engine.expand(&id("A"), EventOrigin::Local).await.unwrap());
        assert!(!engine.expand(&id("A"), EventOrigin::Local).await.unwrap());
        assert!(engine.collapsed().is_empty());
    }

    #[test(tokio::test)]
    async fn test_collapse_preconditions() {
        let (mut engine, _) = engine(scenario_snapshot(), SessionMode::Anonymous).await;
        // leaf
        assert!(engine.collapse(&id("B"), EventOrigin::Local).await.unwrap().is_empty());
        // unknown
        assert!(engine.collapse(&id("nope"), EventOrigin::Local).await.unwrap().is_empty());
        assert!(engine.collapsed().is_empty());
        assert!(engine.collapsed().invalid_members(engine.graph()).is_empty());
    }

    #[test(tokio::test)]
    async fn test_nested_collapse_retains_inner_state() {
        let (mut engine, _) = engine(chain_snapshot(), SessionMode::Anonymous).await;
        assert_eq!(
            engine.collapse(&id("B"), EventOrigin::Local).await.unwrap(),
            vec![id("C"), id("B")]
        );
        let applied = engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        assert_eq!(applied, vec![id("A")]);
        assert_eq!(engine.view().node_ids(), [id("A")].into_iter().collect());

        engine.expand(&id("A"), EventOrigin::Local).await.unwrap();
        let view = engine.view();
        assert_eq!(view.node_ids(), [id("A"), id("B")].into_iter().collect());
        assert_eq!(view.node(&id("B")).unwrap().label, "B (+1)");

        // C was pulled in by B's collapse and follows B back out
        engine.expand(&id("B"), EventOrigin::Local).await.unwrap();
        assert!(engine.collapsed().is_empty());
        let full = engine.view();
        assert_eq!(full.nodes.len(), 4);
        assert_eq!(full.nodes.iter().filter(|n| n.id == id("D")).count(), 1);
    }

    #[test(tokio::test)]
    async fn test_collapse_then_expand_restores_deep_subtree() {
        let (mut engine, store) = engine(chain_snapshot(), SessionMode::Authenticated).await;
        let before = engine.view();

        let applied = engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        assert_eq!(applied, vec![id("C"), id("B"), id("A")]);
        assert!(engine.expand(&id("A"), EventOrigin::Local).await.unwrap());

        assert_eq!(engine.view(), before);
        assert!(engine.collapsed().is_empty());
        assert!(store.collapsed().is_empty());
        assert!(engine.graph().nodes().all(|n| !n.is_collapsed));
    }

    #[test(tokio::test)]
    async fn test_remote_expand_keeps_pulled_in_members() {
        let (mut engine, _) = engine(chain_snapshot(), SessionMode::Authenticated).await;
        engine.collapse(&id("A"), EventOrigin::Remote).await.unwrap();
        engine.expand(&id("A"), EventOrigin::Remote).await.unwrap();
        assert!(engine.is_collapsed(&id("B")));
        assert!(engine.is_collapsed(&id("C")));

        // B is now collapsed in its own right
        engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        engine.expand(&id("A"), EventOrigin::Local).await.unwrap();
        assert!(engine.is_collapsed(&id("B")));
    }

    #[test(tokio::test)]
    async fn test_failed_record_writes_are_retried_in_order() {
        let (mut engine, store) = engine(scenario_snapshot(), SessionMode::Authenticated).await;
        store.set_offline(true);
        let node = crate::properties::Node::new("D").with_id("D");
        let edge = crate::tests::helpers::edge("A", "D");
        engine.graph_mut().add_node(node.clone()).unwrap();
        engine.graph_mut().insert_edge(edge.clone()).unwrap();
        engine.persist_records(&[node], &[edge.clone()], &[]).await;
        assert_eq!(
            engine.pending_records(),
            [PendingRecord::Node(id("D")), PendingRecord::Edge(edge)]
        );
        assert!(engine.save().await.is_err());

        store.set_offline(false);
        engine.save().await.unwrap();
        assert!(engine.pending_records().is_empty());
        let stored = store.snapshot();
        assert!(stored.nodes.iter().any(|n| n.id == id("D")));
        assert!(stored.edges.iter().any(|e| e.to == id("D")));
    }

    #[test(tokio::test)]
    async fn test_rejected_flag_writes_are_not_retried() {
        let (mut engine, store) = engine(scenario_snapshot(), SessionMode::Authenticated).await;
        store.remove_nodes(&[id("A")]).await.unwrap();
        engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        assert!(engine.is_collapsed(&id("A")));
        assert!(engine.pending_flags().is_empty());
    }

    #[test(tokio::test)]
    async fn test_bottom_up_order_puts_descendants_first() {
        let (engine, _) = engine(chain_snapshot(), SessionMode::Anonymous).await;
        let order = engine.bottom_up_order(&[id("A"), id("C")]).unwrap();
        assert_eq!(order, vec![id("C"), id("A")]);
        let order = engine.bottom_up_order(&[id("B"), id("A"), id("C")]).unwrap();
        assert_eq!(order, vec![id("C"), id("B"), id("A")]);
    }

    #[test(tokio::test)]
    async fn test_restore_from_snapshot_flags() {
        let mut snapshot = chain_snapshot();
        snapshot.collapsed = vec![id("A"), id("C")];
        snapshot.nodes[3].is_collapsed = true; // leaf D: invalid, ignored
        let store = memory_store(snapshot.clone());
        let (engine, _) = ClusterEngine::from_snapshot(store, SessionMode::Anonymous, snapshot)
            .await
            .unwrap();
        assert!(engine.is_collapsed(&id("A")));
        assert!(engine.is_collapsed(&id("C")));
        assert!(!engine.is_collapsed(&id("D")));
        assert_eq!(engine.view().node_ids(), [id("A")].into_iter().collect());
        assert!(engine.last_local_change().is_none());
    }

    #[test(tokio::test)]
    async fn test_failed_flag_writes_are_retried() {
        let (mut engine, store) = engine(scenario_snapshot(), SessionMode::Authenticated).await;
        store.set_offline(true);
        engine.collapse(&id("A"), EventOrigin::Local).await.unwrap();
        assert!(engine.is_collapsed(&id("A")));
        assert_eq!(engine.pending_flags().get(&id("A")), Some(&true));
        assert!(engine.save().await.is_err());

        store.set_offline(false);
        engine.save().await.unwrap();
        assert!(engine.pending_flags().is_empty());
        assert!(store.collapsed().contains(&id("A")));
    }

    #[test(tokio::test)]
    async fn test_remote_origin_skips_persistence_and_debounce() {
        let (mut engine, store) = engine(scenario_snapshot(), SessionMode::Authenticated).await;
        engine.collapse(&id("A"), EventOrigin::Remote).await.unwrap();
        assert!(engine.last_local_change().is_none());
        assert!(store.collapsed().is_empty());

        engine.expand(&id("A"), EventOrigin::Local).await.unwrap();
        assert!(engine.last_local_change().is_some());
    }

    #[test(tokio::test)]
    async fn test_toggle() {
        let (mut engine, _) = engine(scenario_snapshot(), SessionMode::Anonymous).await;
        assert!(engine.toggle(&id("A"), EventOrigin::Local).await.unwrap());
        assert!(engine.is_collapsed(&id("A")));
        assert!(engine.toggle(&id("A"), EventOrigin::Local).await.unwrap());
        assert!(!engine.is_collapsed(&id("A")));
        assert!(!engine.toggle(&id("B"), EventOrigin::Local).await.unwrap());
    }
}
