//! A user's editing session: one [`ClusterEngine`] plus its reconciler, wired to a renderer.
//!
//! The session turns renderer gestures ([`UserEvent`]) into engine calls, performs graph edits,
//! and pushes a [`GraphEvent::VisibleGraphChanged`] whenever the visible graph changes. Every
//! mutation takes `&mut self`, so edits and collapse/expand calls never interleave.

use crate::{
    cluster::ClusterEngine,
    commands::{NodeEdit, Op, OpResult},
    config::OrbitConfig,
    error::OrbitError,
    event::{EventOrigin, GraphEvent, UserEvent},
    graph::{Removed, VisibleGraph},
    persistence::{PersistenceAdapter, SessionMode},
    properties::{Edge, GraphSnapshot, Node, NodeId},
    reveal::{self, RevealOutcome},
    sync::{ReconcileOutcome, SyncReconciler},
};
use tokio::sync::mpsc::UnboundedSender;

pub struct Session<S> {
    engine: ClusterEngine<S>,
    reconciler: SyncReconciler,
    events: Option<UnboundedSender<GraphEvent>>,
    selected: Option<NodeId>,
}

impl<S: PersistenceAdapter> Session<S> {
    /// Load the graph from `store`, seeding the starter graph if the store is empty, and emit
    /// the first visible graph.
    pub async fn load(
        store: S,
        mode: SessionMode,
        config: &OrbitConfig,
        events: Option<UnboundedSender<GraphEvent>>,
    ) -> Result<(Session<S>, Vec<OrbitError>), OrbitError> {
        let snapshot = store.load_all().await?;
        Session::start(store, mode, snapshot, config, events).await
    }

    /// Authenticated load that survives an unreachable remote store. If `store` fails with a
    /// recoverable error the graph is read from `fallback` (typically the local snapshot cache)
    /// and every write is owed to `store` until it comes back.
    pub async fn load_with_fallback<L: PersistenceAdapter>(
        store: S,
        fallback: &L,
        config: &OrbitConfig,
        events: Option<UnboundedSender<GraphEvent>>,
    ) -> Result<(Session<S>, Vec<OrbitError>), OrbitError> {
        let snapshot = match store.load_all().await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_recoverable() => {
                tracing::warn!("[Session] remote store unavailable, loading local copy: {e}");
                fallback.load_all().await?
            }
            Err(e) => return Err(e),
        };
        Session::start(store, SessionMode::Authenticated, snapshot, config, events).await
    }

    #[tracing::instrument(skip_all, fields(mode = ?mode))]
    async fn start(
        store: S,
        mode: SessionMode,
        mut snapshot: GraphSnapshot,
        config: &OrbitConfig,
        events: Option<UnboundedSender<GraphEvent>>,
    ) -> Result<(Session<S>, Vec<OrbitError>), OrbitError> {
        let seeded = snapshot.is_empty();
        if seeded {
            snapshot = GraphSnapshot::starter(&config.starter_label, &config.starter_note);
            tracing::info!("[Session] empty store, seeding starter graph");
        }

        let (mut engine, diagnostics) =
            ClusterEngine::from_snapshot(store, mode, snapshot).await?;
        if seeded {
            let nodes = engine.graph().nodes().cloned().collect::<Vec<_>>();
            engine.persist_records(&nodes, &[], &[]).await;
        }
        let session = Session {
            engine,
            reconciler: SyncReconciler::new(config.debounce()),
            events,
            selected: None,
        };
        session.emit_view()?;
        Ok((session, diagnostics))
    }

    pub fn engine(&self) -> &ClusterEngine<S> {
        &self.engine
    }

    pub fn view(&self) -> VisibleGraph {
        self.engine.view()
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.selected.as_ref()
    }

    pub fn reconciler(&self) -> &SyncReconciler {
        &self.reconciler
    }

    fn emit(&self, event: GraphEvent) -> Result<(), OrbitError> {
        if let Some(tx) = self.events.as_ref() {
            tx.send(event)?;
        }
        Ok(())
    }

    fn emit_view(&self) -> Result<(), OrbitError> {
        self.emit(GraphEvent::VisibleGraphChanged(self.engine.view()))
    }

    pub async fn handle_user_event(&mut self, event: UserEvent) -> Result<(), OrbitError> {
        tracing::debug!("[Session] {event}");
        match event {
            UserEvent::NodeSelected(id) => {
                self.selected = self.engine.graph().contains(&id).then_some(id);
            }
            UserEvent::NodeDeselected => self.selected = None,
            UserEvent::NodeDoubleClicked(id) => {
                self.toggle(&id).await?;
            }
        }
        Ok(())
    }

    pub async fn collapse(&mut self, id: &NodeId) -> Result<Vec<NodeId>, OrbitError> {
        let applied = self.engine.collapse(id, EventOrigin::Local).await?;
        if !applied.is_empty() {
            self.emit_view()?;
        }
        Ok(applied)
    }

    pub async fn expand(&mut self, id: &NodeId) -> Result<bool, OrbitError> {
        let changed = self.engine.expand(id, EventOrigin::Local).await?;
        if changed {
            self.emit_view()?;
        }
        Ok(changed)
    }

    pub async fn toggle(&mut self, id: &NodeId) -> Result<bool, OrbitError> {
        let changed = self.engine.toggle(id, EventOrigin::Local).await?;
        if changed {
            self.emit_view()?;
        }
        Ok(changed)
    }

    /// Reveal `target`, asking `confirm` before expanding anything. The renderer receives a new
    /// visible graph after each expanded ancestor and a focus event once the target shows.
    pub async fn reveal<F>(
        &mut self,
        target: &NodeId,
        confirm: F,
    ) -> Result<RevealOutcome, OrbitError>
    where
        F: FnOnce(&[NodeId]) -> bool,
    {
        let mut sequence = match reveal::prepare(&self.engine, target, confirm) {
            Ok(sequence) => sequence,
            Err(outcome) => {
                if let RevealOutcome::NotRevealed { reason, .. } = &outcome {
                    tracing::warn!("[Session] could not reveal {target}: {reason}");
                }
                return Ok(outcome);
            }
        };
        while sequence.step(&mut self.engine).await?.is_some() {
            self.emit_view()?;
        }
        let outcome = sequence.finish(&self.engine);
        if outcome.is_revealed() {
            self.selected = Some(target.clone());
            self.emit(GraphEvent::Focus(target.clone()))?;
        }
        Ok(outcome)
    }

    pub async fn reconcile(&mut self) -> Result<ReconcileOutcome, OrbitError> {
        let outcome = self.reconciler.reconcile(&mut self.engine).await?;
        if let ReconcileOutcome::Applied(report) = &outcome {
            if !report.is_empty() {
                self.emit_view()?;
            }
        }
        Ok(outcome)
    }

    /// Every node, ordered by label, for a search UI to match against.
    pub fn search_index(&self) -> Vec<&Node> {
        let mut nodes = self.engine.graph().nodes().collect::<Vec<_>>();
        nodes.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    /// Attach `node` below `parent`, which must be a parent node. Returns the new node's id.
    pub async fn add_child(&mut self, parent: &NodeId, node: Node) -> Result<NodeId, OrbitError> {
        match self.engine.graph().get(parent) {
            None => return Err(OrbitError::NotFound(format!("parent node {parent}"))),
            Some(p) if !p.is_parent => {
                return Err(OrbitError::InvalidOperation(format!(
                    "{p} is not a parent node"
                )))
            }
            Some(_) => {}
        }
        let id = node.id.clone();
        let edge = Edge::new(parent.clone(), id.clone());
        let graph = self.engine.graph_mut();
        graph.add_node(node)?;
        if let Err(e) = graph.insert_edge(edge.clone()) {
            graph.remove_subtree(&id)?;
            return Err(e);
        }
        tracing::debug!("[Session] added {id} under {parent}");

        let stored = self.engine.graph().get(&id).cloned();
        self.engine.persist_records(stored.as_slice(), &[edge], &[]).await;
        self.emit_view()?;
        Ok(id)
    }

    /// Add a new top-level node. Roots are always parents.
    pub async fn add_root(&mut self, mut node: Node) -> Result<NodeId, OrbitError> {
        node.is_parent = true;
        let id = node.id.clone();
        self.engine.graph_mut().add_node(node)?;
        tracing::debug!("[Session] added root {id}");

        let stored = self.engine.graph().get(&id).cloned();
        self.engine.persist_records(stored.as_slice(), &[], &[]).await;
        self.emit_view()?;
        Ok(id)
    }

    /// Apply content changes. Turning a collapsed parent into a leaf expands it first.
    pub async fn edit_node(&mut self, id: &NodeId, edit: NodeEdit) -> Result<(), OrbitError> {
        let Some(mut node) = self.engine.graph().get(id).cloned() else {
            return Err(OrbitError::NotFound(format!("node {id}")));
        };
        if edit.is_empty() {
            return Ok(());
        }
        if let Some(label) = edit.label {
            node.label = label;
        }
        if let Some(url) = edit.url {
            node.url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(note) = edit.note {
            node.note = Some(note).filter(|n| !n.trim().is_empty());
        }
        if let Some(is_parent) = edit.is_parent {
            if !is_parent && self.engine.is_collapsed(id) {
                self.engine.expand(id, EventOrigin::Local).await?;
            }
            node.is_parent = is_parent;
        }

        let stored = self.engine.graph_mut().update_node(node)?.clone();
        self.engine.persist_records(&[stored], &[], &[]).await;
        self.emit_view()?;
        Ok(())
    }

    /// Delete `id` and its whole subtree. Deleting everything that is left is refused, so the
    /// graph is never emptied.
    pub async fn delete_node(&mut self, id: &NodeId) -> Result<Removed, OrbitError> {
        if !self.engine.graph().contains(id) {
            return Err(OrbitError::NotFound(format!("node {id}")));
        }
        let doomed = 1 + self.engine.graph().descendants(id)?.len();
        if doomed >= self.engine.graph().len() {
            return Err(OrbitError::InvalidOperation(format!(
                "deleting {id} would leave the graph empty"
            )));
        }

        let removed = self.engine.graph_mut().remove_subtree(id)?;
        self.engine.forget(&removed.nodes);
        if self
            .selected
            .as_ref()
            .is_some_and(|s| removed.nodes.contains(s))
        {
            self.selected = None;
        }
        self.engine.persist_records(&[], &[], &removed.nodes).await;
        self.emit_view()?;
        Ok(removed)
    }

    /// Explicit save: retries owed record and flag writes, or rewrites the local snapshot.
    pub async fn save(&mut self) -> Result<(), OrbitError> {
        self.engine.save().await
    }

    pub async fn execute(&mut self, op: Op) -> Result<OpResult, OrbitError> {
        tracing::debug!("[Session] executing {op}");
        let result = match op {
            Op::View => OpResult::View(self.view()),
            Op::Collapse(id) => OpResult::Collapsed(self.collapse(&id).await?),
            Op::Expand(id) => OpResult::Changed(self.expand(&id).await?),
            Op::Toggle(id) => OpResult::Changed(self.toggle(&id).await?),
            Op::Reveal(id) => OpResult::Reveal(self.reveal(&id, |_| true).await?),
            Op::AddChild {
                parent,
                label,
                url,
                note,
                is_parent,
            } => {
                let mut node = match is_parent {
                    true => Node::parent(label),
                    false => Node::new(label),
                };
                node = node.with_url(url.unwrap_or_default());
                node = node.with_note(note.unwrap_or_default());
                OpResult::Created(self.add_child(&parent, node).await?)
            }
            Op::AddRoot { label, url, note } => {
                let node = Node::parent(label)
                    .with_url(url.unwrap_or_default())
                    .with_note(note.unwrap_or_default());
                OpResult::Created(self.add_root(node).await?)
            }
            Op::Edit(id, edit) => {
                self.edit_node(&id, edit).await?;
                OpResult::Ok
            }
            Op::Delete(id) => OpResult::Removed(self.delete_node(&id).await?.nodes),
            Op::SearchIndex => {
                OpResult::Nodes(self.search_index().into_iter().cloned().collect())
            }
            Op::Reconcile => OpResult::Reconcile(self.reconcile().await?),
            Op::Save => {
                self.save().await?;
                OpResult::Ok
            }
            Op::BuiltInTest => OpResult::Diagnostics(self.engine.graph().built_in_test()),
        };
        Ok(result)
    }
}
