//! End-to-end session behaviour over the JSON snapshot store and the in-memory store.

mod common;

use common::{id, topic_tree};
use orbit_core::{
    commands::{NodeEdit, Op, OpResult},
    config::OrbitConfig,
    event::{GraphEvent, UserEvent},
    persistence::{LocalStore, MemoryStore, PersistenceAdapter, SessionMode},
    properties::{GraphSnapshot, Node},
    reveal::{RevealFailure, RevealOutcome},
    session::Session,
    sync::ReconcileOutcome,
    OrbitError,
};
use std::time::Duration;
use test_log::test;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

fn drain(rx: &mut UnboundedReceiver<GraphEvent>) -> Vec<GraphEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test(tokio::test)]
async fn test_empty_store_is_seeded_with_starter_graph() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("graph.json"));
    let config = OrbitConfig::default();
    let (tx, mut rx) = unbounded_channel();

    let (session, diagnostics) =
        Session::load(store.clone(), SessionMode::Anonymous, &config, Some(tx))
            .await
            .unwrap();
    assert!(diagnostics.is_empty());

    let index = session.search_index();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].label, config.starter_label);
    assert!(index[0].is_parent && index[0].is_root);

    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [GraphEvent::VisibleGraphChanged(view)] if view.nodes.len() == 1
    ));

    let on_disk = store.load_all().await.unwrap();
    assert_eq!(on_disk.nodes.len(), 1);
    assert_eq!(on_disk.nodes[0].note.as_deref(), Some(config.starter_note.as_str()));
}

#[test(tokio::test)]
async fn test_collapsed_state_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("graph.json"));
    store.save_snapshot(&topic_tree()).await.unwrap();
    let config = OrbitConfig::default();

    {
        let (mut session, _) = Session::load(store.clone(), SessionMode::Anonymous, &config, None)
            .await
            .unwrap();
        session.collapse(&id("async")).await.unwrap();
        let applied = session.collapse(&id("rust")).await.unwrap();
        assert_eq!(applied, vec![id("rust")]);
        session.expand(&id("rust")).await.unwrap();
    }

    let text = std::fs::read_to_string(store.path()).unwrap();
    let snapshot: GraphSnapshot = serde_json::from_str(&text).unwrap();
    assert_eq!(snapshot.collapsed, vec![id("async")]);

    let (session, _) = Session::load(store, SessionMode::Anonymous, &config, None)
        .await
        .unwrap();
    let view = session.view();
    assert!(view.contains(&id("async")));
    assert!(!view.contains(&id("tokio")));
    assert_eq!(view.node(&id("async")).unwrap().label, "Async (+1)");
}

#[test(tokio::test)]
async fn test_double_click_and_selection() {
    let store = MemoryStore::from_snapshot(topic_tree());
    let (tx, mut rx) = unbounded_channel();
    let (mut session, _) =
        Session::load(store, SessionMode::Anonymous, &OrbitConfig::default(), Some(tx))
            .await
            .unwrap();
    drain(&mut rx);

    session
        .handle_user_event(UserEvent::NodeSelected(id("notes")))
        .await
        .unwrap();
    assert_eq!(session.selected(), Some(&id("notes")));

    // leaves ignore double clicks
    session
        .handle_user_event(UserEvent::NodeDoubleClicked(id("notes")))
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());

    session
        .handle_user_event(UserEvent::NodeDoubleClicked(id("root")))
        .await
        .unwrap();
    let events = drain(&mut rx);
    let [GraphEvent::VisibleGraphChanged(view)] = events.as_slice() else {
        panic!("expected one view update, got {events:?}");
    };
    assert_eq!(view.nodes.len(), 1);
    assert_eq!(view.nodes[0].label, "Root (+2)");

    session
        .handle_user_event(UserEvent::NodeDeselected)
        .await
        .unwrap();
    assert_eq!(session.selected(), None);
}

#[test(tokio::test)]
async fn test_reveal_emits_each_step_then_focus() {
    let store = MemoryStore::from_snapshot(topic_tree());
    let (tx, mut rx) = unbounded_channel();
    let (mut session, _) =
        Session::load(store, SessionMode::Anonymous, &OrbitConfig::default(), Some(tx))
            .await
            .unwrap();
    session.collapse(&id("root")).await.unwrap();
    drain(&mut rx);

    let outcome = session
        .reveal(&id("tokio"), |chain| {
            assert_eq!(chain, [id("root"), id("rust"), id("async")]);
            true
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RevealOutcome::Revealed {
            target: id("tokio"),
            expanded_ancestors: vec![id("root"), id("rust"), id("async")],
        }
    );
    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert_eq!(events[3], GraphEvent::Focus(id("tokio")));
    assert_eq!(session.selected(), Some(&id("tokio")));

    let outcome = session.reveal(&id("ghost"), |_| true).await.unwrap();
    assert!(matches!(
        outcome,
        RevealOutcome::NotRevealed {
            reason: RevealFailure::UnknownNode(_),
            ..
        }
    ));
}

#[test(tokio::test)]
async fn test_crud_round_trip() {
    let store = MemoryStore::from_snapshot(topic_tree());
    let (mut session, _) = Session::load(
        store.clone(),
        SessionMode::Authenticated,
        &OrbitConfig::default(),
        None,
    )
    .await
    .unwrap();

    let child = session
        .add_child(&id("async"), Node::new("Futures"))
        .await
        .unwrap();
    assert_eq!(session.engine().graph().parent(&child), Some(&id("async")));
    assert!(store.snapshot().edges.iter().any(|e| e.to == child));

    let err = session
        .add_child(&id("notes"), Node::new("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrbitError::InvalidOperation(_)));

    // demoting a collapsed parent expands it first
    session.collapse(&id("async")).await.unwrap();
    session
        .edit_node(
            &id("async"),
            NodeEdit {
                label: Some("Concurrency".to_string()),
                is_parent: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!session.engine().is_collapsed(&id("async")));
    assert!(!store.collapsed().contains(&id("async")));
    let stored = store.snapshot();
    let renamed = stored.nodes.iter().find(|n| n.id == id("async")).unwrap();
    assert_eq!(renamed.label, "Concurrency");
    assert!(!renamed.is_parent);

    let removed = session.delete_node(&id("rust")).await.unwrap();
    assert_eq!(removed.nodes.len(), 5);
    assert_eq!(store.snapshot().nodes.len(), 2);
    assert!(session.engine().graph().built_in_test().is_empty());

    assert!(matches!(
        session.delete_node(&id("root")).await,
        Err(OrbitError::InvalidOperation(_))
    ));
}

#[test(tokio::test)]
async fn test_reconcile_through_session() {
    let store = MemoryStore::from_snapshot(topic_tree());
    let config = OrbitConfig {
        debounce_ms: 0,
        ..Default::default()
    };
    let (tx, mut rx) = unbounded_channel();
    let (mut session, _) =
        Session::load(store.clone(), SessionMode::Authenticated, &config, Some(tx))
            .await
            .unwrap();
    assert_eq!(session.reconciler().debounce(), Duration::ZERO);
    drain(&mut rx);

    store.set_remote_flag(&id("rust"), true);
    let outcome = session.reconcile().await.unwrap();
    let ReconcileOutcome::Applied(report) = outcome else {
        panic!("expected an applied pass, got {outcome:?}");
    };
    assert_eq!(report.collapsed, vec![id("async"), id("rust")]);
    assert_eq!(report.expanded, vec![id("async")]);
    assert_eq!(drain(&mut rx).len(), 1);
    assert!(session.engine().is_collapsed(&id("rust")));
    assert!(!session.engine().is_collapsed(&id("async")));
}

#[test(tokio::test)]
async fn test_ops_without_a_cli() {
    let store = MemoryStore::from_snapshot(topic_tree());
    let (mut session, _) = Session::load(
        store,
        SessionMode::Anonymous,
        &OrbitConfig::default(),
        None,
    )
    .await
    .unwrap();

    let result = session.execute(Op::Collapse(id("rust"))).await.unwrap();
    assert_eq!(result, OpResult::Collapsed(vec![id("async"), id("rust")]));
    assert_eq!(result.to_string(), "Collapsed(async, rust)");

    let OpResult::View(view) = session.execute(Op::View).await.unwrap() else {
        panic!("expected a view");
    };
    assert_eq!(view.nodes.len(), 3);

    let OpResult::Created(new_root) = session
        .execute(Op::AddRoot {
            label: "Inbox".to_string(),
            url: None,
            note: Some(String::new()),
        })
        .await
        .unwrap()
    else {
        panic!("expected a created node");
    };
    let node = session.engine().graph().get(&new_root).unwrap();
    assert!(node.is_parent && node.is_root);
    assert_eq!(node.note, None);

    // a root may go while another root remains
    let OpResult::Removed(removed) = session.execute(Op::Delete(id("root"))).await.unwrap() else {
        panic!("expected removed nodes");
    };
    assert_eq!(removed.len(), 6);
    assert!(session.execute(Op::Delete(new_root)).await.is_err());

    assert_eq!(
        session.execute(Op::BuiltInTest).await.unwrap(),
        OpResult::Diagnostics(vec![])
    );
    assert_eq!(
        session.execute(Op::Reconcile).await.unwrap(),
        OpResult::Reconcile(ReconcileOutcome::LocalOnly)
    );
}

#[test(tokio::test)]
async fn test_edits_made_offline_reach_the_store_on_save() {
    let store = MemoryStore::from_snapshot(topic_tree());
    let (mut session, _) = Session::load(
        store.clone(),
        SessionMode::Authenticated,
        &OrbitConfig::default(),
        None,
    )
    .await
    .unwrap();

    store.set_offline(true);
    let child = session
        .add_child(&id("async"), Node::parent("Futures"))
        .await
        .unwrap();
    session
        .add_child(&child, Node::new("Pin").with_id("pin"))
        .await
        .unwrap();
    session.collapse(&child).await.unwrap();
    assert_eq!(session.engine().pending_records().len(), 4);
    assert!(matches!(
        session.save().await,
        Err(OrbitError::Persistence(_))
    ));

    store.set_offline(false);
    session.save().await.unwrap();
    assert!(session.engine().pending_records().is_empty());
    assert!(session.engine().pending_flags().is_empty());
    let stored = store.snapshot();
    assert!(stored.nodes.iter().any(|n| n.id == child));
    assert!(stored.edges.iter().any(|e| e.from == id("async") && e.to == child));
    assert!(stored.edges.iter().any(|e| e.from == child && e.to == id("pin")));
    assert!(store.collapsed().contains(&child));
}

#[test(tokio::test)]
async fn test_unreachable_remote_falls_back_to_local_copy() {
    let remote = MemoryStore::from_snapshot(topic_tree());
    remote.set_offline(true);
    let mut cached = topic_tree();
    cached.collapsed = vec![id("async")];
    let local = MemoryStore::from_snapshot(cached);
    let config = OrbitConfig::default();

    assert!(
        Session::load(remote.clone(), SessionMode::Authenticated, &config, None)
            .await
            .is_err()
    );
    let (mut session, _) = Session::load_with_fallback(remote.clone(), &local, &config, None)
        .await
        .unwrap();
    assert_eq!(session.search_index().len(), 6);
    assert!(session.engine().is_collapsed(&id("async")));

    session.collapse(&id("rust")).await.unwrap();
    assert!(session.save().await.is_err());
    remote.set_offline(false);
    session.save().await.unwrap();
    assert!(remote.collapsed().contains(&id("rust")));
}
