//! Undo/redo through the editor state, including changes that don't go
//! into history and remote steps rebased under local ones.

use anyhow::Result;
use quire_editor::{ApplyOptions, EditorState, HistoryConfig, ManualClock, Selection};
use quire_model::{doc, p, Node, Pos};
use quire_transform::{map_transform, MapEntry, MapKey, Remapping, StepRegistry, Transform};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const REMOTE: u128 = 1;
const LOCAL: u128 = 2;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> Arc<StepRegistry> {
    Arc::new(StepRegistry::standard())
}

fn state_with(doc: Node, config: HistoryConfig) -> (EditorState, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let state = EditorState::with_config(registry(), doc, config, clock.clone());
    (state, clock)
}

fn state(doc: Node) -> (EditorState, Arc<ManualClock>) {
    state_with(doc, HistoryConfig::default())
}

fn pos(path: &[usize], offset: usize) -> Pos {
    Pos::new(path.to_vec(), offset)
}

fn type_text(state: &mut EditorState, at: Pos, text: &str) -> Result<Transform> {
    let mut tr = state.transform();
    tr.insert_text(&at, text);
    state.apply(&tr)?;
    Ok(tr)
}

#[test]
fn test_undo_and_redo() -> Result<()> {
    let (mut state, _) = state(doc![p!["hello"]].node);
    type_text(&mut state, pos(&[0], 5), "!")?;
    assert_eq!(state.doc(), &doc![p!["hello!"]].node);

    assert!(state.undo().is_some());
    assert_eq!(state.doc(), &doc![p!["hello"]].node);
    assert!(state.undo().is_none());

    assert!(state.redo().is_some());
    assert_eq!(state.doc(), &doc![p!["hello!"]].node);
    assert!(state.redo().is_none());
    Ok(())
}

#[test]
fn test_events_are_grouped_by_time() -> Result<()> {
    let (mut state, clock) = state(doc![p![]].node);
    type_text(&mut state, pos(&[0], 0), "a")?;
    clock.advance(100);
    type_text(&mut state, pos(&[0], 1), "b")?;
    clock.advance(1000);
    type_text(&mut state, pos(&[0], 2), "c")?;
    assert_eq!(state.history().undo_depth(), 2);

    state.undo();
    assert_eq!(state.doc(), &doc![p!["ab"]].node);
    state.undo();
    assert_eq!(state.doc(), &doc![p![]].node);
    Ok(())
}

#[test]
fn test_undo_maps_over_unrecorded_change() -> Result<()> {
    let (mut state, clock) = state(doc![p!["hello"]].node);
    type_text(&mut state, pos(&[0], 5), "X")?;
    clock.advance(1000);

    let mut remote = state.transform();
    remote.insert_text(&pos(&[0], 0), "A");
    state.apply_with(&remote, ApplyOptions { add_to_history: false })?;
    assert_eq!(state.doc(), &doc![p!["AhelloX"]].node);

    state.undo();
    assert_eq!(state.doc(), &doc![p!["Ahello"]].node);
    state.redo();
    assert_eq!(state.doc(), &doc![p!["AhelloX"]].node);
    Ok(())
}

#[test]
fn test_undoing_both_events_restores_document() -> Result<()> {
    let (mut state, clock) = state(doc![p!["abcd"]].node);
    let mut tr = state.transform();
    tr.delete(&pos(&[0], 1), &pos(&[0], 3));
    state.apply(&tr)?;
    clock.advance(1000);
    type_text(&mut state, pos(&[0], 1), "Z")?;
    assert_eq!(state.doc(), &doc![p!["aZd"]].node);

    state.undo();
    assert_eq!(state.doc(), &doc![p!["ad"]].node);
    state.undo();
    assert_eq!(state.doc(), &doc![p!["abcd"]].node);
    Ok(())
}

#[test]
fn test_depth_limits_undo() -> Result<()> {
    let config = HistoryConfig {
        depth: 3,
        ..HistoryConfig::default()
    };
    let (mut state, clock) = state_with(doc![p![]].node, config);
    for i in 0..5 {
        type_text(&mut state, pos(&[0], i), "x")?;
        clock.advance(1000);
    }
    assert_eq!(state.history().undo_depth(), 3);

    let mut undone = 0;
    while state.undo().is_some() {
        undone += 1;
    }
    assert_eq!(undone, 3);
    assert_eq!(state.doc(), &doc![p!["xx"]].node);
    Ok(())
}

#[test]
fn test_collapsing_keeps_maps_from_piling_up() -> Result<()> {
    let (mut state, clock) = state(doc![p![]].node);
    type_text(&mut state, pos(&[0], 0), "a")?;
    clock.advance(1000);
    let second = type_text(&mut state, pos(&[0], 1), "b")?;
    assert_eq!(state.history().done().map_count(), 2);

    for _ in 0..3 {
        state.undo();
        assert_eq!(state.doc(), second.before());
        assert_eq!(state.history().done().map_count(), 1);
        state.redo();
        assert_eq!(state.doc(), second.doc());
        assert_eq!(state.history().done().map_count(), 2);
    }
    Ok(())
}

#[test]
fn test_without_collapsing_undo_adds_maps() -> Result<()> {
    let config = HistoryConfig {
        allow_collapsing: false,
        ..HistoryConfig::default()
    };
    let (mut state, clock) = state_with(doc![p![]].node, config);
    type_text(&mut state, pos(&[0], 0), "a")?;
    clock.advance(1000);
    type_text(&mut state, pos(&[0], 1), "b")?;

    state.undo();
    assert_eq!(state.doc(), &doc![p!["a"]].node);
    assert_eq!(state.history().done().map_count(), 3);
    Ok(())
}

#[test]
fn test_new_edit_after_undo_drops_redo() -> Result<()> {
    let (mut state, clock) = state(doc![p!["ab"]].node);
    type_text(&mut state, pos(&[0], 2), "c")?;
    state.undo();
    clock.advance(1000);
    type_text(&mut state, pos(&[0], 0), "z")?;
    assert!(!state.history().can_redo());
    assert!(state.redo().is_none());
    assert_eq!(state.doc(), &doc![p!["zab"]].node);
    Ok(())
}

fn rebase_under(state: &mut EditorState, local: &Transform, remote: &Transform) {
    let mut remapping = Remapping::new();
    for (i, map) in remote.maps().iter().enumerate() {
        remapping.add_to_back(MapEntry::new(map.clone(), MapKey::new(REMOTE, i)));
    }
    let rebased = map_transform(remote.doc(), &remapping, local, LOCAL);
    state.rebase(remote.maps(), &rebased);
}

#[test]
fn test_undo_after_remote_steps_rebased_under_local_ones() -> Result<()> {
    let start = doc![p!["hello"]].node;
    let (mut state, _) = state(start.clone());
    let local = type_text(&mut state, pos(&[0], 5), "X")?;

    let mut remote = Transform::new(registry(), start);
    remote.insert_text(&pos(&[0], 0), "A");
    rebase_under(&mut state, &local, &remote);
    assert_eq!(state.doc(), &doc![p!["AhelloX"]].node);

    state.undo();
    assert_eq!(state.doc(), &doc![p!["Ahello"]].node);
    state.redo();
    assert_eq!(state.doc(), &doc![p!["AhelloX"]].node);
    Ok(())
}

#[test]
fn test_annihilated_event_is_skipped() -> Result<()> {
    let start = doc![p!["hello"]].node;
    let (mut state, _) = state(start.clone());
    let local = type_text(&mut state, pos(&[0], 2), "X")?;

    let mut remote = Transform::new(registry(), start);
    remote.delete(&pos(&[0], 1), &pos(&[0], 4));
    rebase_under(&mut state, &local, &remote);
    assert_eq!(state.doc(), &doc![p!["ho"]].node);

    assert!(state.undo().is_none());
    assert_eq!(state.doc(), &doc![p!["ho"]].node);
    Ok(())
}

#[test]
fn test_selection_is_carried_through_rebase() -> Result<()> {
    let start = doc![p!["hello"]].node;
    let (mut state, _) = state(start.clone());
    let local = type_text(&mut state, pos(&[0], 5), "X")?;
    state.set_selection(Selection::cursor(pos(&[0], 6)))?;

    let mut remote = Transform::new(registry(), start);
    remote.insert_text(&pos(&[0], 0), "AB");
    rebase_under(&mut state, &local, &remote);
    assert_eq!(state.selection().head, pos(&[0], 8));
    Ok(())
}
