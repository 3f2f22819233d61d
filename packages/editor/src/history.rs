//! # History
//!
//! Undo and redo on top of two [`Branch`]es: `done` collects events as the
//! user edits, `undone` collects the events undo produces. A new edit clears
//! `undone`.
//!
//! ## Design
//!
//! - Edits closer together than `event_delay_ms` share one event
//! - Changes that don't go into history (remote steps) still add their maps,
//!   so older events can be mapped over them
//! - An event whose steps were all annihilated by other changes is skipped
//! - Remote steps arriving under unconfirmed local ones are handled by
//!   [`History::rebase`]

use crate::branch::Branch;
use crate::config::HistoryConfig;
use quire_model::Node;
use quire_transform::{PosMap, StepRegistry, Transform};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct History {
    done: Branch,
    undone: Branch,
    config: HistoryConfig,
    allow_collapsing: bool,
    last_added_at: Option<u64>,
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            done: Branch::new(config.depth),
            undone: Branch::new(config.depth),
            allow_collapsing: config.allow_collapsing,
            config,
            last_added_at: None,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn done(&self) -> &Branch {
        &self.done
    }

    pub fn undone(&self) -> &Branch {
        &self.undone
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.done.event_count()
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.event_count()
    }

    pub fn allow_collapsing(&self) -> bool {
        self.allow_collapsing
    }

    /// Collapsing pops maps, so it must be off while another component
    /// expects the branches' trailing maps to match the applied steps.
    pub fn set_allow_collapsing(&mut self, allow: bool) {
        self.allow_collapsing = allow;
    }

    /// Record an applied transform made at time `now` (milliseconds).
    pub fn record(&mut self, transform: &Transform, add_to_history: bool, now: u64) {
        if !add_to_history {
            for map in transform.maps() {
                self.done.add_map(map.clone());
                self.undone.add_map(map.clone());
            }
            return;
        }
        if transform.is_empty() {
            return;
        }

        self.undone.clear();
        let grouped = matches!(
            self.last_added_at,
            Some(last) if now <= last.saturating_add(self.config.event_delay_ms)
        );
        if !grouped || self.done.is_empty() {
            self.done.new_event();
        }
        self.done.add_transform(transform);
        self.last_added_at = Some(now);
    }

    /// Build the transform undoing the newest event, against `doc`. The
    /// caller applies it without recording it again.
    pub fn undo(&mut self, registry: &Arc<StepRegistry>, doc: &Node) -> Option<Transform> {
        let transform = shift(&mut self.done, &mut self.undone, registry, doc, self.allow_collapsing)?;
        self.last_added_at = None;
        tracing::debug!("[History] Undo of {} step(s)", transform.len());
        Some(transform)
    }

    pub fn redo(&mut self, registry: &Arc<StepRegistry>, doc: &Node) -> Option<Transform> {
        let transform = shift(&mut self.undone, &mut self.done, registry, doc, self.allow_collapsing)?;
        self.last_added_at = None;
        tracing::debug!("[History] Redo of {} step(s)", transform.len());
        Some(transform)
    }

    /// See [`Branch::rebase`].
    pub fn rebase(&mut self, remote_maps: &[PosMap], rebased: &Transform, positions: &[Option<usize>]) {
        self.done.rebase(remote_maps, rebased, positions);
        self.undone.rebase(remote_maps, rebased, positions);
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

/// Pop events from `from` until one still has steps that apply, and push
/// its undo onto `to`.
fn shift(
    from: &mut Branch,
    to: &mut Branch,
    registry: &Arc<StepRegistry>,
    doc: &Node,
    allow_collapsing: bool,
) -> Option<Transform> {
    loop {
        let transform = from.pop_event(registry, doc, allow_collapsing)?;
        if transform.is_empty() {
            tracing::debug!("[History] Skipping event with no surviving steps");
            continue;
        }
        to.new_event();
        to.add_transform(&transform);
        return Some(transform);
    }
}
