//! Move executor: confirmation step, queue side effects and undo.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use stockroom_core::ServiceError;

use crate::model::{EntityId, EntityKind, Queue};
use crate::store::{EntityStore, PriorPlacement};
use crate::validator::{BlockedMove, DropTarget, MoveCheck, MoveRejection, validate_move};

const VARIOUS_LOCATIONS: &str = "Various Locations";
const NO_SKU: &str = "No SKU";

/// What the confirmation dialog shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSummary {
    pub count: usize,
    /// Common source label, or "Various Locations".
    pub source_label: String,
    pub target_label: String,
    /// Most frequent SKU (or kind for non-devices).
    pub dominant_sku: String,
    /// Distinct keys beyond the dominant one.
    pub other_skus: usize,
}

impl MoveSummary {
    pub fn sku_summary(&self) -> String {
        if self.other_skus == 0 {
            self.dominant_sku.clone()
        } else {
            format!("{} + {} more", self.dominant_sku, self.other_skus)
        }
    }
}

impl fmt::Display for MoveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Move {} item(s) from {} to {}: {}",
            self.count,
            self.source_label,
            self.target_label,
            self.sku_summary()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    NoOp,
    Rejected(MoveRejection),
    Blocked(BlockedMove),
    /// Held until [`MoveExecutor::confirm`] or [`MoveExecutor::cancel`].
    NeedsConfirmation(MoveSummary),
    Moved { moved: Vec<EntityId>, target_id: EntityId },
    /// The store refused a move the validator allowed.
    Failed(ServiceError),
}

impl From<MoveCheck> for MoveOutcome {
    fn from(check: MoveCheck) -> Self {
        match check {
            MoveCheck::NoOp | MoveCheck::Allowed => MoveOutcome::NoOp,
            MoveCheck::Rejected(r) => MoveOutcome::Rejected(r),
            MoveCheck::Blocked(b) => MoveOutcome::Blocked(b),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingMove {
    ids: Vec<EntityId>,
    target: DropTarget,
}

/// Applies validated moves against a store. Holds at most one pending
/// confirmation and one undo record.
#[derive(Debug, Default)]
pub struct MoveExecutor {
    pending: Option<PendingMove>,
    last: Option<Vec<PriorPlacement>>,
}

impl MoveExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and either apply the move or hold it for confirmation.
    pub fn execute(
        &mut self,
        store: &mut EntityStore,
        ids: &[EntityId],
        target: &DropTarget,
    ) -> MoveOutcome {
        let ids = dedupe(ids);
        let check = validate_move(store, &ids, target);
        if !check.is_allowed() {
            return Self::refused(check);
        }

        if store.config().requires_confirmation(ids.len()) {
            let summary = summarize(store, &ids, target);
            info!("move of {} item(s) awaits confirmation", ids.len());
            self.pending = Some(PendingMove {
                ids,
                target: target.clone(),
            });
            return MoveOutcome::NeedsConfirmation(summary);
        }
        self.apply(store, &ids, target)
    }

    /// Apply the pending move. The move is validated again since the store
    /// may have changed while the dialog was open.
    pub fn confirm(&mut self, store: &mut EntityStore) -> MoveOutcome {
        let Some(pending) = self.pending.take() else {
            return MoveOutcome::NoOp;
        };
        let check = validate_move(store, &pending.ids, &pending.target);
        if !check.is_allowed() {
            return Self::refused(check);
        }
        self.apply(store, &pending.ids, &pending.target)
    }

    /// Drop the pending move. Returns whether there was one.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn pending_summary(&self, store: &EntityStore) -> Option<MoveSummary> {
        self.pending
            .as_ref()
            .map(|p| summarize(store, &p.ids, &p.target))
    }

    pub fn can_undo(&self) -> bool {
        self.last.is_some()
    }

    /// Reverse the last applied move: prior parent, sibling position and
    /// queue of every moved entity.
    pub fn undo(&mut self, store: &mut EntityStore) -> Result<Vec<EntityId>, ServiceError> {
        let Some(placements) = self.last.take() else {
            return Err(ServiceError::Validation("nothing to undo".into()));
        };
        if let Err(e) = store.restore(&placements) {
            self.last = Some(placements);
            return Err(e);
        }
        info!("undid move of {} item(s)", placements.len());
        Ok(placements.into_iter().map(|p| p.id).collect())
    }

    fn refused(check: MoveCheck) -> MoveOutcome {
        if let MoveCheck::Blocked(b) = &check {
            warn!(
                "move blocked by {}: {} device(s) fail rules",
                b.department_name,
                b.failed_device_ids.len()
            );
        }
        check.into()
    }

    fn apply(&mut self, store: &mut EntityStore, ids: &[EntityId], target: &DropTarget) -> MoveOutcome {
        let target_id = target.entity_id().to_string();
        let queue = lane_for(store, target);

        // Skip entities already in place so a workstation drop does not
        // reassign lanes of devices that were there before.
        let to_move: Vec<EntityId> = ids
            .iter()
            .filter(|id| {
                store.get(id).is_some_and(|e| {
                    let same_parent = e.parent_id.as_deref() == Some(target_id.as_str());
                    match target.queue() {
                        None => !same_parent,
                        Some(q) => !same_parent || e.device().is_some_and(|d| d.effective_queue() != q),
                    }
                })
            })
            .cloned()
            .collect();
        if to_move.is_empty() {
            return MoveOutcome::NoOp;
        }

        match store.relocate(&to_move, &target_id, queue) {
            Ok(placements) => {
                let moved: Vec<EntityId> = placements.iter().map(|p| p.id.clone()).collect();
                if !placements.is_empty() {
                    self.last = Some(placements);
                }
                MoveOutcome::Moved { moved, target_id }
            }
            Err(e) => {
                warn!("move to {} failed: {}", target_id, e);
                MoveOutcome::Failed(e)
            }
        }
    }
}

/// Lane assigned to devices moved to `target`: the queue node's lane, or
/// the first configured lane of a workstation.
fn lane_for(store: &EntityStore, target: &DropTarget) -> Option<Queue> {
    match target {
        DropTarget::Queue { queue, .. } => Some(*queue),
        DropTarget::Entity(id) => store
            .get(id)
            .and_then(|e| e.workstation())
            .and_then(|w| w.default_queue()),
    }
}

fn dedupe(ids: &[EntityId]) -> Vec<EntityId> {
    let mut out: Vec<EntityId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

/// Build the confirmation summary for moving `ids` to `target`.
pub fn summarize(store: &EntityStore, ids: &[EntityId], target: &DropTarget) -> MoveSummary {
    let mut parents: Vec<Option<&str>> = Vec::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for id in ids {
        let Some(e) = store.get(id) else {
            continue;
        };
        let parent = e.parent_id.as_deref();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        let key = match e.device() {
            Some(d) => d.sku().unwrap_or(NO_SKU).to_string(),
            None => e.kind().to_string(),
        };
        *counts.entry(key).or_default() += 1;
    }

    let source_label = match parents.as_slice() {
        [Some(p)] => store
            .get(p)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| p.to_string()),
        [None] => "Root".to_string(),
        _ => VARIOUS_LOCATIONS.to_string(),
    };

    let target_label = match target {
        DropTarget::Entity(id) => store.get(id).map(|e| e.label.clone()).unwrap_or_else(|| id.clone()),
        DropTarget::Queue { workstation_id, queue } => {
            let ws = store
                .get(workstation_id)
                .filter(|e| e.kind() == EntityKind::Workstation)
                .map(|e| e.label.as_str())
                .unwrap_or(workstation_id.as_str());
            format!("{} / {}", ws, queue)
        }
    };

    // BTreeMap iterates keys ascending; keep the first maximum so ties go
    // to the smallest key.
    let mut dominant: Option<(&String, usize)> = None;
    for (key, n) in &counts {
        if dominant.is_none_or(|(_, best)| *n > best) {
            dominant = Some((key, *n));
        }
    }

    MoveSummary {
        count: ids.len(),
        source_label,
        target_label,
        dominant_sku: dominant.map(|(k, _)| k.clone()).unwrap_or_default(),
        other_skus: counts.len().saturating_sub(1),
    }
}
