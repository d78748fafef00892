use serde::{Deserialize, Serialize};

use super::entity::EntityId;

/// Kind of structural mutation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
    Move,
    Box,
    Unbox,
}

/// One audit record, emitted for every entity touched by a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub action_type: HistoryAction,
    pub entity_id: EntityId,
    pub details: String,
    pub timestamp: String,
}
