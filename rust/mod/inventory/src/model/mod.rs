pub mod device;
pub mod entity;
pub mod history;
pub mod queue;
pub mod rules;

pub use device::{DeviceAttributes, DevicePatch};
pub use entity::{
    Entity, EntityAttributes, EntityId, EntityKind, EntityPatch, NewEntity,
    WorkstationAttributes,
};
pub use history::{HistoryAction, HistoryRecord};
pub use queue::Queue;
pub use rules::{DepartmentRules, RuleCondition, RuleKey, RuleViolation};
