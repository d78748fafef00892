//! Move validation. Pure: reads the store, never mutates it, never errors.

use std::fmt;

use crate::grouping::{self, GroupingMode};
use crate::model::{EntityId, EntityKind, Queue, RuleKey, RuleViolation};
use crate::store::EntityStore;

/// Where dragged items are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Entity(EntityId),
    /// A workstation queue node: reparent to the workstation and set the lane.
    Queue { workstation_id: EntityId, queue: Queue },
}

impl DropTarget {
    /// Interpret a node id from the explorer. Stored entity ids win;
    /// otherwise queue node ids become [`DropTarget::Queue`] and group
    /// node ids drop onto the group's container.
    pub fn resolve(store: &EntityStore, node_id: &str, mode: GroupingMode) -> Self {
        if store.contains(node_id) {
            return DropTarget::Entity(node_id.to_string());
        }
        if let Some((workstation, queue)) = grouping::parse_queue_id(node_id) {
            return DropTarget::Queue {
                workstation_id: workstation.to_string(),
                queue,
            };
        }
        if grouping::is_virtual_id(node_id) {
            if let Some(node) = grouping::resolve_virtual(store, node_id, mode) {
                return DropTarget::Entity(node.parent_id);
            }
        }
        DropTarget::Entity(node_id.to_string())
    }

    /// The entity that becomes the new parent.
    pub fn entity_id(&self) -> &str {
        match self {
            DropTarget::Entity(id) => id,
            DropTarget::Queue { workstation_id, .. } => workstation_id,
        }
    }

    pub fn queue(&self) -> Option<Queue> {
        match self {
            DropTarget::Entity(_) => None,
            DropTarget::Queue { queue, .. } => Some(*queue),
        }
    }
}

/// Why a move was refused outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    Empty,
    UnknownEntity(EntityId),
    UnknownTarget(EntityId),
    SelfDrop(EntityId),
    Cycle(EntityId),
    /// A dragged kind may not live under the target kind.
    Structural,
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::Empty => f.write_str("Nothing to move"),
            MoveRejection::UnknownEntity(id) => write!(f, "Unknown item '{}'", id),
            MoveRejection::UnknownTarget(id) => write!(f, "Unknown destination '{}'", id),
            MoveRejection::SelfDrop(_) => f.write_str("Cannot move an item into itself"),
            MoveRejection::Cycle(_) => f.write_str("Cannot move an item into its own contents"),
            MoveRejection::Structural => f.write_str("Cannot move these items here"),
        }
    }
}

/// A move refused by department rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedMove {
    pub department_id: EntityId,
    pub department_name: String,
    /// Distinct failed rules, in rule order.
    pub failed_rules: Vec<RuleViolation>,
    pub failed_device_ids: Vec<EntityId>,
}

impl fmt::Display for BlockedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.failed_rules.iter().map(|r| r.to_string()).collect();
        write!(
            f,
            "{} requires: {} ({} device(s))",
            self.department_name,
            rules.join(", "),
            self.failed_device_ids.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveCheck {
    Allowed,
    /// Everything is already there; select, do not mutate.
    NoOp,
    Rejected(MoveRejection),
    Blocked(BlockedMove),
}

impl MoveCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, MoveCheck::Allowed)
    }

    /// Outcomes that should not produce a user-facing message.
    pub fn is_silent(&self) -> bool {
        match self {
            MoveCheck::NoOp => true,
            MoveCheck::Rejected(r) => !matches!(r, MoveRejection::Structural),
            MoveCheck::Allowed | MoveCheck::Blocked(_) => false,
        }
    }
}

/// Decide whether `dragged` may be dropped on `target`.
///
/// Order: input checks, no-op detection, cycle checks, the parent
/// whitelist, then the rules of the nearest department at or above the
/// target for every dragged device.
pub fn validate_move(store: &EntityStore, dragged: &[EntityId], target: &DropTarget) -> MoveCheck {
    if dragged.is_empty() {
        return MoveCheck::Rejected(MoveRejection::Empty);
    }
    let target_id = target.entity_id();
    let Some(target_entity) = store.get(target_id) else {
        return MoveCheck::Rejected(MoveRejection::UnknownTarget(target_id.to_string()));
    };
    if target.queue().is_some() && target_entity.kind() != EntityKind::Workstation {
        return MoveCheck::Rejected(MoveRejection::UnknownTarget(target_id.to_string()));
    }

    let mut items = Vec::with_capacity(dragged.len());
    for id in dragged {
        match store.get(id) {
            Some(e) => items.push(e),
            None => return MoveCheck::Rejected(MoveRejection::UnknownEntity(id.clone())),
        }
    }

    let already_there = items.iter().all(|e| {
        e.parent_id.as_deref() == Some(target_id)
            && match target.queue() {
                None => true,
                Some(q) => e.device().is_some_and(|d| d.effective_queue() == q),
            }
    });
    if already_there {
        return MoveCheck::NoOp;
    }

    for e in &items {
        if e.id == target_id {
            return MoveCheck::Rejected(MoveRejection::SelfDrop(e.id.clone()));
        }
        if store.is_descendant(target_id, &e.id) {
            return MoveCheck::Rejected(MoveRejection::Cycle(e.id.clone()));
        }
    }

    let target_kind = target_entity.kind();
    let structural_ok = items.iter().all(|e| {
        e.kind().can_be_child_of(Some(target_kind))
            && (target.queue().is_none() || e.kind() == EntityKind::Device)
    });
    if !structural_ok {
        return MoveCheck::Rejected(MoveRejection::Structural);
    }

    let Some(department) = store.department_of(target_id) else {
        return MoveCheck::Allowed;
    };
    let Some(rules) = department.rules() else {
        return MoveCheck::Allowed;
    };
    if rules.is_off() {
        return MoveCheck::Allowed;
    }

    let mut failed_device_ids = Vec::new();
    let mut failed_keys: Vec<RuleKey> = Vec::new();
    let mut failed_rules = Vec::new();
    for e in &items {
        let Some(device) = e.device() else {
            continue;
        };
        let violations = rules.violations(device);
        if violations.is_empty() {
            continue;
        }
        failed_device_ids.push(e.id.clone());
        for v in violations {
            if !failed_keys.contains(&v.key) {
                failed_keys.push(v.key);
                failed_rules.push(v);
            }
        }
    }
    if failed_device_ids.is_empty() {
        return MoveCheck::Allowed;
    }
    failed_rules.sort_by_key(|v| v.key);

    MoveCheck::Blocked(BlockedMove {
        department_id: department.id.clone(),
        department_name: department.label.clone(),
        failed_rules,
        failed_device_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DepartmentRules, DeviceAttributes, EntityAttributes, EntityPatch, NewEntity,
        RuleCondition,
    };

    fn ids(list: &[&str]) -> Vec<EntityId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn to(id: &str) -> DropTarget {
        DropTarget::Entity(id.to_string())
    }

    /// Receiving (D1) → BIN1 → Dev1 (imei 123, tested), Dev2 (untested);
    /// D1 → WS1; Shipping (D2) → BIN2.
    fn warehouse() -> EntityStore {
        let mut s = EntityStore::new();
        let dept = |label: &str, id: &str| {
            NewEntity::new(EntityAttributes::for_kind(EntityKind::Department), label).with_id(id)
        };
        s.create(dept("Receiving", "D1")).unwrap();
        s.create(dept("Shipping", "D2")).unwrap();
        s.create(NewEntity::new(EntityAttributes::Bin, "B1").with_id("BIN1").under("D1"))
            .unwrap();
        s.create(NewEntity::new(EntityAttributes::Bin, "B2").with_id("BIN2").under("D2"))
            .unwrap();
        s.create(
            NewEntity::new(EntityAttributes::for_kind(EntityKind::Workstation), "Bench")
                .with_id("WS1")
                .under("D1"),
        )
        .unwrap();
        s.create(
            NewEntity::new(
                EntityAttributes::Device(DeviceAttributes {
                    imei: Some("123".into()),
                    sku: Some(String::new()),
                    tested: true,
                    ..Default::default()
                }),
                "Dev1",
            )
            .with_id("Dev1")
            .under("BIN1"),
        )
        .unwrap();
        s.create(
            NewEntity::new(EntityAttributes::Device(DeviceAttributes::default()), "Dev2")
                .with_id("Dev2")
                .under("BIN1"),
        )
        .unwrap();
        s
    }

    fn set_rule(s: &mut EntityStore, dept: &str, key: RuleKey, condition: RuleCondition) {
        let mut rules = *s.get(dept).unwrap().rules().unwrap();
        rules.set(key, condition);
        s.update_entity(dept, EntityPatch::rules(rules)).unwrap();
    }

    #[test]
    fn serialized_rule_blocks_device_with_imei() {
        let mut s = warehouse();
        assert_eq!(validate_move(&s, &ids(&["Dev1"]), &to("D1")), MoveCheck::Allowed);

        set_rule(&mut s, "D1", RuleKey::Serialized, RuleCondition::MustNotHave);
        match validate_move(&s, &ids(&["Dev1"]), &to("D1")) {
            MoveCheck::Blocked(b) => {
                assert_eq!(b.department_id, "D1");
                assert_eq!(b.department_name, "Receiving");
                assert_eq!(b.failed_device_ids, vec!["Dev1"]);
                assert_eq!(b.failed_rules[0].to_string(), "Must not be serialized");
            }
            other => panic!("expected blocked, got {:?}", other),
        }
    }

    #[test]
    fn tested_must_have_collects_failing_devices_only() {
        let mut s = warehouse();
        set_rule(&mut s, "D2", RuleKey::Tested, RuleCondition::MustHave);
        match validate_move(&s, &ids(&["Dev1", "Dev2"]), &to("BIN2")) {
            MoveCheck::Blocked(b) => {
                assert_eq!(b.department_id, "D2");
                assert_eq!(b.failed_device_ids, vec!["Dev2"]);
                assert_eq!(b.failed_rules.len(), 1);
                assert_eq!(b.to_string(), "Shipping requires: Must be tested (1 device(s))");
            }
            other => panic!("expected blocked, got {:?}", other),
        }
    }

    #[test]
    fn move_onto_current_parent_is_noop_even_when_rules_fail() {
        let mut s = warehouse();
        set_rule(&mut s, "D1", RuleKey::Tested, RuleCondition::MustHave);
        let check = validate_move(&s, &ids(&["Dev1", "Dev2"]), &to("BIN1"));
        assert_eq!(check, MoveCheck::NoOp);
        assert!(check.is_silent());
    }

    #[test]
    fn structural_rejection_is_not_silent() {
        let s = warehouse();
        let check = validate_move(&s, &ids(&["BIN2"]), &to("BIN1"));
        assert_eq!(check, MoveCheck::Rejected(MoveRejection::Structural));
        assert!(!check.is_silent());
        assert_eq!(MoveRejection::Structural.to_string(), "Cannot move these items here");
    }

    #[test]
    fn self_and_cycle_drops_are_silent_rejections() {
        let s = warehouse();
        let check = validate_move(&s, &ids(&["BIN1"]), &to("BIN1"));
        assert_eq!(check, MoveCheck::Rejected(MoveRejection::SelfDrop("BIN1".into())));
        assert!(check.is_silent());

        let check = validate_move(&s, &ids(&["D1"]), &to("BIN1"));
        assert_eq!(check, MoveCheck::Rejected(MoveRejection::Cycle("D1".into())));
        assert!(check.is_silent());

        let check = validate_move(&s, &[], &to("BIN1"));
        assert_eq!(check, MoveCheck::Rejected(MoveRejection::Empty));
        assert!(check.is_silent());
    }

    #[test]
    fn queue_targets() {
        let s = warehouse();
        let target = DropTarget::resolve(&s, "queue-WS1-Active", GroupingMode::None);
        assert_eq!(
            target,
            DropTarget::Queue {
                workstation_id: "WS1".into(),
                queue: Queue::Active
            }
        );
        assert_eq!(validate_move(&s, &ids(&["Dev1"]), &target), MoveCheck::Allowed);

        let bogus = DropTarget::Queue {
            workstation_id: "BIN1".into(),
            queue: Queue::Done,
        };
        assert!(matches!(
            validate_move(&s, &ids(&["Dev1"]), &bogus),
            MoveCheck::Rejected(MoveRejection::UnknownTarget(_))
        ));
    }

    #[test]
    fn stored_ids_shadow_queue_node_ids() {
        let mut s = warehouse();
        s.create(NewEntity::new(EntityAttributes::Bin, "Odd").with_id("queue-X-Done").under("D2"))
            .unwrap();
        let target = DropTarget::resolve(&s, "queue-X-Done", GroupingMode::None);
        assert_eq!(target, to("queue-X-Done"));
        assert_eq!(validate_move(&s, &ids(&["Dev2"]), &target), MoveCheck::Allowed);
    }

    #[test]
    fn group_node_target_drops_onto_container() {
        let s = warehouse();
        let target = DropTarget::resolve(&s, "virtual-group-No SKU-Dev1", GroupingMode::Sku);
        assert_eq!(target, to("BIN1"));
    }

    #[test]
    fn department_rules_off_is_allowed() {
        let s = warehouse();
        let rules = *s.get("D2").unwrap().rules().unwrap();
        assert_eq!(rules, DepartmentRules::default());
        assert_eq!(validate_move(&s, &ids(&["Dev2"]), &to("BIN2")), MoveCheck::Allowed);
    }
}
