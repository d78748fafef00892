//! Virtual node projection: display-only groupings over device children.
//!
//! Nothing here writes to the store. Virtual ids are derived from the
//! grouping key and the first member (by id), so they stay stable across
//! renders as long as membership does not change.

use std::fmt;

use serde::{Deserialize, Serialize};

use stockroom_core::ServiceError;

use crate::model::{DeviceAttributes, Entity, EntityId, EntityKind, Queue};
use crate::store::EntityStore;

const GROUP_PREFIX: &str = "virtual-group-";
const QUEUE_PREFIX: &str = "queue-";

/// How device children of a container are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    #[default]
    None,
    Po,
    Sku,
    Presold,
    Processed,
}

impl GroupingMode {
    /// Bucket key for a device, or `None` when this mode does not group.
    pub fn key_for(&self, device: &DeviceAttributes) -> Option<String> {
        let key = match self {
            GroupingMode::None => return None,
            GroupingMode::Po => device.po_number().unwrap_or("No PO"),
            GroupingMode::Sku => device.sku().unwrap_or("No SKU"),
            GroupingMode::Presold => device.presold_order_number().unwrap_or("No Presold Order"),
            GroupingMode::Processed => {
                if device.sellable {
                    "Processed"
                } else {
                    "Not Processed"
                }
            }
        };
        Some(key.to_string())
    }
}

/// What a virtual node stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualKind {
    Group { mode: GroupingMode, key: String },
    Queue(Queue),
}

/// A display-only node. Never stored, never deletable itself; actions on
/// it apply to `member_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNode {
    pub id: String,
    pub parent_id: EntityId,
    pub kind: VirtualKind,
    pub member_ids: Vec<EntityId>,
}

impl VirtualNode {
    pub fn label(&self) -> String {
        match &self.kind {
            VirtualKind::Group { key, .. } => key.clone(),
            VirtualKind::Queue(q) => q.as_str().to_string(),
        }
    }

    pub fn queue(&self) -> Option<Queue> {
        match self.kind {
            VirtualKind::Queue(q) => Some(q),
            VirtualKind::Group { .. } => None,
        }
    }

    /// Members are always listed flat under a virtual node.
    pub fn child_mode(&self) -> GroupingMode {
        GroupingMode::None
    }
}

impl fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.member_ids.len())
    }
}

pub fn group_id(key: &str, first_member: &str) -> String {
    format!("{}{}-{}", GROUP_PREFIX, key, first_member)
}

pub fn queue_id(workstation_id: &str, queue: Queue) -> String {
    format!("{}{}-{}", QUEUE_PREFIX, workstation_id, queue.as_str())
}

pub fn is_virtual_id(id: &str) -> bool {
    id.starts_with(GROUP_PREFIX) || id.starts_with(QUEUE_PREFIX)
}

/// Split a queue node id into workstation id and queue.
pub fn parse_queue_id(id: &str) -> Option<(&str, Queue)> {
    let rest = id.strip_prefix(QUEUE_PREFIX)?;
    let (workstation, name) = rest.rsplit_once('-')?;
    Some((workstation, Queue::parse(name)?))
}

/// Children of one container as displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Children shown as themselves, in stored order.
    pub real_children: Vec<EntityId>,
    /// Virtual nodes, in first-member order (queues in lane order).
    pub groups: Vec<VirtualNode>,
}

impl Projection {
    pub fn find(&self, virtual_id: &str) -> Option<&VirtualNode> {
        self.groups.iter().find(|g| g.id == virtual_id)
    }
}

/// Project the children of `entity_id` under `mode`.
///
/// Workstations ignore `mode` and always show their four queues.
pub fn project(
    store: &EntityStore,
    entity_id: &str,
    mode: GroupingMode,
) -> Result<Projection, ServiceError> {
    let entity = store.require(entity_id)?;
    let children = store.children(entity_id);

    if entity.kind() == EntityKind::Workstation {
        return Ok(project_queues(entity, &children));
    }
    if mode == GroupingMode::None {
        return Ok(Projection {
            real_children: children.iter().map(|c| c.id.clone()).collect(),
            groups: Vec::new(),
        });
    }

    let mut real_children = Vec::new();
    let mut devices: Vec<(&Entity, &DeviceAttributes)> = Vec::new();
    for child in &children {
        match child.device() {
            Some(d) => devices.push((child, d)),
            None => real_children.push(child.id.clone()),
        }
    }
    devices.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    let mut groups: Vec<VirtualNode> = Vec::new();
    for (child, attrs) in devices {
        let Some(key) = mode.key_for(attrs) else {
            real_children.push(child.id.clone());
            continue;
        };
        match groups
            .iter_mut()
            .find(|g| matches!(&g.kind, VirtualKind::Group { key: k, .. } if *k == key))
        {
            Some(group) => group.member_ids.push(child.id.clone()),
            None => groups.push(VirtualNode {
                id: group_id(&key, &child.id),
                parent_id: entity_id.to_string(),
                kind: VirtualKind::Group { mode, key },
                member_ids: vec![child.id.clone()],
            }),
        }
    }

    Ok(Projection {
        real_children,
        groups,
    })
}

fn project_queues(workstation: &Entity, children: &[&Entity]) -> Projection {
    let mut groups: Vec<VirtualNode> = Queue::ALL
        .into_iter()
        .map(|q| VirtualNode {
            id: queue_id(&workstation.id, q),
            parent_id: workstation.id.clone(),
            kind: VirtualKind::Queue(q),
            member_ids: Vec::new(),
        })
        .collect();
    let mut real_children = Vec::new();

    let mut devices: Vec<&Entity> = Vec::new();
    for child in children {
        if child.is_device() {
            devices.push(child);
        } else {
            real_children.push(child.id.clone());
        }
    }
    devices.sort_by(|a, b| a.id.cmp(&b.id));

    for device in devices {
        let lane = device
            .device()
            .map(|d| d.effective_queue())
            .unwrap_or(Queue::Assigned);
        if let Some(group) = groups.iter_mut().find(|g| g.queue() == Some(lane)) {
            group.member_ids.push(device.id.clone());
        }
    }

    Projection {
        real_children,
        groups,
    }
}

/// Find the virtual node `virtual_id` as projected under `mode`.
pub fn resolve_virtual(
    store: &EntityStore,
    virtual_id: &str,
    mode: GroupingMode,
) -> Option<VirtualNode> {
    if let Some((workstation, _)) = parse_queue_id(virtual_id) {
        return project(store, workstation, mode).ok()?.find(virtual_id).cloned();
    }
    let rest = virtual_id.strip_prefix(GROUP_PREFIX)?;
    // The anchor is the first member; its parent owns the group.
    store
        .entities()
        .filter(|e| e.is_device() && rest.ends_with(&format!("-{}", e.id)))
        .filter_map(|e| e.parent_id.as_deref())
        .find_map(|parent| project(store, parent, mode).ok()?.find(virtual_id).cloned())
}

/// Replace virtual ids in a selection with their member ids. Real ids
/// pass through; unknown ids are dropped; duplicates are removed.
pub fn expand_selection(store: &EntityStore, ids: &[String], mode: GroupingMode) -> Vec<EntityId> {
    let mut out: Vec<EntityId> = Vec::new();
    let mut push = |id: &str| {
        if !out.iter().any(|x| x == id) {
            out.push(id.to_string());
        }
    };
    for id in ids {
        if store.contains(id) {
            push(id);
        } else if is_virtual_id(id) {
            if let Some(node) = resolve_virtual(store, id, mode) {
                for m in &node.member_ids {
                    push(m);
                }
            }
        }
    }
    out
}
