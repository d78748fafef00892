use std::fmt;

use serde::{Deserialize, Serialize};

use super::device::{DeviceAttributes, DevicePatch};
use super::queue::Queue;
use super::rules::DepartmentRules;

pub type EntityId = String;

/// Kind of a node in the warehouse hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Department,
    Bin,
    Box,
    Workstation,
    Device,
}

impl EntityKind {
    /// Kinds this kind may be placed under. An empty list means the kind
    /// lives at the root.
    pub fn allowed_parents(&self) -> &'static [EntityKind] {
        use EntityKind::*;
        match self {
            Department => &[],
            Bin => &[Department],
            Workstation => &[Department],
            Box => &[Department, Bin, Workstation],
            Device => &[Department, Bin, Box, Workstation],
        }
    }

    /// Whether an entity of this kind may be a child of `parent`
    /// (`None` = root).
    pub fn can_be_child_of(&self, parent: Option<EntityKind>) -> bool {
        match parent {
            None => self.allowed_parents().is_empty(),
            Some(p) => self.allowed_parents().contains(&p),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Department => "Department",
            EntityKind::Bin => "Bin",
            EntityKind::Box => "Box",
            EntityKind::Workstation => "Workstation",
            EntityKind::Device => "Device",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workstation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkstationAttributes {
    /// Configured lanes; the first one receives devices dropped on the
    /// workstation itself.
    pub queues: Vec<Queue>,
}

impl WorkstationAttributes {
    pub fn with_all_queues() -> Self {
        Self {
            queues: Queue::ALL.to_vec(),
        }
    }

    pub fn default_queue(&self) -> Option<Queue> {
        self.queues.first().copied()
    }
}

/// Kind-specific attributes. The variant determines the entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "attributes")]
pub enum EntityAttributes {
    Department(DepartmentRules),
    Bin,
    Box,
    Workstation(WorkstationAttributes),
    Device(DeviceAttributes),
}

impl EntityAttributes {
    /// Fresh attributes for a newly added entity of `kind`.
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Department => EntityAttributes::Department(DepartmentRules::default()),
            EntityKind::Bin => EntityAttributes::Bin,
            EntityKind::Box => EntityAttributes::Box,
            EntityKind::Workstation => {
                EntityAttributes::Workstation(WorkstationAttributes::with_all_queues())
            }
            EntityKind::Device => EntityAttributes::Device(DeviceAttributes::default()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityAttributes::Department(_) => EntityKind::Department,
            EntityAttributes::Bin => EntityKind::Bin,
            EntityAttributes::Box => EntityKind::Box,
            EntityAttributes::Workstation(_) => EntityKind::Workstation,
            EntityAttributes::Device(_) => EntityKind::Device,
        }
    }
}

/// A node in the warehouse hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub children: Vec<EntityId>,
    #[serde(flatten)]
    pub attributes: EntityAttributes,
    pub created_at: String,
    pub updated_at: String,
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        self.attributes.kind()
    }

    pub fn is_device(&self) -> bool {
        matches!(self.attributes, EntityAttributes::Device(_))
    }

    pub fn device(&self) -> Option<&DeviceAttributes> {
        match &self.attributes {
            EntityAttributes::Device(d) => Some(d),
            _ => None,
        }
    }

    pub fn device_mut(&mut self) -> Option<&mut DeviceAttributes> {
        match &mut self.attributes {
            EntityAttributes::Device(d) => Some(d),
            _ => None,
        }
    }

    pub fn workstation(&self) -> Option<&WorkstationAttributes> {
        match &self.attributes {
            EntityAttributes::Workstation(w) => Some(w),
            _ => None,
        }
    }

    pub fn rules(&self) -> Option<&DepartmentRules> {
        match &self.attributes {
            EntityAttributes::Department(r) => Some(r),
            _ => None,
        }
    }
}

/// Input for creating an entity with explicit attributes.
#[derive(Debug, Clone)]
pub struct NewEntity {
    /// Caller-chosen id; generated when `None`.
    pub id: Option<EntityId>,
    pub label: String,
    pub barcode: Option<String>,
    pub parent_id: Option<EntityId>,
    pub attributes: EntityAttributes,
}

impl NewEntity {
    pub fn new(attributes: EntityAttributes, label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            barcode: None,
            parent_id: None,
            attributes,
        }
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn under(mut self, parent_id: impl Into<EntityId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }
}

/// Partial update of an entity. Kind-specific sections must match the
/// entity's kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityPatch {
    pub label: Option<String>,
    /// `Some(None)` clears the barcode.
    pub barcode: Option<Option<String>>,
    pub device: Option<DevicePatch>,
    pub queues: Option<Vec<Queue>>,
    pub rules: Option<DepartmentRules>,
}

impl EntityPatch {
    pub fn device(patch: DevicePatch) -> Self {
        Self {
            device: Some(patch),
            ..Default::default()
        }
    }

    pub fn rules(rules: DepartmentRules) -> Self {
        Self {
            rules: Some(rules),
            ..Default::default()
        }
    }
}
