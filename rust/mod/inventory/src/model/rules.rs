use std::fmt;

use serde::{Deserialize, Serialize};

use super::device::DeviceAttributes;

/// Condition a department places on one device attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCondition {
    #[default]
    Off,
    MustHave,
    MustNotHave,
}

impl RuleCondition {
    /// Whether a device with (`true`) or without (`false`) the attribute
    /// satisfies this condition.
    pub fn admits(&self, has_attribute: bool) -> bool {
        match self {
            RuleCondition::Off => true,
            RuleCondition::MustHave => has_attribute,
            RuleCondition::MustNotHave => !has_attribute,
        }
    }
}

/// Device attribute a department rule can be keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKey {
    Tested,
    Sellable,
    Serialized,
}

impl RuleKey {
    pub const ALL: [RuleKey; 3] = [RuleKey::Tested, RuleKey::Sellable, RuleKey::Serialized];

    /// Whether the device carries the attribute this key names.
    pub fn holds_for(&self, device: &DeviceAttributes) -> bool {
        match self {
            RuleKey::Tested => device.tested,
            RuleKey::Sellable => device.sellable,
            RuleKey::Serialized => device.is_serialized(),
        }
    }

    fn adjective(&self) -> &'static str {
        match self {
            RuleKey::Tested => "tested",
            RuleKey::Sellable => "sellable",
            RuleKey::Serialized => "serialized",
        }
    }
}

/// Per-department admission rules for devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentRules {
    pub tested: RuleCondition,
    pub sellable: RuleCondition,
    pub serialized: RuleCondition,
}

impl DepartmentRules {
    pub fn condition(&self, key: RuleKey) -> RuleCondition {
        match key {
            RuleKey::Tested => self.tested,
            RuleKey::Sellable => self.sellable,
            RuleKey::Serialized => self.serialized,
        }
    }

    pub fn set(&mut self, key: RuleKey, condition: RuleCondition) {
        match key {
            RuleKey::Tested => self.tested = condition,
            RuleKey::Sellable => self.sellable = condition,
            RuleKey::Serialized => self.serialized = condition,
        }
    }

    pub fn is_off(&self) -> bool {
        RuleKey::ALL
            .iter()
            .all(|k| self.condition(*k) == RuleCondition::Off)
    }

    /// Rules the device violates, in `RuleKey::ALL` order.
    pub fn violations(&self, device: &DeviceAttributes) -> Vec<RuleViolation> {
        RuleKey::ALL
            .into_iter()
            .filter_map(|key| {
                let condition = self.condition(key);
                if condition.admits(key.holds_for(device)) {
                    None
                } else {
                    Some(RuleViolation { key, condition })
                }
            })
            .collect()
    }
}

/// A failed department rule, used for blocking-dialog messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleViolation {
    pub key: RuleKey,
    pub condition: RuleCondition,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.condition {
            RuleCondition::MustNotHave => write!(f, "Must not be {}", self.key.adjective()),
            _ => write!(f, "Must be {}", self.key.adjective()),
        }
    }
}
