use serde::{Deserialize, Serialize};

use super::queue::{self, Queue};

/// Attributes carried by a Device entity.
///
/// Optional text fields treat `None` and the empty string alike; use the
/// accessors rather than reading the options directly when the
/// distinction matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DeviceAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imei: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presold_order_number: Option<String>,
    #[serde(deserialize_with = "queue::lenient", skip_serializing_if = "Option::is_none")]
    pub queue: Option<Queue>,
    pub tested: bool,
    pub sellable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_result: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl DeviceAttributes {
    pub fn sku(&self) -> Option<&str> {
        present(&self.sku)
    }

    pub fn imei(&self) -> Option<&str> {
        present(&self.imei)
    }

    pub fn po_number(&self) -> Option<&str> {
        present(&self.po_number)
    }

    pub fn presold_order_number(&self) -> Option<&str> {
        present(&self.presold_order_number)
    }

    /// A device is serialized when it carries an IMEI or a serial number.
    pub fn is_serialized(&self) -> bool {
        present(&self.imei).is_some() || present(&self.serial_number).is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        present(&self.lock_status).is_some_and(|s| s.eq_ignore_ascii_case("unlocked"))
    }

    pub fn is_grade_a(&self) -> bool {
        present(&self.grade).is_some_and(|g| g.eq_ignore_ascii_case("a"))
    }

    /// Lane inside a workstation; anything unrecognised counts as Assigned.
    pub fn effective_queue(&self) -> Queue {
        self.queue.unwrap_or(Queue::Assigned)
    }

    pub fn apply(&mut self, patch: DevicePatch) {
        let DevicePatch {
            sku,
            imei,
            serial_number,
            manufacturer,
            model,
            capacity,
            color,
            carrier,
            po_number,
            presold_order_number,
            queue,
            tested,
            sellable,
            grade,
            lock_status,
            test_result,
        } = patch;

        set_text(&mut self.sku, sku);
        set_text(&mut self.imei, imei);
        set_text(&mut self.serial_number, serial_number);
        set_text(&mut self.manufacturer, manufacturer);
        set_text(&mut self.model, model);
        set_text(&mut self.capacity, capacity);
        set_text(&mut self.color, color);
        set_text(&mut self.carrier, carrier);
        set_text(&mut self.po_number, po_number);
        set_text(&mut self.presold_order_number, presold_order_number);
        set_text(&mut self.grade, grade);
        set_text(&mut self.lock_status, lock_status);
        set_text(&mut self.test_result, test_result);
        if let Some(q) = queue {
            self.queue = q;
        }
        if let Some(t) = tested {
            self.tested = t;
        }
        if let Some(s) = sellable {
            self.sellable = s;
        }
    }
}

// Empty strings clear the field.
fn set_text(field: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *field = if v.trim().is_empty() { None } else { Some(v) };
    }
}

/// Partial update of device attributes. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DevicePatch {
    pub sku: Option<String>,
    pub imei: Option<String>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub capacity: Option<String>,
    pub color: Option<String>,
    pub carrier: Option<String>,
    pub po_number: Option<String>,
    pub presold_order_number: Option<String>,
    /// `Some(None)` clears the lane.
    pub queue: Option<Option<Queue>>,
    pub tested: Option<bool>,
    pub sellable: Option<bool>,
    pub grade: Option<String>,
    pub lock_status: Option<String>,
    pub test_result: Option<String>,
}
