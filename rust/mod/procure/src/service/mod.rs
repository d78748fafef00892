pub mod item;
pub mod order;
pub mod vendor;

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use stockroom_core::{ServiceError, merge_patch, now_rfc3339};

use crate::model::{ItemDefinition, PurchaseOrder, Vendor, VendorSku};

pub use item::{ItemFilter, NewItem};
pub use order::{LinePatch, NewLine};
pub use vendor::NewVendor;

/// Procurement service over the item master, vendors and purchase orders.
///
/// Records are held in memory, keyed by their primary key; each
/// operation validates fully before it writes.
#[derive(Debug, Default)]
pub struct ProcureService {
    pub(crate) items: BTreeMap<String, ItemDefinition>,
    pub(crate) vendor_skus: BTreeMap<String, VendorSku>,
    pub(crate) vendors: BTreeMap<String, Vendor>,
    pub(crate) orders: BTreeMap<String, PurchaseOrder>,
    pub(crate) vendor_seq: u32,
    pub(crate) po_seq: u32,
}

impl ProcureService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a JSON merge-patch to a record. `protected` keys are dropped
    /// from the patch; `updatedAt` is set to now.
    pub(crate) fn apply_patch<T: Serialize + DeserializeOwned>(
        current: &T,
        patch: serde_json::Value,
        protected: &[&str],
    ) -> Result<T, ServiceError> {
        let mut json = serde_json::to_value(current)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut patch_filtered = patch;
        match patch_filtered.as_object_mut() {
            Some(obj) => {
                for key in protected {
                    obj.remove(*key);
                }
                obj.remove("createdAt");
                obj.insert("updatedAt".into(), serde_json::json!(now_rfc3339()));
            }
            None => return Err(ServiceError::Validation("patch must be a JSON object".into())),
        }

        merge_patch(&mut json, &patch_filtered);
        serde_json::from_value(json).map_err(|e| ServiceError::Validation(e.to_string()))
    }
}
