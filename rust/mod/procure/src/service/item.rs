use tracing::{debug, info};

use stockroom_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};

use super::ProcureService;
use crate::model::{ItemDefinition, VendorSku};
use crate::sku::{SkuParts, generate_sku, normalize_sku, unique_sku};

/// Parameters for creating an item definition.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    /// Explicit SKU; generated from the attributes when `None`.
    pub sku: Option<String>,
    pub category: String,
    pub manufacturer: String,
    pub model: String,
    pub grade: String,
    pub serialized: bool,
    pub capacity: Option<String>,
    pub color: Option<String>,
    pub carrier: Option<String>,
    pub lock_status: Option<String>,
}

impl NewItem {
    fn sku_parts(&self) -> SkuParts {
        SkuParts {
            category: self.category.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            capacity: self.capacity.clone(),
            color: self.color.clone(),
            grade: self.grade.clone(),
        }
    }
}

/// Query filters for listing items.
#[derive(Debug, Default)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub active: Option<bool>,
    pub serialized: Option<bool>,
}

impl ItemFilter {
    fn accepts(&self, item: &ItemDefinition) -> bool {
        let text_eq = |want: &Option<String>, have: &str| {
            want.as_deref()
                .is_none_or(|w| w.trim().eq_ignore_ascii_case(have.trim()))
        };
        text_eq(&self.category, &item.category)
            && text_eq(&self.manufacturer, &item.manufacturer)
            && self.active.is_none_or(|a| item.active == a)
            && self.serialized.is_none_or(|s| item.serialized == s)
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

impl ProcureService {
    pub fn create_item(&mut self, input: NewItem) -> Result<ItemDefinition, ServiceError> {
        require_text("category", &input.category)?;
        require_text("manufacturer", &input.manufacturer)?;
        require_text("model", &input.model)?;

        let sku = match input.sku.as_deref().map(normalize_sku) {
            Some(sku) if !sku.is_empty() => {
                if self.items.contains_key(&sku) {
                    return Err(ServiceError::Conflict(format!("sku '{}' already exists", sku)));
                }
                sku
            }
            _ => {
                let base = generate_sku(&input.sku_parts())?;
                unique_sku(&base, |s| self.items.contains_key(s))
            }
        };

        let now = now_rfc3339();
        let record = ItemDefinition {
            sku: sku.clone(),
            category: input.category.trim().to_string(),
            manufacturer: input.manufacturer.trim().to_string(),
            model: input.model.trim().to_string(),
            grade: input.grade.trim().to_string(),
            serialized: input.serialized,
            active: true,
            capacity: input.capacity,
            color: input.color,
            carrier: input.carrier,
            lock_status: input.lock_status,
            vendor_sku_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.items.insert(sku.clone(), record.clone());
        debug!("created item {}", sku);
        Ok(record)
    }

    pub fn get_item(&self, sku: &str) -> Result<ItemDefinition, ServiceError> {
        self.items
            .get(sku)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("item", sku))
    }

    /// Items ordered by SKU. `q` matches sku, manufacturer and model.
    pub fn list_items(&self, params: &ListParams, filter: &ItemFilter) -> ListResult<ItemDefinition> {
        let matched: Vec<ItemDefinition> = self
            .items
            .values()
            .filter(|i| filter.accepts(i))
            .filter(|i| params.matches(&[i.sku.as_str(), i.manufacturer.as_str(), i.model.as_str()]))
            .cloned()
            .collect();
        params.page(matched)
    }

    /// Merge-patch an item. The SKU cannot change.
    pub fn update_item(
        &mut self,
        sku: &str,
        patch: serde_json::Value,
    ) -> Result<ItemDefinition, ServiceError> {
        let current = self.get_item(sku)?;
        if let Some(requested) = patch.get("sku").and_then(|v| v.as_str()) {
            if requested != sku {
                return Err(ServiceError::Validation(format!(
                    "sku of '{}' cannot be changed",
                    sku
                )));
            }
        }
        let updated: ItemDefinition = Self::apply_patch(&current, patch, &["sku", "vendorSkuIds"])?;
        require_text("category", &updated.category)?;
        require_text("manufacturer", &updated.manufacturer)?;
        require_text("model", &updated.model)?;

        self.items.insert(sku.to_string(), updated.clone());
        debug!("updated item {}", sku);
        Ok(updated)
    }

    pub fn set_item_active(&mut self, sku: &str, active: bool) -> Result<ItemDefinition, ServiceError> {
        let item = self
            .items
            .get_mut(sku)
            .ok_or_else(|| ServiceError::not_found("item", sku))?;
        if item.active != active {
            item.active = active;
            item.updated_at = now_rfc3339();
            info!("item {} {}", sku, if active { "activated" } else { "deactivated" });
        }
        Ok(item.clone())
    }

    // ── Vendor SKUs ──

    /// Link a vendor's part number to an item. The (vendor, code) pair is
    /// unique within the item's links, ignoring case.
    pub fn link_vendor_sku(
        &mut self,
        sku: &str,
        vendor_name: &str,
        vendor_sku: &str,
    ) -> Result<VendorSku, ServiceError> {
        require_text("vendor name", vendor_name)?;
        require_text("vendor sku", vendor_sku)?;
        let item = self
            .items
            .get(sku)
            .ok_or_else(|| ServiceError::not_found("item", sku))?;
        let duplicate = item
            .vendor_sku_ids
            .iter()
            .filter_map(|id| self.vendor_skus.get(id))
            .any(|v| v.same_code(vendor_name, vendor_sku));
        if duplicate {
            return Err(ServiceError::Conflict(format!(
                "{} code '{}' is already linked to '{}'",
                vendor_name.trim(),
                vendor_sku.trim(),
                sku
            )));
        }

        let link = VendorSku {
            id: new_id(),
            vendor_name: vendor_name.trim().to_string(),
            vendor_sku: vendor_sku.trim().to_string(),
            sku: sku.to_string(),
        };
        self.vendor_skus.insert(link.id.clone(), link.clone());
        if let Some(item) = self.items.get_mut(sku) {
            item.vendor_sku_ids.push(link.id.clone());
            item.updated_at = now_rfc3339();
        }
        debug!("linked {} {} to {}", link.vendor_name, link.vendor_sku, sku);
        Ok(link)
    }

    pub fn unlink_vendor_sku(&mut self, sku: &str, vendor_sku_id: &str) -> Result<(), ServiceError> {
        let item = self
            .items
            .get_mut(sku)
            .ok_or_else(|| ServiceError::not_found("item", sku))?;
        let Some(pos) = item.vendor_sku_ids.iter().position(|id| id == vendor_sku_id) else {
            return Err(ServiceError::not_found("vendor sku", vendor_sku_id));
        };
        item.vendor_sku_ids.remove(pos);
        item.updated_at = now_rfc3339();
        self.vendor_skus.remove(vendor_sku_id);
        Ok(())
    }

    pub fn vendor_skus_of(&self, sku: &str) -> Result<Vec<VendorSku>, ServiceError> {
        let item = self
            .items
            .get(sku)
            .ok_or_else(|| ServiceError::not_found("item", sku))?;
        Ok(item
            .vendor_sku_ids
            .iter()
            .filter_map(|id| self.vendor_skus.get(id))
            .cloned()
            .collect())
    }

    /// Resolve a vendor's code to our item.
    pub fn find_by_vendor_sku(&self, vendor_name: &str, vendor_sku: &str) -> Option<ItemDefinition> {
        self.vendor_skus
            .values()
            .find(|v| v.same_code(vendor_name, vendor_sku))
            .and_then(|v| self.items.get(&v.sku))
            .cloned()
    }
}
