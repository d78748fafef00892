use tracing::debug;

use stockroom_core::{ListParams, ListResult, ServiceError, new_id, now_rfc3339};

use super::ProcureService;
use crate::model::{Vendor, vendor_initials};

/// Parameters for creating a vendor.
#[derive(Debug, Clone, Default)]
pub struct NewVendor {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl ProcureService {
    /// Create a vendor with a generated code: name initials plus a
    /// running number (`APS-001`).
    pub fn create_vendor(&mut self, input: NewVendor) -> Result<Vendor, ServiceError> {
        let name = input.name.trim().to_string();
        let initials = vendor_initials(&name);
        if initials.is_empty() {
            return Err(ServiceError::Validation("vendor name is required".into()));
        }
        if self.vendor_by_name(&name).is_some() {
            return Err(ServiceError::Conflict(format!("vendor '{}' already exists", name)));
        }

        self.vendor_seq += 1;
        let now = now_rfc3339();
        let record = Vendor {
            id: new_id(),
            code: format!("{}-{:03}", initials, self.vendor_seq),
            name,
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            notes: input.notes,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        };
        self.vendors.insert(record.id.clone(), record.clone());
        debug!("created vendor {} ({})", record.code, record.name);
        Ok(record)
    }

    pub fn get_vendor(&self, id: &str) -> Result<Vendor, ServiceError> {
        self.vendors
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("vendor", id))
    }

    pub fn vendor_by_name(&self, name: &str) -> Option<&Vendor> {
        let name = name.trim();
        self.vendors
            .values()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Merge-patch a vendor. Id and code are fixed.
    pub fn update_vendor(&mut self, id: &str, patch: serde_json::Value) -> Result<Vendor, ServiceError> {
        let current = self.get_vendor(id)?;
        let mut updated: Vendor = Self::apply_patch(&current, patch, &["id", "code"])?;
        updated.name = updated.name.trim().to_string();
        if updated.name.is_empty() {
            return Err(ServiceError::Validation("vendor name is required".into()));
        }
        if let Some(other) = self.vendor_by_name(&updated.name) {
            if other.id != id {
                return Err(ServiceError::Conflict(format!(
                    "vendor '{}' already exists",
                    updated.name
                )));
            }
        }
        self.vendors.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Vendors ordered by code. `q` matches name and code.
    pub fn list_vendors(&self, params: &ListParams) -> ListResult<Vendor> {
        let mut matched: Vec<Vendor> = self
            .vendors
            .values()
            .filter(|v| params.matches(&[v.name.as_str(), v.code.as_str()]))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.code.cmp(&b.code));
        params.page(matched)
    }
}
