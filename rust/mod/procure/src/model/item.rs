use serde::{Deserialize, Serialize};

/// The catalog record a SKU stands for.
/// Primary key is `sku`, fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    pub sku: String,

    /// Product family (e.g. "Phone", "Tablet").
    pub category: String,

    pub manufacturer: String,

    pub model: String,

    /// Cosmetic grade (e.g. "A", "B").
    #[serde(default)]
    pub grade: String,

    /// Units of this item carry an IMEI or serial number.
    #[serde(default)]
    pub serialized: bool,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_status: Option<String>,

    /// Linked [`VendorSku`] ids.
    #[serde(default)]
    pub vendor_sku_ids: Vec<String>,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub updated_at: String,
}

fn default_true() -> bool {
    true
}

/// A vendor's own part number for one of our items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VendorSku {
    pub id: String,
    pub vendor_name: String,
    pub vendor_sku: String,
    /// Item this code maps to.
    pub sku: String,
}

impl VendorSku {
    /// Same vendor and code, ignoring case and surrounding whitespace.
    pub fn same_code(&self, vendor_name: &str, vendor_sku: &str) -> bool {
        self.vendor_name.trim().eq_ignore_ascii_case(vendor_name.trim())
            && self.vendor_sku.trim().eq_ignore_ascii_case(vendor_sku.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_defaults_to_active() {
        let item: ItemDefinition = serde_json::from_str(
            r#"{"sku":"PHONE-APPLE-IPHONE13","category":"Phone","manufacturer":"Apple","model":"iPhone 13"}"#,
        )
        .unwrap();
        assert!(item.active);
        assert!(!item.serialized);
        assert!(item.vendor_sku_ids.is_empty());
    }

    #[test]
    fn vendor_code_match_ignores_case() {
        let v = VendorSku {
            id: "1".into(),
            vendor_name: "Apple Parts Supply".into(),
            vendor_sku: "ap-13-128".into(),
            sku: "X".into(),
        };
        assert!(v.same_code("apple parts supply ", "AP-13-128"));
        assert!(!v.same_code("Apple Parts Supply", "AP-13-256"));
    }
}
