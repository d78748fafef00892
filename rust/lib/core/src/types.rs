use serde::{Deserialize, Serialize};

/// Paging and free-text query for catalog listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    /// Page size, capped at 500 by [`ListParams::page`].
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,

    /// Free-text query, matched case-insensitively.
    #[serde(default)]
    pub q: Option<String>,
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            q: None,
        }
    }
}

impl ListParams {
    /// Whether any of `fields` contains `q`, ignoring case. A missing or
    /// blank query matches everything.
    pub fn matches(&self, fields: &[&str]) -> bool {
        match self.q.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(q) => {
                let q = q.to_lowercase();
                fields.iter().any(|f| f.to_lowercase().contains(&q))
            }
        }
    }

    /// Apply offset/limit to an already filtered, ordered sequence.
    pub fn page<T: Serialize>(&self, items: Vec<T>) -> ListResult<T> {
        let total = items.len();
        let items = items
            .into_iter()
            .skip(self.offset)
            .take(self.limit.min(500))
            .collect();
        ListResult { items, total }
    }
}

/// One page of records plus the count before paging.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Fresh record id: 32 lowercase hex digits.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Current UTC time for `createdAt` / `updatedAt` stamps.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// RFC 7386 merge: `null` removes a key, objects merge recursively,
/// anything else replaces.
pub fn merge_patch(base: &mut serde_json::Value, patch: &serde_json::Value) {
    let (Some(target), Some(changes)) = (base.as_object_mut(), patch.as_object()) else {
        *base = patch.clone();
        return;
    };
    for (key, value) in changes {
        match value {
            serde_json::Value::Null => {
                target.remove(key);
            }
            serde_json::Value::Object(_) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| serde_json::json!({}));
                merge_patch(slot, value);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
