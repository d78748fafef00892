//! SKU generation.
//!
//! A SKU condenses the describing attributes of an item into an
//! upper-case, dash-separated code:
//!
//! ```text
//! Phone / Apple / iPhone 13 Pro / 128GB / Space Gray / A
//!   -> PHONE-APPLE-IPHONE13PRO-128GB-SPACEGRAY-A
//! ```
//!
//! Empty parts are skipped. When the code is taken, `-2`, `-3`, ... is
//! appended until it is free.

use stockroom_core::ServiceError;

/// Attributes a SKU is built from, in code order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkuParts {
    pub category: String,
    pub manufacturer: String,
    pub model: String,
    pub capacity: Option<String>,
    pub color: Option<String>,
    pub grade: String,
}

/// Upper-case a part and drop everything but letters and digits.
fn condense(part: &str) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Base code for `parts`, without collision suffix.
pub fn generate_sku(parts: &SkuParts) -> Result<String, ServiceError> {
    let segments: Vec<String> = [
        Some(parts.category.as_str()),
        Some(parts.manufacturer.as_str()),
        Some(parts.model.as_str()),
        parts.capacity.as_deref(),
        parts.color.as_deref(),
        Some(parts.grade.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(condense)
    .filter(|s| !s.is_empty())
    .collect();

    if segments.is_empty() {
        return Err(ServiceError::Validation(
            "cannot build a SKU from empty attributes".into(),
        ));
    }
    Ok(segments.join("-"))
}

/// First free code among `base`, `base-2`, `base-3`, ...
pub fn unique_sku(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Normalise a caller-supplied SKU the same way generated ones look.
pub fn normalize_sku(raw: &str) -> String {
    raw.trim()
        .split(|c: char| c == '-' || c.is_whitespace())
        .map(condense)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
