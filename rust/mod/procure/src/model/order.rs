use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Purchase order lifecycle.
///
/// Draft → Issued → Receiving → Done. Draft and Issued orders can be
/// canceled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoStatus {
    #[default]
    Draft,
    Issued,
    Receiving,
    Done,
    Canceled,
}

impl PoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoStatus::Draft => "DRAFT",
            PoStatus::Issued => "ISSUED",
            PoStatus::Receiving => "RECEIVING",
            PoStatus::Done => "DONE",
            PoStatus::Canceled => "CANCELED",
        }
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, PoStatus::Draft | PoStatus::Issued)
    }

    pub fn can_receive(&self) -> bool {
        matches!(self, PoStatus::Issued | PoStatus::Receiving)
    }
}

impl fmt::Display for PoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderLine {
    /// 1-based, unique within the order, never reused.
    pub line_no: u32,
    pub sku: String,
    pub qty_ordered: u32,
    #[serde(default)]
    pub qty_received: u32,
    pub unit_price: Decimal,
}

impl PurchaseOrderLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.qty_ordered)
    }

    /// `line_total`, or `None` when it does not fit a `Decimal`.
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.qty_ordered))
    }

    pub fn qty_open(&self) -> u32 {
        self.qty_ordered.saturating_sub(self.qty_received)
    }

    pub fn is_complete(&self) -> bool {
        self.qty_received >= self.qty_ordered
    }
}

/// Purchase order. Totals are derived from the lines, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub po_number: String,
    pub vendor_id: String,
    #[serde(default)]
    pub status: PoStatus,
    #[serde(default)]
    pub lines: Vec<PurchaseOrderLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub next_line_no: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Sum of line totals, or `None` on overflow.
pub fn checked_total(lines: &[PurchaseOrderLine]) -> Option<Decimal> {
    lines.iter().try_fold(Decimal::ZERO, |acc, l| {
        l.checked_line_total().and_then(|t| acc.checked_add(t))
    })
}

impl PurchaseOrder {
    /// Order value. The service rejects lines that would overflow it.
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(PurchaseOrderLine::line_total).sum()
    }

    pub fn units_ordered(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.qty_ordered)).sum()
    }

    pub fn units_received(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.qty_received)).sum()
    }

    pub fn line(&self, line_no: u32) -> Option<&PurchaseOrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub(crate) fn line_mut(&mut self, line_no: u32) -> Option<&mut PurchaseOrderLine> {
        self.lines.iter_mut().find(|l| l.line_no == line_no)
    }

    pub fn is_fully_received(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(PurchaseOrderLine::is_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(no: u32, qty: u32, cents: i64) -> PurchaseOrderLine {
        PurchaseOrderLine {
            line_no: no,
            sku: format!("SKU-{}", no),
            qty_ordered: qty,
            qty_received: 0,
            unit_price: Decimal::new(cents, 2),
        }
    }

    #[test]
    fn totals_are_derived() {
        let po = PurchaseOrder {
            po_number: "PO-00001".into(),
            vendor_id: "v1".into(),
            status: PoStatus::Draft,
            lines: vec![line(1, 3, 19999), line(2, 10, 450)],
            notes: None,
            next_line_no: 3,
            issued_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(po.total(), Decimal::new(64497, 2));
        assert_eq!(po.units_ordered(), 13);
        assert!(!po.is_fully_received());
        assert_eq!(checked_total(&po.lines), Some(po.total()));
    }

    #[test]
    fn overflowing_totals_are_detected() {
        let mut huge = line(1, 10, 0);
        huge.unit_price = Decimal::MAX;
        assert_eq!(huge.checked_line_total(), None);

        let mut half = line(2, 1, 0);
        half.unit_price = Decimal::MAX;
        assert_eq!(checked_total(&[half.clone()]), Some(Decimal::MAX));
        assert_eq!(checked_total(&[half.clone(), half]), None);
    }

    #[test]
    fn status_serde_uses_screaming_case() {
        assert_eq!(serde_json::to_string(&PoStatus::Receiving).unwrap(), "\"RECEIVING\"");
        assert!(PoStatus::Issued.can_cancel());
        assert!(!PoStatus::Receiving.can_cancel());
        assert!(!PoStatus::Draft.can_receive());
    }
}
