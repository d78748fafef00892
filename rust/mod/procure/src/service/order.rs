use rust_decimal::Decimal;
use tracing::{debug, info};

use stockroom_core::{ListParams, ListResult, ServiceError, now_rfc3339};

use super::ProcureService;
use crate::model::{PoStatus, PurchaseOrder, PurchaseOrderLine, checked_total};

/// Parameters for adding a line to a draft order.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub sku: String,
    pub qty: u32,
    pub unit_price: Decimal,
}

/// Changes to a draft line. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct LinePatch {
    pub qty: Option<u32>,
    pub unit_price: Option<Decimal>,
}

fn check_total(lines: &[PurchaseOrderLine]) -> Result<(), ServiceError> {
    match checked_total(lines) {
        Some(_) => Ok(()),
        None => Err(ServiceError::Validation("order total is out of range".into())),
    }
}

fn check_qty(qty: u32) -> Result<(), ServiceError> {
    if qty == 0 {
        return Err(ServiceError::Validation("quantity must be at least 1".into()));
    }
    Ok(())
}

fn check_price(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::Validation("unit price cannot be negative".into()));
    }
    Ok(())
}

impl ProcureService {
    pub fn create_order(
        &mut self,
        vendor_id: &str,
        notes: Option<String>,
    ) -> Result<PurchaseOrder, ServiceError> {
        let vendor = self.get_vendor(vendor_id)?;
        if !vendor.active {
            return Err(ServiceError::Validation(format!(
                "vendor '{}' is inactive",
                vendor.name
            )));
        }

        self.po_seq += 1;
        let now = now_rfc3339();
        let record = PurchaseOrder {
            po_number: format!("PO-{:05}", self.po_seq),
            vendor_id: vendor_id.to_string(),
            status: PoStatus::Draft,
            lines: Vec::new(),
            notes,
            next_line_no: 1,
            issued_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.orders.insert(record.po_number.clone(), record.clone());
        debug!("created {} for vendor {}", record.po_number, vendor.code);
        Ok(record)
    }

    pub fn get_order(&self, po_number: &str) -> Result<PurchaseOrder, ServiceError> {
        self.orders
            .get(po_number)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("purchase order", po_number))
    }

    /// Orders by PO number, optionally in one status. `q` matches the PO
    /// number and line SKUs.
    pub fn list_orders(
        &self,
        params: &ListParams,
        status: Option<PoStatus>,
    ) -> ListResult<PurchaseOrder> {
        let matched: Vec<PurchaseOrder> = self
            .orders
            .values()
            .filter(|po| status.is_none_or(|s| po.status == s))
            .filter(|po| {
                let mut fields: Vec<&str> = vec![po.po_number.as_str()];
                fields.extend(po.lines.iter().map(|l| l.sku.as_str()));
                params.matches(&fields)
            })
            .cloned()
            .collect();
        params.page(matched)
    }

    fn order_mut(&mut self, po_number: &str) -> Result<&mut PurchaseOrder, ServiceError> {
        self.orders
            .get_mut(po_number)
            .ok_or_else(|| ServiceError::not_found("purchase order", po_number))
    }

    fn draft_mut(&mut self, po_number: &str) -> Result<&mut PurchaseOrder, ServiceError> {
        let po = self.order_mut(po_number)?;
        if po.status != PoStatus::Draft {
            return Err(ServiceError::Validation(format!(
                "{} is {}; lines can only change while DRAFT",
                po_number, po.status
            )));
        }
        Ok(po)
    }

    // ── Lines ──

    /// Add a line for an active item. Returns the new line number.
    pub fn add_line(&mut self, po_number: &str, line: NewLine) -> Result<u32, ServiceError> {
        check_qty(line.qty)?;
        check_price(line.unit_price)?;
        let item = self.get_item(&line.sku)?;
        if !item.active {
            return Err(ServiceError::Validation(format!("item '{}' is inactive", item.sku)));
        }

        let po = self.draft_mut(po_number)?;
        let line_no = po.next_line_no.max(1);
        let mut lines = po.lines.clone();
        lines.push(PurchaseOrderLine {
            line_no,
            sku: item.sku,
            qty_ordered: line.qty,
            qty_received: 0,
            unit_price: line.unit_price,
        });
        check_total(&lines)?;
        po.lines = lines;
        po.next_line_no = line_no + 1;
        po.updated_at = now_rfc3339();
        Ok(line_no)
    }

    pub fn update_line(
        &mut self,
        po_number: &str,
        line_no: u32,
        patch: LinePatch,
    ) -> Result<PurchaseOrderLine, ServiceError> {
        if let Some(qty) = patch.qty {
            check_qty(qty)?;
        }
        if let Some(price) = patch.unit_price {
            check_price(price)?;
        }
        let po = self.draft_mut(po_number)?;
        let mut lines = po.lines.clone();
        let line = lines
            .iter_mut()
            .find(|l| l.line_no == line_no)
            .ok_or_else(|| ServiceError::not_found("line", &line_no.to_string()))?;
        if let Some(qty) = patch.qty {
            line.qty_ordered = qty;
        }
        if let Some(price) = patch.unit_price {
            line.unit_price = price;
        }
        let out = line.clone();
        check_total(&lines)?;
        po.lines = lines;
        po.updated_at = now_rfc3339();
        Ok(out)
    }

    pub fn remove_line(&mut self, po_number: &str, line_no: u32) -> Result<(), ServiceError> {
        let po = self.draft_mut(po_number)?;
        let before = po.lines.len();
        po.lines.retain(|l| l.line_no != line_no);
        if po.lines.len() == before {
            return Err(ServiceError::not_found("line", &line_no.to_string()));
        }
        po.updated_at = now_rfc3339();
        Ok(())
    }

    // ── Transitions ──

    /// Send a draft to the vendor. Needs at least one line.
    pub fn issue(&mut self, po_number: &str) -> Result<PurchaseOrder, ServiceError> {
        let po = self.draft_mut(po_number)?;
        if po.lines.is_empty() {
            return Err(ServiceError::Validation(format!("{} has no lines", po_number)));
        }
        let now = now_rfc3339();
        po.status = PoStatus::Issued;
        po.issued_at = Some(now.clone());
        po.updated_at = now;
        info!("{} issued, total {}", po_number, po.total());
        Ok(po.clone())
    }

    /// Record `qty` units received on a line. The first receipt moves the
    /// order to RECEIVING; receiving the last open unit moves it to DONE.
    pub fn receive(
        &mut self,
        po_number: &str,
        line_no: u32,
        qty: u32,
    ) -> Result<PurchaseOrder, ServiceError> {
        check_qty(qty)?;
        let po = self.order_mut(po_number)?;
        if !po.status.can_receive() {
            return Err(ServiceError::Validation(format!(
                "{} is {}; cannot receive",
                po_number, po.status
            )));
        }
        let line = po
            .line_mut(line_no)
            .ok_or_else(|| ServiceError::not_found("line", &line_no.to_string()))?;
        if qty > line.qty_open() {
            return Err(ServiceError::Validation(format!(
                "line {} has {} open; cannot receive {}",
                line_no,
                line.qty_open(),
                qty
            )));
        }
        line.qty_received += qty;

        let from = po.status;
        po.status = if po.is_fully_received() {
            PoStatus::Done
        } else {
            PoStatus::Receiving
        };
        po.updated_at = now_rfc3339();
        if po.status != from {
            info!("{} {} -> {}", po_number, from, po.status);
        }
        Ok(po.clone())
    }

    pub fn cancel(&mut self, po_number: &str) -> Result<PurchaseOrder, ServiceError> {
        let po = self.order_mut(po_number)?;
        if !po.status.can_cancel() {
            return Err(ServiceError::Validation(format!(
                "{} is {}; cannot cancel",
                po_number, po.status
            )));
        }
        po.status = PoStatus::Canceled;
        po.updated_at = now_rfc3339();
        info!("{} canceled", po_number);
        Ok(po.clone())
    }
}
