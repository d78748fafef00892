//! Procurement: item master with generated SKUs, vendor part numbers,
//! vendors and purchase orders.

pub mod model;
pub mod service;
pub mod sku;

pub use model::{ItemDefinition, PoStatus, PurchaseOrder, PurchaseOrderLine, Vendor, VendorSku};
pub use service::{ItemFilter, LinePatch, NewItem, NewLine, NewVendor, ProcureService};
pub use sku::{SkuParts, generate_sku};
