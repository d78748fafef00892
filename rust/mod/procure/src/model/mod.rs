pub mod item;
pub mod order;
pub mod vendor;

pub use item::{ItemDefinition, VendorSku};
pub use order::{PoStatus, PurchaseOrder, PurchaseOrderLine, checked_total};
pub use vendor::{Vendor, vendor_initials};
