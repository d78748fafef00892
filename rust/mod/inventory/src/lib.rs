//! Warehouse explorer core.
//!
//! An id-keyed [`EntityStore`] holds the Department / Bin / Box /
//! Workstation / Device hierarchy. Around it:
//!
//! - [`hierarchy`]: search and quick-filter visibility, device counts
//! - [`grouping`]: display-only virtual nodes (SKU/PO/... groups, workstation queues)
//! - [`validator`] and [`executor`]: drag/drop move checks, confirmation, undo
//! - [`drag`] and [`selection`]: transient drag state, visible rows, range select
//! - [`processing`]: applying lab test results fetched over HTTP

pub mod config;
pub mod drag;
pub mod executor;
pub mod grouping;
pub mod hierarchy;
pub mod model;
pub mod processing;
pub mod selection;
pub mod store;
pub mod validator;

pub use config::{ExplorerConfig, ExplorerConfigPatch};
pub use drag::DragSession;
pub use executor::{MoveExecutor, MoveOutcome, MoveSummary};
pub use grouping::{GroupingMode, Projection, VirtualKind, VirtualNode, expand_selection, project};
pub use hierarchy::{DeviceFilter, SearchFilter, Traversal, Visibility};
pub use processing::{Notifier, Processor, TestResult, TestResultsApi, Toast, ToastKind};
pub use selection::{Row, flatten_visible, range_select};
pub use store::{BoxRequest, EntityStore, HistoryHandler, SubscriptionId};
pub use validator::{BlockedMove, DropTarget, MoveCheck, MoveRejection, validate_move};
