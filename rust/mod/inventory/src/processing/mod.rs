//! Device processing: apply lab test results to devices in the store.
//!
//! Results live in an external service ([`TestResultsApi`]). A result is
//! marked processed there before anything is written locally, so a failed
//! call never leaves a half-processed device behind.

mod http;
mod inbox;

pub use http::{ApiError, HttpTestResults};
pub use inbox::{FetchTicket, ResultsInbox};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockroom_core::ServiceError;

use crate::model::{DevicePatch, EntityId, EntityPatch};
use crate::store::EntityStore;

/// One test run reported by the lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub imei: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_status: Option<String>,
    /// Free-form summary from the test station.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub created_at: String,
}

impl TestResult {
    /// Text written to the device's `test_result` attribute.
    pub fn result_text(&self) -> String {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        if self.summary.trim().is_empty() {
            verdict.to_string()
        } else {
            format!("{}: {}", verdict, self.summary.trim())
        }
    }

    fn device_patch(&self) -> DevicePatch {
        DevicePatch {
            tested: Some(true),
            sellable: Some(self.passed),
            test_result: Some(self.result_text()),
            grade: self.grade.clone(),
            lock_status: self.lock_status.clone(),
            ..Default::default()
        }
    }
}

/// The external test-results service.
#[async_trait::async_trait]
pub trait TestResultsApi: Send + Sync {
    /// Results not yet processed.
    async fn pending(&self) -> Result<Vec<TestResult>, ApiError>;

    async fn submit(&self, result: &TestResult) -> Result<TestResult, ApiError>;

    async fn mark_processed(&self, result_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

/// User-facing notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Discards every toast.
pub struct Silent;

impl Notifier for Silent {
    fn notify(&self, _toast: Toast) {}
}

/// Result of [`Processor::process_pending`].
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub processed: Vec<EntityId>,
    pub failed: Vec<(String, ServiceError)>,
}

pub struct Processor {
    api: Arc<dyn TestResultsApi>,
    notifier: Arc<dyn Notifier>,
}

impl Processor {
    pub fn new(api: Arc<dyn TestResultsApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, notifier }
    }

    /// Apply one result to the device with the same IMEI. Returns the
    /// device id.
    pub async fn process(
        &self,
        store: &mut EntityStore,
        result: &TestResult,
    ) -> Result<EntityId, ServiceError> {
        match self.try_process(store, result).await {
            Ok(id) => {
                self.toast(
                    ToastKind::Success,
                    format!("Processed {} ({})", result.imei, result.result_text()),
                );
                Ok(id)
            }
            Err(e) => {
                self.toast(ToastKind::Error, e.to_string());
                Err(e)
            }
        }
    }

    async fn try_process(
        &self,
        store: &mut EntityStore,
        result: &TestResult,
    ) -> Result<EntityId, ServiceError> {
        if result.processed {
            return Err(ServiceError::Conflict(format!(
                "test result '{}' is already processed",
                result.id
            )));
        }
        let device_id = store
            .find_device_by_imei(&result.imei)
            .map(|e| e.id.clone())
            .ok_or_else(|| ServiceError::not_found("device with IMEI", result.imei.trim()))?;

        self.api.mark_processed(&result.id).await.map_err(|e| {
            warn!("marking result {} processed failed: {}", result.id, e);
            ServiceError::from(e)
        })?;

        store.update_entity(&device_id, EntityPatch::device(result.device_patch()))?;
        info!("processed test result {} for device {}", result.id, device_id);
        Ok(device_id)
    }

    /// Fetch pending results and process each. One failure does not stop
    /// the rest.
    pub async fn process_pending(&self, store: &mut EntityStore) -> Result<ProcessReport, ServiceError> {
        let pending = match self.api.pending().await {
            Ok(p) => p,
            Err(e) => {
                warn!("fetching pending test results failed: {}", e);
                let err = ServiceError::from(e);
                self.toast(ToastKind::Error, err.to_string());
                return Err(err);
            }
        };
        let mut report = ProcessReport::default();
        for result in pending.iter().filter(|r| !r.processed) {
            match self.process(store, result).await {
                Ok(id) => report.processed.push(id),
                Err(e) => report.failed.push((result.id.clone(), e)),
            }
        }
        if pending.is_empty() {
            self.toast(ToastKind::Info, "No pending test results".to_string());
        }
        Ok(report)
    }

    fn toast(&self, kind: ToastKind, message: String) {
        self.notifier.notify(Toast { kind, message });
    }
}
