use tracing::{debug, warn};

use stockroom_core::ServiceError;

use super::{ApiError, TestResult, TestResultsApi};

/// Proof of a fetch started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// Latest list of pending results. Each fetch takes a ticket; a response
/// whose ticket is older than the newest fetch is dropped.
#[derive(Debug, Default)]
pub struct ResultsInbox {
    generation: u64,
    results: Vec<TestResult>,
    last_error: Option<ServiceError>,
}

impl ResultsInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket(self.generation)
    }

    /// Apply a fetch response. Returns false when the ticket is stale.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        response: Result<Vec<TestResult>, ApiError>,
    ) -> bool {
        if ticket.0 != self.generation {
            debug!(
                "dropping stale test results (ticket {}, current {})",
                ticket.0, self.generation
            );
            return false;
        }
        match response {
            Ok(results) => {
                self.results = results;
                self.last_error = None;
            }
            Err(e) => {
                warn!("test results fetch failed: {}", e);
                self.last_error = Some(e.into());
            }
        }
        true
    }

    /// Fetch and apply in one step.
    pub async fn refresh(&mut self, api: &dyn TestResultsApi) -> bool {
        let ticket = self.begin_fetch();
        let response = api.pending().await;
        self.complete(ticket, response)
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn last_error(&self) -> Option<&ServiceError> {
        self.last_error.as_ref()
    }

    /// Forget a result once it has been processed locally.
    pub fn remove(&mut self, result_id: &str) {
        self.results.retain(|r| r.id != result_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: &str) -> TestResult {
        TestResult {
            id: id.into(),
            imei: "1".into(),
            passed: true,
            grade: None,
            lock_status: None,
            summary: String::new(),
            processed: false,
            created_at: String::new(),
        }
    }

    #[test]
    fn stale_responses_are_ignored() {
        let mut inbox = ResultsInbox::new();
        let first = inbox.begin_fetch();
        let second = inbox.begin_fetch();

        assert!(inbox.complete(second, Ok(vec![r("new")])));
        assert!(!inbox.complete(first, Ok(vec![r("old")])));
        assert_eq!(inbox.results().len(), 1);
        assert_eq!(inbox.results()[0].id, "new");
    }

    #[test]
    fn errors_keep_previous_results() {
        let mut inbox = ResultsInbox::new();
        let t = inbox.begin_fetch();
        inbox.complete(t, Ok(vec![r("a"), r("b")]));

        let t = inbox.begin_fetch();
        let applied = inbox.complete(
            t,
            Err(ApiError::Server {
                status: 500,
                message: "boom".into(),
            }),
        );
        assert!(applied);
        assert_eq!(inbox.results().len(), 2);
        assert_eq!(inbox.last_error().unwrap().error_code(), "UPSTREAM");

        inbox.remove("a");
        assert_eq!(inbox.results()[0].id, "b");
    }
}
