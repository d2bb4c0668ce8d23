//! Analysis dispatcher
//!
//! Sends transactions to the remote analysis service once and resolves the
//! reply along one of three paths:
//!
//! - **Direct**: the reply carries insights, which are validated and returned.
//! - **Polling**: the reply carries a correlation id; the status endpoint is
//!   queried once per tick until the job completes or is cancelled. There is
//!   no attempt ceiling, callers bound the wait with a `CancelToken`.
//! - **Fallback**: transport errors, HTTP errors and malformed replies are
//!   answered by the local metrics engine.
//!
//! Empty input is rejected with `AnalysisError::NoData` before any request.
//!
//! # Architecture
//!
//! - `AnalysisTransport` trait: the remote service seam (`HttpTransport` in production)
//! - `Clock` trait: poll delays (`TokioClock` in production)
//! - `CancelToken`: caller-owned cancellation, combined with the dispatcher's
//!   own per-job token so a new `analyze` or `clear` stops the previous loop

pub mod timing;
pub mod transport;

pub use timing::{either_cancelled, CancelToken, Clock, TokioClock};
pub use transport::{
    interpret_dispatch, interpret_status, AnalysisTransport, DispatchReply, DispatchRequest,
    HttpTransport, StatusReply,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::error::AnalysisError;
use crate::local::compute_locally;
use crate::models::{JobStatus, ResultSource, Transaction};
use crate::result::AnalysisResult;

/// One dispatch-to-completion attempt
#[derive(Debug)]
pub struct AnalysisJob {
    id: u64,
    status: JobStatus,
    transactions: Vec<Transaction>,
    result: Option<AnalysisResult>,
    correlation_id: Option<String>,
    cancel: CancelToken,
}

impl AnalysisJob {
    fn new(id: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            transactions,
            result: None,
            correlation_id: None,
            cancel: CancelToken::new(),
        }
    }

    /// Pending -> Completed; later transitions are ignored
    fn complete(&mut self, result: AnalysisResult) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
    }

    /// Pending -> Failed; later transitions are ignored
    fn fail(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            status: self.status,
            correlation_id: self.correlation_id.clone(),
            transaction_count: self.transactions.len(),
            source: self.result.as_ref().map(|r| r.source()),
        }
    }
}

/// Read-only view of the active job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: u64,
    pub status: JobStatus,
    pub correlation_id: Option<String>,
    pub transaction_count: usize,
    pub source: Option<ResultSource>,
}

/// Dispatches transactions and owns the single active job
pub struct AnalysisDispatcher {
    config: DispatcherConfig,
    transport: Arc<dyn AnalysisTransport>,
    clock: Arc<dyn Clock>,
    active: Mutex<Option<AnalysisJob>>,
    next_id: AtomicU64,
}

impl AnalysisDispatcher {
    pub fn new(
        config: DispatcherConfig,
        transport: Arc<dyn AnalysisTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            transport,
            clock,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Production dispatcher: reqwest transport and real time
    pub fn http(config: DispatcherConfig) -> Result<Self, AnalysisError> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self::new(config, Arc::new(transport), Arc::new(TokioClock)))
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Analyze transactions, falling back to local computation on remote failure
    ///
    /// Cancelling `cancel` (or calling `clear`/`analyze` again) while the
    /// request or poll loop is in flight returns `AnalysisError::Cancelled`
    /// and discards the job.
    pub async fn analyze(
        &self,
        transactions: &[Transaction],
        cancel: &CancelToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        if transactions.is_empty() {
            return Err(AnalysisError::NoData);
        }

        let (job_id, job_cancel) = self.begin(transactions);
        info!(job = job_id, rows = transactions.len(), "Starting analysis");

        let request = DispatchRequest { data: transactions };
        let reply = tokio::select! {
            biased;
            _ = either_cancelled(cancel, &job_cancel) => {
                return Err(self.abandon(job_id));
            }
            reply = self.transport.dispatch(&self.config.dispatch_url, &request) => reply,
        };

        let outcome = match reply.and_then(interpret_dispatch) {
            Ok(DispatchReply::Insights(insights)) => {
                match AnalysisResult::from_remote(insights, ResultSource::Remote) {
                    Ok(result) => {
                        debug!(job = job_id, "Remote analysis returned directly");
                        result
                    }
                    Err(e) => self.fallback(job_id, transactions, &e),
                }
            }
            Ok(DispatchReply::Accepted { correlation_id }) => {
                self.set_correlation_id(job_id, &correlation_id);
                info!(job = job_id, correlation_id = %correlation_id, "Remote job accepted, polling");
                self.poll(job_id, &correlation_id, transactions, cancel, &job_cancel)
                    .await?
            }
            Err(e) => self.fallback(job_id, transactions, &e),
        };

        self.with_job(job_id, |job| job.complete(outcome.clone()));
        Ok(outcome)
    }

    /// Poll the status endpoint until the job completes or is cancelled
    async fn poll(
        &self,
        job_id: u64,
        correlation_id: &str,
        transactions: &[Transaction],
        cancel: &CancelToken,
        job_cancel: &CancelToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let interval = self.config.poll_interval();
        let mut attempt: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = either_cancelled(cancel, job_cancel) => return Err(self.abandon(job_id)),
                _ = self.clock.sleep(interval) => {}
            }

            attempt += 1;
            let reply = tokio::select! {
                biased;
                _ = either_cancelled(cancel, job_cancel) => return Err(self.abandon(job_id)),
                reply = self.transport.status(&self.config.status_url, correlation_id) => reply,
            };

            match reply.and_then(interpret_status) {
                Ok(StatusReply::Pending) => {
                    debug!(job = job_id, attempt, "Remote job still pending");
                }
                Ok(StatusReply::Completed(data)) => {
                    return Ok(
                        match AnalysisResult::from_remote(data, ResultSource::RemotePolled) {
                            Ok(result) => {
                                info!(job = job_id, attempt, "Remote job completed");
                                result
                            }
                            Err(e) => self.fallback(job_id, transactions, &e),
                        },
                    );
                }
                Ok(StatusReply::Failed(reason)) => {
                    let e = AnalysisError::TransportFailure(format!("remote job failed: {}", reason));
                    return Ok(self.fallback(job_id, transactions, &e));
                }
                Err(e) => {
                    warn!(job = job_id, attempt, error = %e, "Status poll failed, retrying next tick");
                }
            }
        }
    }

    /// Cancel and discard the active job, if any
    pub fn clear(&self) {
        if let Some(job) = self.lock().take() {
            job.cancel.cancel();
            debug!(job = job.id, "Cleared analysis job");
        }
    }

    /// Snapshot of the active job
    pub fn active_job(&self) -> Option<JobSnapshot> {
        self.lock().as_ref().map(AnalysisJob::snapshot)
    }

    /// Install a new job, cancelling whichever job was active
    fn begin(&self, transactions: &[Transaction]) -> (u64, CancelToken) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = AnalysisJob::new(id, transactions.to_vec());
        let token = job.cancel.clone();

        let mut active = self.lock();
        if let Some(previous) = active.replace(job) {
            if !previous.status.is_terminal() {
                info!(job = previous.id, "Cancelling previous analysis job");
            }
            previous.cancel.cancel();
        }
        (id, token)
    }

    fn fallback(
        &self,
        job_id: u64,
        transactions: &[Transaction],
        reason: &AnalysisError,
    ) -> AnalysisResult {
        warn!(job = job_id, error = %reason, "Remote analysis unavailable, computing locally");
        compute_locally(transactions)
    }

    /// Mark a cancelled job failed and drop it if it is still active
    fn abandon(&self, job_id: u64) -> AnalysisError {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|job| job.id == job_id) {
            if let Some(mut job) = active.take() {
                job.fail();
            }
        }
        info!(job = job_id, "Analysis cancelled");
        AnalysisError::Cancelled
    }

    fn set_correlation_id(&self, job_id: u64, correlation_id: &str) {
        self.with_job(job_id, |job| {
            job.correlation_id = Some(correlation_id.to_string())
        });
    }

    fn with_job(&self, job_id: u64, f: impl FnOnce(&mut AnalysisJob)) {
        if let Some(job) = self.lock().as_mut().filter(|job| job.id == job_id) {
            f(job);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<AnalysisJob>> {
        // A poisoned lock only means a panic elsewhere; the job data is still usable
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}
