//! Test utilities for cashlens-core
//!
//! Provides a scripted in-process transport, an instant clock, JSON reply
//! builders, and a mock remote analysis server that speaks HTTP.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::dispatch::{AnalysisTransport, Clock, DispatchRequest};
use crate::error::AnalysisError;

/// A result-like insights object with the given totals
pub fn insights_json(total_income: f64, total_expenses: f64) -> Value {
    json!({
        "summary": "Remote summary",
        "suggestions": ["Remote suggestion"],
        "metrics": {
            "totalIncome": total_income,
            "totalExpenses": total_expenses,
            "netCashFlow": total_income - total_expenses,
            "topExpenseCategory": "Rent"
        },
        "chartData": {
            "monthlyTrends": [
                {"name": "Jan", "income": total_income, "expenses": total_expenses}
            ],
            "expensesByCategory": [
                {"name": "Rent", "value": total_expenses}
            ]
        }
    })
}

/// Dispatch reply carrying insights directly
pub fn direct_reply(insights: Value) -> Value {
    json!({ "data": { "insights": insights } })
}

/// Dispatch reply announcing an asynchronous job
pub fn pending_reply(correlation_id: &str) -> Value {
    json!({ "data": { "correlationId": correlation_id } })
}

pub fn status_pending() -> Value {
    json!({ "status": "pending" })
}

pub fn status_completed(insights: Value) -> Value {
    json!({ "status": "completed", "data": insights })
}

/// Clock whose ticks only yield to the scheduler
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantClock;

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

type Reply = Result<Value, AnalysisError>;

/// In-process transport with queued replies and call counters
///
/// Dispatches with no queued reply fail with `TransportFailure`; status
/// requests with no queued reply answer `pending`.
#[derive(Default)]
pub struct ScriptedTransport {
    dispatch_replies: Mutex<VecDeque<Reply>>,
    status_replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    dispatch_calls: AtomicUsize,
    status_calls: Mutex<HashMap<String, usize>>,
    dispatched_rows: Mutex<Vec<usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_dispatch(&self, reply: Reply) {
        self.dispatch_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_status(&self, correlation_id: &str, reply: Reply) {
        self.status_replies
            .lock()
            .unwrap()
            .entry(correlation_id.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn dispatch_calls(&self) -> usize {
        self.dispatch_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self, correlation_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(correlation_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_status_calls(&self) -> usize {
        self.status_calls.lock().unwrap().values().sum()
    }

    /// Row counts of every dispatch, in order
    pub fn dispatched_rows(&self) -> Vec<usize> {
        self.dispatched_rows.lock().unwrap().clone()
    }

    /// Yield until at least `n` status requests were made for the job
    pub async fn wait_for_status_calls(&self, correlation_id: &str, n: usize) {
        while self.status_calls(correlation_id) < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl AnalysisTransport for ScriptedTransport {
    async fn dispatch(&self, _url: &str, request: &DispatchRequest<'_>) -> Reply {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        self.dispatched_rows.lock().unwrap().push(request.data.len());
        self.dispatch_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AnalysisError::TransportFailure("no scripted reply".into())))
    }

    async fn status(&self, _url: &str, correlation_id: &str) -> Reply {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(correlation_id.to_string())
            .or_default() += 1;
        self.status_replies
            .lock()
            .unwrap()
            .get_mut(correlation_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Ok(status_pending()))
    }
}

/// Behavior of the mock analysis server
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Answer the dispatch with insights
    Direct,
    /// Answer with a correlation id; the status endpoint reports pending
    /// this many times before completing
    Async { pending_polls: usize },
    /// Answer every dispatch with this HTTP status
    HttpError(u16),
    /// Answer with a JSON body that fits neither reply shape
    Malformed,
}

struct ServerState {
    mode: MockMode,
    dispatches: AtomicUsize,
    status_requests: AtomicUsize,
    received_rows: Mutex<Vec<Value>>,
}

/// Mock remote analysis service for integration tests
pub struct MockAnalysisServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockAnalysisServer {
    /// Start the mock server on an available port
    pub async fn start(mode: MockMode) -> Self {
        let state = Arc::new(ServerState {
            mode,
            dispatches: AtomicUsize::new(0),
            status_requests: AtomicUsize::new(0),
            received_rows: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/webhook/transaction-upload", post(handle_dispatch))
            .route("/webhook/transaction-status", get(handle_status))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn dispatch_url(&self) -> String {
        format!("http://{}/webhook/transaction-upload", self.addr)
    }

    pub fn status_url(&self) -> String {
        format!("http://{}/webhook/transaction-status", self.addr)
    }

    pub fn dispatches(&self) -> usize {
        self.state.dispatches.load(Ordering::SeqCst)
    }

    pub fn status_requests(&self) -> usize {
        self.state.status_requests.load(Ordering::SeqCst)
    }

    /// Rows received by the most recent dispatch
    pub fn received_rows(&self) -> Vec<Value> {
        self.state.received_rows.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAnalysisServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_dispatch(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> Response {
    state.dispatches.fetch_add(1, Ordering::SeqCst);
    let rows = body
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    *state.received_rows.lock().unwrap() = rows;

    match &state.mode {
        MockMode::Direct => Json(direct_reply(insights_json(1000.0, 500.0))).into_response(),
        MockMode::Async { .. } => Json(pending_reply("mock-job-1")).into_response(),
        MockMode::HttpError(code) => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "analysis unavailable").into_response()
        }
        MockMode::Malformed => Json(json!({ "ok": true })).into_response(),
    }
}

async fn handle_status(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let seen = state.status_requests.fetch_add(1, Ordering::SeqCst);

    if params.get("correlationId").map(String::as_str) != Some("mock-job-1") {
        return (StatusCode::NOT_FOUND, "unknown job").into_response();
    }

    match &state.mode {
        MockMode::Async { pending_polls } if seen >= *pending_polls => {
            Json(status_completed(insights_json(800.0, 200.0))).into_response()
        }
        _ => Json(status_pending()).into_response(),
    }
}
