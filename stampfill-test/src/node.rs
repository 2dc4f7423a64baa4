//! A scripted stand-in for the storage node API.
//!
//! The fake node serves `GET /stamps/{id}` from a per-batch script of snapshots and accepts
//! `POST /bytes`, recording every upload it receives. Uploads can be made to fail at a chosen
//! position to exercise error paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;

/// A batch snapshot served by the fake node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchState {
    #[serde(rename = "batchID")]
    batch_id: String,
    utilization: u32,
    expired: bool,
    usable: bool,
}

impl BatchState {
    /// A batch that is not funded yet.
    pub fn pending() -> Self {
        Self {
            batch_id: String::new(),
            utilization: 0,
            expired: false,
            usable: false,
        }
    }

    /// A usable, unexpired batch at the given utilization.
    pub fn usable(utilization: u32) -> Self {
        Self {
            utilization,
            usable: true,
            ..Self::pending()
        }
    }

    /// An expired batch at the given utilization.
    pub fn expired(utilization: u32) -> Self {
        Self {
            expired: true,
            ..Self::usable(utilization)
        }
    }
}

/// An upload as it was received by the fake node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedUpload {
    /// Value of the `swarm-postage-batch-id` header.
    pub batch_id: Option<String>,
    /// Value of the `content-type` header.
    pub content_type: Option<String>,
    /// Value of the `swarm-encrypt` header.
    pub encrypt: Option<String>,
    /// Value of the `swarm-deferred-upload` header.
    pub deferred: Option<String>,
    /// Size of the request body in bytes.
    pub len: usize,
}

#[derive(Debug, Default)]
struct NodeState {
    scripts: HashMap<String, VecDeque<BatchState>>,
    polls: HashMap<String, usize>,
    malformed: HashSet<String>,
    failures: HashMap<String, (usize, StatusCode)>,
    attempts: HashMap<String, usize>,
    uploads: Vec<ReceivedUpload>,
}

/// Shared, scriptable state of a fake storage node.
///
/// Clones share the same state, so a test can keep a handle while the server owns another.
#[derive(Clone, Debug, Default)]
pub struct FakeNode {
    inner: Arc<Mutex<NodeState>>,
}

impl FakeNode {
    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the sequence of snapshots returned for a batch.
    ///
    /// Each poll consumes one snapshot. Once only one remains, it is returned for all further
    /// polls.
    pub fn script_batch(&self, batch_id: &str, states: impl IntoIterator<Item = BatchState>) {
        let script = states
            .into_iter()
            .map(|state| BatchState {
                batch_id: batch_id.to_owned(),
                ..state
            })
            .collect();
        self.state().scripts.insert(batch_id.to_owned(), script);
    }

    /// Makes polls for the batch answer with a body that is not valid JSON.
    pub fn malformed_stamps(&self, batch_id: &str) {
        self.state().malformed.insert(batch_id.to_owned());
    }

    /// Makes the `nth` upload (starting at 1) for the batch fail with the given status.
    pub fn fail_upload(&self, batch_id: &str, nth: usize, status: StatusCode) {
        self.state()
            .failures
            .insert(batch_id.to_owned(), (nth, status));
    }

    /// Returns all successfully stored uploads, in the order they were received.
    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state().uploads.clone()
    }

    /// Returns the successfully stored uploads for one batch.
    pub fn uploads_for(&self, batch_id: &str) -> Vec<ReceivedUpload> {
        self.state()
            .uploads
            .iter()
            .filter(|upload| upload.batch_id.as_deref() == Some(batch_id))
            .cloned()
            .collect()
    }

    /// Returns how often the batch has been polled.
    pub fn polls(&self, batch_id: &str) -> usize {
        self.state().polls.get(batch_id).copied().unwrap_or_default()
    }

    /// Builds the axum router serving this node.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/stamps/{batch_id}", get(get_stamp))
            .route("/bytes", post(post_bytes))
            .layer(DefaultBodyLimit::disable())
            .with_state(self.clone())
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    let body = json!({ "code": status.as_u16(), "message": message });
    (status, Json(body)).into_response()
}

async fn get_stamp(State(node): State<FakeNode>, Path(batch_id): Path<String>) -> Response {
    let mut guard = node.state();
    let state = &mut *guard;
    *state.polls.entry(batch_id.clone()).or_default() += 1;

    if state.malformed.contains(&batch_id) {
        return (StatusCode::OK, "this is not a batch").into_response();
    }

    let Some(script) = state.scripts.get_mut(&batch_id) else {
        return error(StatusCode::NOT_FOUND, "issuer does not exist");
    };
    let snapshot = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };

    match snapshot {
        Some(snapshot) => Json(snapshot).into_response(),
        None => error(StatusCode::NOT_FOUND, "issuer does not exist"),
    }
}

async fn post_bytes(State(node): State<FakeNode>, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };

    let upload = ReceivedUpload {
        batch_id: header("swarm-postage-batch-id"),
        content_type: header("content-type"),
        encrypt: header("swarm-encrypt"),
        deferred: header("swarm-deferred-upload"),
        len: body.len(),
    };

    let Some(batch_id) = upload.batch_id.clone() else {
        return error(StatusCode::BAD_REQUEST, "invalid header params");
    };

    let mut guard = node.state();
    let state = &mut *guard;
    if !state.scripts.contains_key(&batch_id) {
        return error(StatusCode::NOT_FOUND, "batch with id not found");
    }

    let attempt = state.attempts.entry(batch_id.clone()).or_default();
    *attempt += 1;
    if let Some(&(nth, status)) = state.failures.get(&batch_id) {
        if nth == *attempt {
            return error(status, "upload failed");
        }
    }

    state.uploads.push(upload);
    let reference = format!("{:064x}", state.uploads.len());
    (StatusCode::CREATED, Json(json!({ "reference": reference }))).into_response()
}
