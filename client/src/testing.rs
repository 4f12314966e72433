//! In-process stand-in for the Unsplash API.
//!
//! Responses are scripted per route key. A route key is the request path, with
//! `?page=N` appended when the request carries a `page` query parameter. Each
//! request pops the next scripted response for its key; the last one keeps
//! being served once the queue is down to a single entry.

use axum::{
    extract::{
        Query,
        State,
    },
    http::{
        header::AUTHORIZATION,
        HeaderMap,
        HeaderName,
        HeaderValue,
        StatusCode,
        Uri,
    },
    response::{
        IntoResponse,
        Response,
    },
    Router,
};
use serde_json::Value;
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
};

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    delay: Duration,
}

impl MockResponse {
    pub fn json(body: Value) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Quota headers as the real API sends them.
    pub fn quota(self, limit: u32, remaining: u32) -> Self {
        self.header("X-Ratelimit-Limit", limit.to_string())
            .header("X-Ratelimit-Remaining", remaining.to_string())
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                headers.insert(name, value);
            }
        }
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, headers, self.body).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub key: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct MockApi {
    base_url: String,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockApi {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock api");
        let address = listener.local_addr().expect("mock api address");
        let app = Router::new().fallback(respond).with_state(state.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{address}"),
            state,
            server,
        }
    }

    pub fn base_url(&self) -> url::Url {
        url::Url::parse(&self.base_url).expect("mock api url")
    }

    /// Queues `response` for `key`.
    pub fn route(&self, key: impl Into<String>, response: MockResponse) -> &Self {
        self.state
            .routes
            .lock()
            .expect("mock routes")
            .entry(key.into())
            .or_default()
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("mock requests").clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.requests().into_iter().map(|request| request.key).collect()
    }

    pub fn count(&self, key: &str) -> usize {
        self.requests().iter().filter(|request| request.key == key).count()
    }
}

async fn respond(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let key = match query.get("page") {
        Some(page) => format!("{}?page={page}", uri.path()),
        None => uri.path().to_string(),
    };

    state.requests.lock().expect("mock requests").push(RecordedRequest {
        key: key.clone(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    });

    let response = {
        let mut routes = state.routes.lock().expect("mock routes");
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    match response {
        Some(response) => {
            if !response.delay.is_zero() {
                tokio::time::sleep(response.delay).await;
            }
            response.into_response()
        }
        None => MockResponse::status(404, serde_json::json!({ "errors": ["Couldn't find route"] })).into_response(),
    }
}
