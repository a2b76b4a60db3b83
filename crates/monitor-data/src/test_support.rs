//! In-process HTTP stub for exercising the API clients.
//!
//! Serves canned responses from an `axum` router on an ephemeral port and
//! records every request it receives.

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

/// A request captured by the stub.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Canned response for every request whose path contains `path_fragment`.
#[derive(Debug, Clone)]
pub struct Route {
    pub path_fragment: &'static str,
    pub status: u16,
    pub body: String,
}

impl Route {
    /// Answer every path with `status` and `body`.
    pub fn any(status: u16, body: &str) -> Self {
        Self {
            path_fragment: "/",
            status,
            body: body.to_string(),
        }
    }
}

pub type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

#[derive(Clone)]
struct StubState {
    routes: Arc<Vec<Route>>,
    captured: Captured,
}

/// Serve `routes` on `127.0.0.1:0`; returns the base URL and the log of
/// captured requests. Unmatched paths get a 404.
pub async fn spawn_stub(routes: Vec<Route>) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        routes: Arc::new(routes),
        captured: Arc::clone(&captured),
    };
    let app = Router::new().fallback(answer).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}

async fn answer(
    State(state): State<StubState>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    let route = state
        .routes
        .iter()
        .find(|r| path.contains(r.path_fragment))
        .cloned();

    state.captured.lock().unwrap().push(CapturedRequest {
        path,
        headers,
        body,
    });

    match route {
        Some(route) => {
            let status = StatusCode::from_u16(route.status).unwrap();
            (status, [(header::CONTENT_TYPE, "application/json")], route.body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
