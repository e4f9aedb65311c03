use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub authorization: Option<String>,
    pub report_id: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
struct CollectorState {
    config_json: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// In-process collector endpoint recording every request it receives.
pub struct FakeCollector {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl FakeCollector {
    pub async fn start(config_json: &str) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = CollectorState {
            config_json: config_json.to_string(),
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/hsreporter.json", get(handle).post(handle))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hsreporter.json", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<CapturedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::POST)
            .collect()
    }

    /// Concatenated bodies of every POST so far.
    pub fn uploaded(&self) -> String {
        let bytes: Vec<u8> = self.posts().into_iter().flat_map(|r| r.body).collect();
        String::from_utf8(bytes).unwrap()
    }

    /// Wait until the uploaded bytes contain `needle`.
    pub async fn wait_for_upload(&self, needle: &str) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while tokio::time::Instant::now() < deadline {
            if self.uploaded().contains(needle) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

async fn handle(
    State(state): State<CollectorState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };

    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.clone(),
        authorization: header_value("authorization"),
        report_id: header_value("x-hsreport-id"),
        content_type: header_value("content-type"),
        body: body.to_vec(),
    });

    if method == Method::GET {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            state.config_json.clone(),
        )
            .into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}
