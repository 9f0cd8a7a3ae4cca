use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::ServerConfig;

// uploads pass through here, so this is well above axum's extractor default
const MAX_REQUEST_BYTES: usize = 100 * 1024 * 1024;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Clone, Debug)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub backend_url: String,
}

impl ProxyState {
    pub fn new(config: &ServerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.proxy_timeout)
            .build()?;
        Ok(Self {
            client,
            backend_url: config.backend_url.clone(),
        })
    }

    /// `/api/files/3?x=1` becomes `{backend}/files/3?x=1`.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let path = path.strip_prefix("/api").unwrap_or(path);
        let path = path.trim_start_matches('/');
        match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{}/{}?{}", self.backend_url, path, query),
            None => format!("{}/{}", self.backend_url, path),
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name) && **name != header::HOST)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn unavailable(backend_url: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Backend server unavailable",
            "message": format!("Please ensure the backend server is running at {}", backend_url),
        })),
    )
        .into_response()
}

/// Forwards any `/api/*` request to the backend with the `/api` prefix removed.
///
/// Method, query, headers and body pass through unchanged apart from `Host`
/// and hop-by-hop headers. The backend's response body is streamed back.
pub async fn proxy_handler(State(proxy): State<ProxyState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let url = proxy.target_url(parts.uri.path(), parts.uri.query());
    log::info!("Proxying: {} {} -> {}", parts.method, parts.uri, url);

    let body = match to_bytes(body, MAX_REQUEST_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Rejected request body for {}: {}", parts.uri, e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let upstream = proxy
        .client
        .request(parts.method.clone(), &url)
        .headers(forwarded_headers(&parts.headers))
        .body(body)
        .send()
        .await;

    let resp = match upstream {
        Ok(resp) => resp,
        Err(e) => {
            log::error!("Proxy error for {} {}: {}", parts.method, parts.uri, e);
            return unavailable(&proxy.backend_url);
        }
    };
    log::info!("Response: {} for {} {}", resp.status(), parts.method, parts.uri);

    let mut builder = Response::builder().status(resp.status());
    for (name, value) in resp.headers() {
        // the body is re-chunked, so the upstream length no longer applies
        if !is_hop_by_hop(name) && *name != header::CONTENT_LENGTH {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from_stream(resp.bytes_stream()))
        .unwrap_or_else(|e| {
            log::error!("Failed to build proxied response: {}", e);
            unavailable(&proxy.backend_url)
        })
}
