//! 测试用 HTTP 服务：axum 路由按 (方法, 路径) 返回预设响应，并记录收到的请求。

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// 含查询串
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.target.split_once('?')?.1;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Clone)]
struct Route {
    method: Method,
    path: String,
    status: StatusCode,
    body: String,
    headers: HeaderMap,
}

#[derive(Clone, Default)]
pub struct MockServer {
    routes: Arc<Mutex<Vec<Route>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, method: &'static str, path: &str, status: u16, body: &str) -> Self {
        self.route_with_headers(method, path, status, body, &[])
    }

    /// 同名头可以重复出现，例如多个 `set-cookie`
    pub fn route_with_headers(
        self,
        method: &'static str,
        path: &str,
        status: u16,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        self.routes.lock().unwrap().push(Route {
            method: Method::from_bytes(method.as_bytes()).unwrap(),
            path: path.to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            headers: map,
        });
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// 监听随机端口，返回 base url
    pub async fn start(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(respond).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

/// 未登记的路由回 404 空响应体
async fn respond(
    State(server): State<MockServer>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let route = server
        .routes
        .lock()
        .unwrap()
        .iter()
        .find(|r| r.method == method && r.path == uri.path())
        .cloned();

    server.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        target: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    match route {
        Some(r) => {
            let mut response_headers = r.headers;
            response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            (r.status, response_headers, r.body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
