use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pitch_core::expressions::value::to_text;
use serde_json::{Map, Value};

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("timeout")]
    Timeout,
    #[error("connect/dns/tls error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("http error: {0}")]
    Other(String),
}

/// A fully rendered request descriptor, as plugins see and edit it.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Query parameters; array values become repeated pairs.
    pub params: Map<String, Value>,
    /// Form mapping or raw body text.
    pub data: Option<Value>,
    pub json: Option<Value>,
    pub cookies: BTreeMap<String, String>,
    /// Seconds.
    pub timeout: Option<f64>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// What a transport actually puts on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: String,
    pub url: url::Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub url: String,
    pub elapsed: Duration,
    /// Filled by `response_as_json`.
    pub json: Option<Value>,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "status_code": self.status_code,
            "headers": self.headers,
            "text": self.body,
            "url": self.url,
            "elapsed": self.elapsed.as_secs_f64(),
            "json": self.json,
        })
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    fn prepare(&self, request: &HttpRequest) -> Result<PreparedRequest, HttpError> {
        prepare_request(request)
    }

    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError>;
}

/// Creates one transport session per run.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn HttpTransport>, HttpError>;
}

pub fn prepare_request(request: &HttpRequest) -> Result<PreparedRequest, HttpError> {
    let mut url = url::Url::parse(&request.url)
        .map_err(|e| HttpError::InvalidRequest(format!("{}: {e}", request.url)))?;
    if !request.params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &request.params {
            match value {
                Value::Array(items) => {
                    for item in items {
                        pairs.append_pair(key, &to_text(item));
                    }
                }
                Value::Null => {}
                other => {
                    pairs.append_pair(key, &to_text(other));
                }
            }
        }
    }

    let mut headers = request.headers.clone();
    if !request.cookies.is_empty() {
        let cookie = request
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert("Cookie".to_string(), cookie);
    }

    let body = match (&request.data, &request.json) {
        (Some(Value::Object(form)), _) => {
            set_default_header(&mut headers, "Content-Type", "application/x-www-form-urlencoded");
            let encoded = form
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(&to_text(v))))
                .collect::<Vec<_>>()
                .join("&");
            Some(encoded.into_bytes())
        }
        (Some(Value::Null), None) | (None, None) => None,
        (Some(data), _) if !data.is_null() => Some(to_text(data).into_bytes()),
        (_, Some(json)) => {
            set_default_header(&mut headers, "Content-Type", "application/json");
            Some(serde_json::to_vec(json).map_err(|e| HttpError::InvalidRequest(e.to_string()))?)
        }
        _ => None,
    };

    let timeout = match request.timeout {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => return Err(HttpError::InvalidRequest(format!("invalid timeout: {secs}"))),
        None => None,
    };

    Ok(PreparedRequest {
        method: request.method.to_ascii_uppercase(),
        url,
        headers,
        body,
        timeout,
    })
}

fn set_default_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    if !headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
        headers.insert(name.to_string(), value.to_string());
    }
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    default_timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(default_timeout: Option<Duration>) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pitch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, default_timeout })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError> {
        let method: reqwest::Method = request
            .method
            .parse()
            .map_err(|e: <reqwest::Method as std::str::FromStr>::Err| HttpError::InvalidRequest(e.to_string()))?;
        let mut rb = self.client.request(method, request.url);
        if let Some(timeout) = request.timeout.or(self.default_timeout) {
            rb = rb.timeout(timeout);
        }
        for (k, v) in request.headers {
            rb = rb.header(k, v);
        }
        if let Some(body) = request.body {
            rb = rb.body(body);
        }

        let started = Instant::now();
        let resp = rb.send().await.map_err(map_reqwest_error)?;
        let status_code = resp.status().as_u16();
        let url = resp.url().to_string();

        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.to_string(), s.to_string());
            }
        }
        let body = resp.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status_code,
            headers,
            body,
            url,
            elapsed: started.elapsed(),
            json: None,
        })
    }
}

pub struct ReqwestTransportFactory {
    pub default_timeout: Option<Duration>,
}

impl TransportFactory for ReqwestTransportFactory {
    fn create(&self) -> Result<Arc<dyn HttpTransport>, HttpError> {
        Ok(Arc::new(ReqwestTransport::new(self.default_timeout)?))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        return HttpError::Timeout;
    }
    if e.is_connect() || e.is_request() {
        return HttpError::Network(e.to_string());
    }
    HttpError::Other(e.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prepare_encodes_params_cookies_and_json_body() {
        let mut request = HttpRequest::new("post", "http://host/api/users?x=1");
        request.params = json!({"page": 2, "tag": ["a", "b"]}).as_object().cloned().unwrap();
        request.cookies.insert("session".into(), "abc".into());
        request.json = Some(json!({"name": "ada"}));

        let prepared = prepare_request(&request).unwrap();
        assert_eq!(prepared.method, "POST");
        assert_eq!(prepared.url.as_str(), "http://host/api/users?x=1&page=2&tag=a&tag=b");
        assert_eq!(prepared.headers["Cookie"], "session=abc");
        assert_eq!(prepared.headers["Content-Type"], "application/json");
        assert_eq!(prepared.body.as_deref(), Some(br#"{"name":"ada"}"#.as_slice()));
    }

    #[test]
    fn prepare_form_data_and_raw_text() {
        let mut request = HttpRequest::new("POST", "http://host/form");
        request.data = Some(json!({"q": "a b"}));
        request.headers.insert("content-type".into(), "text/plain".into());
        let prepared = prepare_request(&request).unwrap();
        assert_eq!(prepared.body.as_deref(), Some(b"q=a%20b".as_slice()));
        assert!(!prepared.headers.contains_key("Content-Type"));

        request.data = Some(json!("raw"));
        assert_eq!(prepare_request(&request).unwrap().body.as_deref(), Some(b"raw".as_slice()));
    }

    #[test]
    fn prepare_rejects_relative_urls_and_bad_timeouts() {
        assert!(matches!(
            prepare_request(&HttpRequest::new("GET", "/relative")),
            Err(HttpError::InvalidRequest(_))
        ));
        let mut request = HttpRequest::new("GET", "http://host");
        request.timeout = Some(-1.0);
        assert!(prepare_request(&request).is_err());
    }
}
