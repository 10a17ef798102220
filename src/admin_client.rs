//! HTTP client for one remote proxy's admin API (spec §4.B, §6.2).
//!
//! One [`AdminClient`] wraps one `reqwest::Client` built once at
//! construction from `{base_url, auth, credentials, timeout}`. It is safe
//! for concurrent use — `reqwest::Client` owns a connection pool internally
//! and clones cheaply, matching the spec's "one underlying HTTP connection
//! pool per client" ownership rule (§3.2).

use std::path::Path;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::error::{truncate_body, Error, Result};
use crate::model::{AuthKind, Credentials};
use crate::tls;

/// The standard strong/weak HTTP validator header the remote reports a
/// configuration version in (spec §6.2: "the version-token header name is
/// the standard HTTP strong/weak validator header").
const ETAG_HEADER: &str = "etag";
const IF_MATCH_HEADER: &str = "if-match";

/// Construction-time parameters for an [`AdminClient`] (spec §4.B).
#[derive(Debug, Clone)]
pub struct AdminClientConfig {
    pub base_url: String,
    pub auth: AuthKind,
    pub credentials: Credentials,
    /// Per-request timeout (spec §5 default: 10s).
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

/// Thread-safe client for a single remote proxy's admin JSON API.
#[derive(Debug, Clone)]
pub struct AdminClient {
    base_url: String,
    auth: AuthKind,
    bearer_token: Option<String>,
    http: reqwest::Client,
    timeout: Duration,
}

impl AdminClient {
    /// Build a client for `config.base_url`. mTLS identity (and optional CA)
    /// is loaded and installed now; per spec, "if the certificate files
    /// cannot be read at construction, client creation fails."
    pub fn new(config: AdminClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .min_tls_version(reqwest::tls::Version::TLS_1_2);

        let mut bearer_token = None;
        match &config.auth {
            AuthKind::None => {}
            AuthKind::Bearer => {
                bearer_token = Some(config.credentials.require("token")?.to_string());
            }
            AuthKind::Mtls => {
                let cert_path = config.credentials.require("cert_path")?;
                let key_path = config.credentials.require("key_path")?;
                let identity = tls::load_identity(Path::new(cert_path), Path::new(key_path))?;
                builder = builder.identity(identity);

                if let Some(ca_path) = config.credentials.get("ca_path") {
                    let ca = tls::load_ca_certificate(Path::new(ca_path))?;
                    builder = builder.add_root_certificate(ca);
                }
            }
        }

        let http = builder
            .build()
            .map_err(|e| Error::Validation(format!("failed to build admin HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: config.auth,
            bearer_token,
            http,
            timeout: config.timeout,
        })
    }

    fn url(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.base_url.clone()
        } else if suffix.starts_with('/') {
            format!("{}{}", self.base_url, suffix)
        } else {
            format!("{}/{}", self.base_url, suffix)
        }
    }

    fn config_url(&self, path: &str) -> String {
        if path.is_empty() {
            self.url("/config/")
        } else {
            self.url(&format!("/config/{path}"))
        }
    }

    fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if let (AuthKind::Bearer, Some(token)) = (&self.auth, &self.bearer_token) {
            req = req.bearer_auth(token);
        }
        req
    }

    /// `GET /config/`; success iff the remote returns 200 (spec §4.B).
    pub async fn health_check(&self) -> Result<bool> {
        let resp = self
            .request(Method::GET, self.config_url(""))
            .send()
            .await?;
        Ok(resp.status() == StatusCode::OK)
    }

    /// `GET /config[/path]` → the decoded body and the remote's ETag.
    pub async fn get_config(&self, path: &str) -> Result<(Value, Option<String>)> {
        let resp = self
            .request(Method::GET, self.config_url(path))
            .send()
            .await?;
        let resp = Self::check_status(resp, false).await?;
        let etag = resp
            .headers()
            .get(ETAG_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body: Value = resp.json().await.map_err(|e| Error::Parse(e.to_string()))?;
        Ok((body, etag))
    }

    /// `POST /config[/path]`, the entire replacement document at `path`.
    /// When `if_match` is non-empty it is sent as a precondition header; a
    /// precondition-failed response surfaces as [`Error::PreconditionFailed`].
    pub async fn set_config(&self, path: &str, document: &Value, if_match: &str) -> Result<()> {
        let mut req = self
            .request(Method::POST, self.config_url(path))
            .json(document);
        if !if_match.is_empty() {
            req = req.header(IF_MATCH_HEADER, if_match);
        }
        let resp = req.send().await?;
        let guarded = !if_match.is_empty();
        Self::check_status(resp, guarded).await?;
        Ok(())
    }

    /// `PATCH /config[/path]` to merge a partial document (spec §4.E.3).
    pub async fn patch_config(&self, path: &str, document: &Value) -> Result<()> {
        let resp = self
            .request(Method::PATCH, self.config_url(path))
            .json(document)
            .send()
            .await?;
        Self::check_status(resp, false).await?;
        Ok(())
    }

    /// `DELETE /config/path` (spec §4.E.3).
    pub async fn delete_config(&self, path: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, self.config_url(path))
            .send()
            .await?;
        Self::check_status(resp, false).await?;
        Ok(())
    }

    /// `POST /adapt?adapter=<kind>` with a `text/<kind>` body. On a 4xx
    /// response the remote's `error` field is surfaced verbatim (spec §4.B).
    pub async fn adapt_config(&self, text: &str, adapter: Option<&str>) -> Result<Value> {
        let adapter = adapter.unwrap_or("caddyfile");
        let resp = self
            .request(Method::POST, self.url(&format!("/adapt?adapter={adapter}")))
            .header("content-type", format!("text/{adapter}"))
            .body(text.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(Error::RemoteStatus {
                status,
                body_excerpt: truncate_body(&message),
            });
        }

        resp.json::<Value>().await.map_err(|e| Error::Parse(e.to_string()))
    }

    /// `GET /reverse_proxy/upstreams` (spec §6.2).
    pub async fn get_upstreams(&self) -> Result<Value> {
        let resp = self
            .request(Method::GET, self.url("/reverse_proxy/upstreams"))
            .send()
            .await?;
        let resp = Self::check_status(resp, false).await?;
        resp.json().await.map_err(|e| Error::Parse(e.to_string()))
    }

    /// `GET /pki/ca/<ca_id>` (spec §6.2).
    pub async fn get_pki_ca(&self, ca_id: &str) -> Result<Value> {
        let resp = self
            .request(Method::GET, self.url(&format!("/pki/ca/{ca_id}")))
            .send()
            .await?;
        let resp = Self::check_status(resp, false).await?;
        resp.json().await.map_err(|e| Error::Parse(e.to_string()))
    }

    /// `POST /load`, replacing the remote's entire configuration document.
    pub async fn load_config(&self, document: &Value) -> Result<()> {
        let resp = self
            .request(Method::POST, self.url("/load"))
            .json(document)
            .send()
            .await?;
        Self::check_status(resp, false).await?;
        Ok(())
    }

    /// `POST /stop`.
    pub async fn stop(&self) -> Result<()> {
        let resp = self.request(Method::POST, self.url("/stop")).send().await?;
        Self::check_status(resp, false).await?;
        Ok(())
    }

    /// Configured per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check_status(resp: reqwest::Response, guarded_write: bool) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let excerpt = truncate_body(&body);

        if guarded_write && status == StatusCode::PRECONDITION_FAILED {
            return Err(Error::PreconditionFailed {
                status: status.as_u16(),
                body_excerpt: excerpt,
            });
        }

        Err(Error::RemoteStatus {
            status: status.as_u16(),
            body_excerpt: excerpt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: String) -> AdminClient {
        AdminClient::new(AdminClientConfig {
            base_url,
            auth: AuthKind::None,
            credentials: Credentials::default(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn health_check_true_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        assert!(client.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn health_check_false_on_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        assert!(!client.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn get_config_returns_body_and_etag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"apps": {}}))
                    .insert_header("etag", "\"v1\""),
            )
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let (doc, etag) = client.get_config("").await.unwrap();
        assert_eq!(doc, serde_json::json!({"apps": {}}));
        assert_eq!(etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn bearer_auth_sends_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .and(header("authorization", "Bearer T"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = AdminClient::new(AdminClientConfig {
            base_url: server.uri(),
            auth: AuthKind::Bearer,
            credentials: Credentials::new([("token".to_string(), "T".to_string())]),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        })
        .unwrap();

        client.get_config("").await.unwrap();
    }

    #[tokio::test]
    async fn set_config_sends_if_match_and_maps_412_to_precondition_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .and(header("if-match", "v0"))
            .respond_with(ResponseTemplate::new(412).set_body_json(serde_json::json!({"error": "stale etag"})))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let err = client
            .set_config("", &serde_json::json!({"apps": {}}), "v0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { status: 412, .. }));
    }

    #[tokio::test]
    async fn set_config_without_if_match_maps_412_to_plain_remote_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let err = client
            .set_config("", &serde_json::json!({}), "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteStatus { status: 412, .. }));
        assert!(!matches!(err, Error::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn adapt_config_surfaces_error_field_on_4xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/adapt"))
            .and(query_param("adapter", "caddyfile"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "malformed directive"})))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let err = client.adapt_config("bad {", Some("caddyfile")).await.unwrap_err();
        match err {
            Error::RemoteStatus { status, body_excerpt } => {
                assert_eq!(status, 400);
                assert_eq!(body_excerpt, "malformed directive");
            }
            other => panic!("expected RemoteStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn adapt_config_happy_path_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/adapt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"apps": {"http": "adapted"}})))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let doc = client
            .adapt_config("example.com { reverse_proxy localhost:8080 }", Some("caddyfile"))
            .await
            .unwrap();
        assert_eq!(doc, serde_json::json!({"apps": {"http": "adapted"}}));
    }

    #[tokio::test]
    async fn delete_config_issues_delete_on_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/config/apps/http/servers/srv0"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        client
            .delete_config("apps/http/servers/srv0")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn transport_error_on_unreachable_host() {
        let client = client_for("http://127.0.0.1:1".to_string());
        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn mtls_auth_without_cert_path_fails_construction() {
        let err = AdminClient::new(AdminClientConfig {
            base_url: "https://stub".to_string(),
            auth: AuthKind::Mtls,
            credentials: Credentials::default(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        })
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
