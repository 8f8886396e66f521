//! Stateless signed-request probe.
//!
//! Every check sends one freshly signed `POST {base}{path}` with the
//! `AppKey`, `Nonce`, `CurTime` and `CheckSum` headers and a form-encoded body,
//! then decodes the reply as `{"code": ..., "desc": ...}` and compares it with
//! the configured healthy markers.
//!
//! The default configuration targets an upload endpoint with an empty
//! `content` parameter: a live API rejects it with code `414` /
//! `"content is empty"`, and that rejection is the healthy signal.
//!
//! Each probe owns its own [`reqwest::Client`]. Base address and identity
//! headers are fixed when the probe is built and never shared with another
//! instance.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client,
};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use super::{CheckContext, HealthStatus, Probe, ProbeResult};
use crate::{
    deadline,
    error::{ConfigError, ProbeError},
    signer::{self, Nonce, TimestampPrecision},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// Header names go out lowercased; the remote API matches them case-insensitively.
const APP_KEY: HeaderName = HeaderName::from_static("appkey");
const NONCE: HeaderName = HeaderName::from_static("nonce");
const CUR_TIME: HeaderName = HeaderName::from_static("curtime");
const CHECK_SUM: HeaderName = HeaderName::from_static("checksum");

/// Settings for one [`SignedHttpProbe`].
#[derive(Debug, Clone)]
pub struct SignedHttpConfig {
    pub base_url: String,
    /// Joined onto `base_url`; a relative path such as `nimserver/msg/upload.action`.
    pub path: String,
    pub app_key: String,
    pub app_secret: String,
    pub params: FormParams,
    pub precision: TimestampPrecision,
    /// Expected `code`. Empty ignores the field.
    pub healthy_code: String,
    /// Expected `desc`. Empty ignores the field.
    pub healthy_desc: String,
    /// Status reported when the response decodes but the markers don't match.
    pub mismatch_status: MismatchStatus,
    /// Upper bound for the whole exchange, headers and body together. The
    /// check's own timeout still applies when it is shorter.
    pub client_timeout: Duration,
}

impl SignedHttpConfig {
    /// Defaults for everything except identity.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            base_url: defaults::base_url(),
            path: defaults::path(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            params: defaults::params(),
            precision: TimestampPrecision::default(),
            healthy_code: defaults::healthy_code(),
            healthy_desc: defaults::healthy_desc(),
            mismatch_status: MismatchStatus::default(),
            client_timeout: defaults::client_timeout(),
        }
    }

    /// True when `reply` satisfies every non-empty marker.
    fn matches(&self, reply: &ApiReply) -> bool {
        let code_ok =
            self.healthy_code.is_empty() || reply.code.as_deref() == Some(self.healthy_code.as_str());
        let desc_ok =
            self.healthy_desc.is_empty() || reply.desc.as_deref() == Some(self.healthy_desc.as_str());
        code_ok && desc_ok
    }
}

/// Verdict for a well-formed reply that misses the markers. A mismatch is
/// never healthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchStatus {
    #[default]
    Unhealthy,
    Degraded,
}

impl From<MismatchStatus> for HealthStatus {
    fn from(status: MismatchStatus) -> Self {
        match status {
            MismatchStatus::Unhealthy => HealthStatus::Unhealthy,
            MismatchStatus::Degraded => HealthStatus::Degraded,
        }
    }
}

pub mod defaults {
    use std::time::Duration;

    use super::FormParams;

    pub fn base_url() -> String {
        "https://api.netease.im/".into()
    }
    pub fn path() -> String {
        "nimserver/msg/upload.action".into()
    }
    pub fn params() -> FormParams {
        FormParams::new().with("content", "")
    }
    pub fn healthy_code() -> String {
        "414".into()
    }
    pub fn healthy_desc() -> String {
        "content is empty".into()
    }
    pub fn client_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

/// A single request parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl ParamValue {
    /// Form representation, or `None` when the entry should be dropped.
    fn form_value(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) if s.is_empty() => None,
            Self::Text(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Ordered request parameters, encoded as the form body.
///
/// Insertion order is kept so the body is stable across checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormParams(Vec<(String, ParamValue)>);

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing an existing entry in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `application/x-www-form-urlencoded` body. Null and empty values are skipped.
    pub fn encode(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.0 {
            if let Some(v) = value.form_value() {
                form.append_pair(name, &v);
            }
        }
        form.finish()
    }
}

impl<'de> Deserialize<'de> for FormParams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = FormParams;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a table of request parameters")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(self, mut map: A) -> Result<FormParams, A::Error> {
                let mut params = FormParams::new();
                while let Some((name, value)) = map.next_entry::<String, ParamValue>()? {
                    params.insert(name, value);
                }
                Ok(params)
            }
        }

        deserializer.deserialize_map(Visitor)
    }
}

/// The two fields the probe reads from the response body.
#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default, deserialize_with = "string_or_number")]
    code: Option<String>,
    #[serde(default)]
    desc: Option<String>,
}

/// The API sends `code` as a number; accept either form.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(d)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Health probe that signs and sends one HTTP request per check.
pub struct SignedHttpProbe {
    config: SignedHttpConfig,
    target: Url,
    client: Client,
    nonce: Nonce,
}

impl SignedHttpProbe {
    /// Build the probe and its HTTP client.
    ///
    /// # Errors
    /// Fails immediately on missing identity, an unparseable address, or a
    /// header value that cannot be sent.
    pub fn new(config: SignedHttpConfig) -> Result<Self, ConfigError> {
        Self::with_nonce(config, Nonce::generate())
    }

    pub fn with_nonce(config: SignedHttpConfig, nonce: Nonce) -> Result<Self, ConfigError> {
        if config.app_key.is_empty() {
            return Err(ConfigError::Missing("app_key"));
        }
        if config.app_secret.is_empty() {
            return Err(ConfigError::Missing("app_secret"));
        }

        let target = target_url(&config.base_url, &config.path)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            APP_KEY,
            HeaderValue::from_str(&config.app_key).map_err(|_| ConfigError::InvalidHeader("AppKey"))?,
        );
        headers.insert(
            NONCE,
            HeaderValue::from_str(nonce.as_str()).map_err(|_| ConfigError::InvalidHeader("Nonce"))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(ConfigError::Client)?;

        Ok(Self {
            config,
            target,
            client,
            nonce,
        })
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Send the signed request and return the raw response body.
    async fn exchange(&self, ctx: &CheckContext) -> Result<String, ProbeError> {
        let cur_time = signer::timestamp(self.config.precision);
        let checksum = signer::sign(&self.config.app_secret, self.nonce.as_str(), &cur_time);

        let request = self
            .client
            .post(self.target.clone())
            .header(CUR_TIME, cur_time)
            .header(CHECK_SUM, checksum)
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(self.config.params.encode());

        // One deadline covers the headers and the body; a server that stalls
        // mid-body still times out.
        let bound = ctx.timeout.min(self.config.client_timeout);
        let probe = ctx.name.clone();
        let exchange = async move {
            let response = request.send().await?;
            tracing::debug!(probe = %probe, status = %response.status(), "response received");
            response.text().await
        };
        deadline::race_with_cancel(bound, &ctx.cancel, exchange).await
    }

    /// Compare a decoded body with the healthy markers.
    fn classify(&self, body: String) -> Result<ProbeResult, ProbeError> {
        let reply: ApiReply = serde_json::from_str(&body)?;
        if self.config.matches(&reply) {
            return Ok(ProbeResult::healthy());
        }
        Ok(match self.config.mismatch_status {
            MismatchStatus::Degraded => ProbeResult::degraded(body),
            MismatchStatus::Unhealthy => ProbeResult::unhealthy(body),
        })
    }
}

fn target_url(base: &str, path: &str) -> Result<Url, ConfigError> {
    let invalid = |source| ConfigError::InvalidUrl {
        url: format!("{base}{path}"),
        source,
    };
    // Without a trailing slash `join` would replace the last base segment.
    let base = if base.ends_with('/') {
        Url::parse(base)
    } else {
        Url::parse(&format!("{base}/"))
    }
    .map_err(invalid)?;
    base.join(path.trim_start_matches('/')).map_err(invalid)
}

#[async_trait]
impl Probe for SignedHttpProbe {
    #[tracing::instrument(skip_all, fields(probe = %ctx.name, target = %self.target))]
    async fn check(&self, ctx: &CheckContext) -> ProbeResult {
        let started = Instant::now();
        let result = match self.exchange(ctx).await.and_then(|body| self.classify(body)) {
            Ok(result) => result,
            Err(e) => ctx.fail(e),
        };
        result.with_elapsed(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::FailureKind;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn config_for(server: &MockServer) -> SignedHttpConfig {
        SignedHttpConfig {
            base_url: server.uri(),
            ..SignedHttpConfig::new("app-key", "app-secret")
        }
    }

    async fn mount_reply(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/nimserver/msg/upload.action"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn header_str<'a>(req: &'a wiremock::Request, name: &str) -> &'a str {
        req.headers.get(name).unwrap().to_str().unwrap()
    }

    // -----------------------------------------------------------------------
    // Form encoding
    // -----------------------------------------------------------------------

    #[test]
    fn encode_skips_empty_and_null_values_and_lowercases_bools() {
        let params = FormParams::new()
            .with("content", "")
            .with("missing", None::<String>)
            .with("flag", true)
            .with("name", "a b&c")
            .with("count", 3_i64);
        assert_eq!(params.encode(), "flag=true&name=a+b%26c&count=3");
    }

    #[test]
    fn encode_of_default_params_is_empty() {
        assert_eq!(defaults::params().encode(), "");
    }

    #[test]
    fn insert_replaces_existing_entry_in_place() {
        let mut params = FormParams::new().with("a", "1").with("b", "2");
        params.insert("a", "3");
        assert_eq!(params.len(), 2);
        assert_eq!(params.encode(), "a=3&b=2");
    }

    #[test]
    fn params_deserialize_from_a_table() {
        let params: FormParams = toml::from_str(
            r#"
            z = "1"
            a = false
            m = ""
            "#,
        )
        .unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.encode(), "z=1&a=false");
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn new_rejects_missing_identity() {
        let err = SignedHttpProbe::new(SignedHttpConfig::new("", "secret")).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("app_key")));

        let err = SignedHttpProbe::new(SignedHttpConfig::new("key", "")).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("app_secret")));
    }

    #[test]
    fn new_rejects_unparseable_base_url() {
        let cfg = SignedHttpConfig {
            base_url: "not a url".into(),
            ..SignedHttpConfig::new("key", "secret")
        };
        assert!(matches!(
            SignedHttpProbe::new(cfg).err().unwrap(),
            ConfigError::InvalidUrl { .. }
        ));
    }

    #[test]
    fn target_joins_base_and_path_without_dropping_segments() {
        let url = target_url("https://example.com/api", "/v1/check").unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/v1/check");

        let probe = SignedHttpProbe::new(SignedHttpConfig::new("key", "secret")).unwrap();
        assert_eq!(
            probe.target().as_str(),
            "https://api.netease.im/nimserver/msg/upload.action"
        );
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn default_markers_report_healthy_on_content_is_empty() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "414", "desc": "content is empty" })).await;

        let probe = SignedHttpProbe::new(config_for(&server)).unwrap();
        let result = probe.check(&CheckContext::new("im")).await;

        assert_eq!(result.status(), HealthStatus::Healthy, "{result:?}");
        assert!(result.elapsed().is_some());
    }

    #[tokio::test]
    async fn numeric_code_matches_string_marker() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": 414, "desc": "content is empty" })).await;

        let probe = SignedHttpProbe::new(config_for(&server)).unwrap();
        assert!(probe.check(&CheckContext::new("im")).await.is_healthy());
    }

    #[tokio::test]
    async fn mismatched_reply_is_unhealthy_with_raw_body() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "200", "desc": "ok" })).await;

        let probe = SignedHttpProbe::new(config_for(&server)).unwrap();
        let result = probe.check(&CheckContext::new("im")).await;

        assert_eq!(result.status(), HealthStatus::Unhealthy);
        assert!(result.cause().is_none());
        let desc = result.description().unwrap();
        assert!(desc.contains("\"code\":\"200\""), "raw body expected, got: {desc}");
    }

    #[tokio::test]
    async fn empty_markers_accept_any_well_formed_reply() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "200", "desc": "ok" })).await;

        let cfg = SignedHttpConfig {
            healthy_code: String::new(),
            healthy_desc: String::new(),
            ..config_for(&server)
        };
        let probe = SignedHttpProbe::new(cfg).unwrap();
        assert!(probe.check(&CheckContext::new("im")).await.is_healthy());
    }

    #[tokio::test]
    async fn single_marker_ignores_the_other_field() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "414", "desc": "something else" })).await;

        let cfg = SignedHttpConfig {
            healthy_desc: String::new(),
            ..config_for(&server)
        };
        let probe = SignedHttpProbe::new(cfg).unwrap();
        assert!(probe.check(&CheckContext::new("im")).await.is_healthy());
    }

    #[tokio::test]
    async fn mismatch_status_can_report_degraded() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "200", "desc": "ok" })).await;

        let cfg = SignedHttpConfig {
            mismatch_status: MismatchStatus::Degraded,
            ..config_for(&server)
        };
        let probe = SignedHttpProbe::new(cfg).unwrap();
        assert_eq!(
            probe.check(&CheckContext::new("im")).await.status(),
            HealthStatus::Degraded
        );
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn undecodable_body_uses_failure_status_and_keeps_cause() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let probe = SignedHttpProbe::new(config_for(&server)).unwrap();
        let ctx = CheckContext::new("im").with_failure_status(HealthStatus::Degraded);
        let result = probe.check(&ctx).await;

        assert_eq!(result.status(), HealthStatus::Degraded);
        assert_eq!(result.cause().unwrap().kind(), FailureKind::Decode);
    }

    #[tokio::test]
    async fn slow_server_yields_timeout_cause() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "code": "414", "desc": "content is empty" }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let probe = SignedHttpProbe::new(config_for(&server)).unwrap();
        let ctx = CheckContext::new("im").with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let result = probe.check(&ctx).await;

        assert_eq!(result.status(), HealthStatus::Unhealthy);
        assert_eq!(result.cause().unwrap().kind(), FailureKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn body_stalled_after_headers_yields_timeout_cause() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n{")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let cfg = SignedHttpConfig {
            base_url: format!("http://{addr}/"),
            client_timeout: Duration::from_millis(300),
            ..SignedHttpConfig::new("key", "secret")
        };
        let probe = SignedHttpProbe::new(cfg).unwrap();
        let started = Instant::now();
        let result = probe.check(&CheckContext::new("im")).await;

        assert_eq!(result.status(), HealthStatus::Unhealthy);
        assert_eq!(result.cause().unwrap().kind(), FailureKind::Timeout, "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unreachable_server_yields_transport_cause() {
        let cfg = SignedHttpConfig {
            base_url: "http://127.0.0.1:1/".into(),
            ..SignedHttpConfig::new("key", "secret")
        };
        let probe = SignedHttpProbe::new(cfg).unwrap();
        let result = probe.check(&CheckContext::new("im")).await;

        assert_eq!(result.status(), HealthStatus::Unhealthy);
        assert_eq!(result.cause().unwrap().kind(), FailureKind::Transport);
    }

    // -----------------------------------------------------------------------
    // Wire format
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn request_carries_signed_headers_and_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nimserver/msg/upload.action"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "code": "414", "desc": "content is empty" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cfg = SignedHttpConfig {
            params: FormParams::new().with("content", "").with("flag", true),
            ..config_for(&server)
        };
        let probe = SignedHttpProbe::with_nonce(cfg, Nonce::from("fixed-nonce")).unwrap();
        assert!(probe.check(&CheckContext::new("im")).await.is_healthy());

        let requests = server.received_requests().await.unwrap();
        let req = &requests[0];
        assert_eq!(header_str(req, "AppKey"), "app-key");
        assert_eq!(header_str(req, "Nonce"), "fixed-nonce");

        let cur_time = header_str(req, "CurTime");
        assert_eq!(cur_time.len(), 13);
        assert!(cur_time.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(
            header_str(req, "CheckSum"),
            signer::sign("app-secret", "fixed-nonce", cur_time)
        );
        assert_eq!(String::from_utf8_lossy(&req.body), "flag=true");
    }

    #[tokio::test]
    async fn seconds_precision_sends_ten_digit_curtime() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "414", "desc": "content is empty" })).await;

        let cfg = SignedHttpConfig {
            precision: TimestampPrecision::Seconds,
            ..config_for(&server)
        };
        SignedHttpProbe::new(cfg)
            .unwrap()
            .check(&CheckContext::new("im"))
            .await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(header_str(&requests[0], "CurTime").len(), 10);
    }

    #[tokio::test]
    async fn nonce_is_reused_across_checks_of_one_instance() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "414", "desc": "content is empty" })).await;

        let probe = SignedHttpProbe::new(config_for(&server)).unwrap();
        let ctx = CheckContext::new("im");
        probe.check(&ctx).await;
        probe.check(&ctx).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(header_str(&requests[0], "Nonce"), probe.nonce().as_str());
        assert_eq!(header_str(&requests[1], "Nonce"), probe.nonce().as_str());
    }

    #[tokio::test]
    async fn instances_keep_their_own_identity_headers() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "code": "414", "desc": "content is empty" })).await;

        let first = SignedHttpProbe::new(config_for(&server)).unwrap();
        let second = SignedHttpProbe::new(SignedHttpConfig {
            base_url: server.uri(),
            ..SignedHttpConfig::new("other-key", "other-secret")
        })
        .unwrap();

        let ctx = CheckContext::new("im");
        first.check(&ctx).await;
        second.check(&ctx).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(header_str(&requests[0], "AppKey"), "app-key");
        assert_eq!(header_str(&requests[1], "AppKey"), "other-key");
        assert_ne!(header_str(&requests[0], "Nonce"), header_str(&requests[1], "Nonce"));
    }
}
