//! Remote service client.
//!
//! A thin wrapper around an injectable HTTP transport: attaches bearer
//! auth (except on device-flow endpoints), retries non-4xx failures with
//! exponential backoff, and maps non-2xx responses to the typed API error.
//! The client is constructed explicitly and passed down; tests substitute
//! a fake transport.

use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

use crate::error::SyncError;

/// Retry ceiling for outbound requests.
pub const MAX_ATTEMPTS: u32 = 3;
/// First retry delay; doubles per attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(500);
/// Device-flow polling cadence.
const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Device-flow polling ceiling before a hard timeout error.
const DEVICE_POLL_MAX_ATTEMPTS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound request, fully resolved (URL, auth, body).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// The narrow transport contract. Production uses [`ReqwestTransport`];
/// tests inject fakes.
pub trait HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Blocking reqwest-backed transport.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("agent-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ReqwestTransport { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .with_context(|| format!("Request to {} failed", request.url))?;
        let status = response.status().as_u16();
        let text = response.text().unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(ApiResponse { status, body })
    }
}

/// Receipt for an uploaded session.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub id: String,
    pub url: Option<String>,
}

/// The authenticated account, as reported by the service.
#[derive(Debug, Clone)]
pub struct Account {
    pub email: Option<String>,
    pub username: Option<String>,
}

/// Device-flow authorization handed to the user.
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
}

/// Client for the sharing service API.
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    transport: Box<dyn HttpTransport>,
    backoff_base: Duration,
    poll_interval: Duration,
}

impl ApiClient {
    pub fn new(base_url: String, token: Option<String>) -> Result<Self> {
        Ok(Self::with_transport(
            base_url,
            token,
            Box::new(ReqwestTransport::new()?),
        ))
    }

    pub fn with_transport(
        base_url: String,
        token: Option<String>,
        transport: Box<dyn HttpTransport>,
    ) -> Self {
        ApiClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            transport,
            backoff_base: BACKOFF_BASE,
            poll_interval: DEVICE_POLL_INTERVAL,
        }
    }

    /// Zero out sleep intervals. Used by tests.
    pub fn without_delays(mut self) -> Self {
        self.backoff_base = Duration::ZERO;
        self.poll_interval = Duration::ZERO;
        self
    }

    /// Upload a session payload. Returns the service-assigned id and URL.
    pub fn upload_session(&self, payload: &Value) -> Result<UploadReceipt> {
        let body = self.request(Method::Post, "/api/sessions", Some(payload.clone()), true)?;
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .context("Upload response carried no session id")?
            .to_string();
        let url = body.get("url").and_then(Value::as_str).map(String::from);
        Ok(UploadReceipt { id, url })
    }

    /// Download a previously uploaded session payload.
    pub fn fetch_session(&self, id: &str) -> Result<Value> {
        self.request(Method::Get, &format!("/api/sessions/{id}"), None, true)
    }

    /// Who is the stored token logged in as?
    pub fn whoami(&self) -> Result<Account> {
        let body = self.request(Method::Get, "/api/user", None, true)?;
        Ok(Account {
            email: body.get("email").and_then(Value::as_str).map(String::from),
            username: body
                .get("username")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    /// Start the device login flow. Unauthenticated by design.
    pub fn begin_device_login(&self) -> Result<DeviceAuthorization> {
        let body = self.request(Method::Post, "/api/auth/device", None, false)?;
        Ok(DeviceAuthorization {
            device_code: body
                .get("deviceCode")
                .and_then(Value::as_str)
                .context("Device authorization response carried no device code")?
                .to_string(),
            user_code: body
                .get("userCode")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            verification_uri: body
                .get("verificationUri")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Poll for the device-flow token at a fixed interval, bounded by a
    /// fixed attempt count, then fail with a hard timeout error.
    pub fn poll_device_token(&self, device_code: &str) -> Result<String> {
        let body = serde_json::json!({ "deviceCode": device_code });

        for _ in 0..DEVICE_POLL_MAX_ATTEMPTS {
            let response = self.request(
                Method::Post,
                "/api/auth/device/token",
                Some(body.clone()),
                false,
            )?;

            if let Some(token) = response.get("token").and_then(Value::as_str) {
                return Ok(token.to_string());
            }
            // Anything else with a 2xx status means "authorization pending".
            std::thread::sleep(self.poll_interval);
        }

        anyhow::bail!(
            "Login timed out after {} seconds; run `agent-sync login` to try again",
            DEVICE_POLL_INTERVAL.as_secs() * DEVICE_POLL_MAX_ATTEMPTS as u64
        )
    }

    /// Issue a request with bounded retries. 4xx responses are caller
    /// errors and surface immediately; transport failures and 5xx
    /// responses retry with exponential backoff up to [`MAX_ATTEMPTS`].
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        authenticated: bool,
    ) -> Result<Value> {
        let bearer = if authenticated {
            Some(self.token.clone().ok_or(SyncError::AuthMissing)?)
        } else {
            None
        };

        let request = ApiRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            bearer,
            body,
        };

        let mut last_failure: Option<anyhow::Error> = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                std::thread::sleep(self.backoff_base * 2u32.pow(attempt - 1));
            }

            match self.transport.execute(&request) {
                Ok(response) if (200..300).contains(&response.status) => {
                    return Ok(response.body);
                }
                Ok(response) if (400..500).contains(&response.status) => {
                    if response.status == 401 {
                        return Err(SyncError::AuthMissing.into());
                    }
                    return Err(SyncError::Api {
                        status: response.status,
                        message: error_message(&response.body),
                    }
                    .into());
                }
                Ok(response) => {
                    log::warn!(
                        "Request to {} failed with status {} (attempt {}/{MAX_ATTEMPTS})",
                        request.url,
                        response.status,
                        attempt + 1
                    );
                    last_failure = Some(
                        SyncError::Api {
                            status: response.status,
                            message: error_message(&response.body),
                        }
                        .into(),
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Request to {} failed: {e} (attempt {}/{MAX_ATTEMPTS})",
                        request.url,
                        attempt + 1
                    );
                    last_failure = Some(e);
                }
            }
        }

        Err(last_failure
            .unwrap_or_else(|| anyhow::anyhow!("Request to {} failed", request.url)))
    }
}

fn error_message(body: &Value) -> String {
    body.get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("no error detail provided")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Serves canned responses and records how many calls it saw.
    struct FakeTransport {
        responses: RefCell<Vec<ApiResponse>>,
        calls: Rc<RefCell<Vec<ApiRequest>>>,
    }

    impl FakeTransport {
        fn new(responses: Vec<ApiResponse>) -> (Self, Rc<RefCell<Vec<ApiRequest>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            (
                FakeTransport {
                    responses: RefCell::new(responses),
                    calls: Rc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl HttpTransport for FakeTransport {
        fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.calls.borrow_mut().push(request.clone());
            let mut responses = self.responses.borrow_mut();
            if responses.is_empty() {
                anyhow::bail!("connection refused");
            }
            Ok(responses.remove(0))
        }
    }

    fn response(status: u16, body: Value) -> ApiResponse {
        ApiResponse { status, body }
    }

    fn client_with(
        responses: Vec<ApiResponse>,
        token: Option<&str>,
    ) -> (ApiClient, Rc<RefCell<Vec<ApiRequest>>>) {
        let (transport, calls) = FakeTransport::new(responses);
        let client = ApiClient::with_transport(
            "https://api.test".to_string(),
            token.map(String::from),
            Box::new(transport),
        )
        .without_delays();
        (client, calls)
    }

    #[test]
    fn test_4xx_is_terminal_after_one_attempt() {
        let (client, calls) = client_with(
            vec![response(404, serde_json::json!({"error": "not found"}))],
            Some("tok"),
        );

        let err = client.fetch_session("missing").unwrap_err();
        match err.downcast_ref::<SyncError>() {
            Some(SyncError::Api { status, message }) => {
                assert_eq!(*status, 404);
                assert_eq!(message, "not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_5xx_retries_to_ceiling_then_surfaces() {
        let (client, calls) = client_with(
            vec![
                response(500, Value::Null),
                response(502, Value::Null),
                response(500, Value::Null),
            ],
            Some("tok"),
        );

        let err = client.fetch_session("s1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::Api { status: 500, .. })
        ));
        assert_eq!(calls.borrow().len(), MAX_ATTEMPTS as usize);
    }

    #[test]
    fn test_5xx_then_success_recovers() {
        let (client, calls) = client_with(
            vec![
                response(503, Value::Null),
                response(200, serde_json::json!({"platform": "claude"})),
            ],
            Some("tok"),
        );

        let body = client.fetch_session("s1").unwrap();
        assert_eq!(body["platform"], "claude");
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_transport_error_retries() {
        // Empty response queue: every call errors at the transport level.
        let (client, calls) = client_with(vec![], Some("tok"));
        let err = client.fetch_session("s1").unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(calls.borrow().len(), MAX_ATTEMPTS as usize);
    }

    #[test]
    fn test_missing_token_fails_before_any_request() {
        let (client, calls) = client_with(vec![response(200, Value::Null)], None);
        let err = client.whoami().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::AuthMissing)
        ));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_401_maps_to_auth_missing() {
        let (client, _) = client_with(vec![response(401, Value::Null)], Some("expired"));
        let err = client.whoami().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::AuthMissing)
        ));
    }

    #[test]
    fn test_bearer_attached_except_device_flow() {
        let (client, calls) = client_with(
            vec![
                response(200, serde_json::json!({"deviceCode": "d", "userCode": "u", "verificationUri": "https://x"})),
                response(200, serde_json::json!({"email": "a@b.c"})),
            ],
            Some("tok"),
        );

        client.begin_device_login().unwrap();
        client.whoami().unwrap();

        let calls = calls.borrow();
        assert_eq!(calls[0].bearer, None);
        assert_eq!(calls[1].bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn test_device_poll_pending_then_token() {
        let (client, calls) = client_with(
            vec![
                response(200, serde_json::json!({"status": "pending"})),
                response(200, serde_json::json!({"status": "pending"})),
                response(200, serde_json::json!({"token": "tok_new"})),
            ],
            None,
        );

        let token = client.poll_device_token("d").unwrap();
        assert_eq!(token, "tok_new");
        assert_eq!(calls.borrow().len(), 3);
    }

    #[test]
    fn test_device_poll_times_out_at_attempt_ceiling() {
        let pending: Vec<ApiResponse> = (0..DEVICE_POLL_MAX_ATTEMPTS)
            .map(|_| response(200, serde_json::json!({"status": "pending"})))
            .collect();
        let (client, calls) = client_with(pending, None);

        let err = client.poll_device_token("d").unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(calls.borrow().len(), DEVICE_POLL_MAX_ATTEMPTS as usize);
    }

    #[test]
    fn test_upload_receipt_parsing() {
        let (client, _) = client_with(
            vec![response(
                201,
                serde_json::json!({"id": "sess_1", "url": "https://share/sess_1"}),
            )],
            Some("tok"),
        );
        let receipt = client
            .upload_session(&serde_json::json!({"platform": "claude"}))
            .unwrap();
        assert_eq!(receipt.id, "sess_1");
        assert_eq!(receipt.url.as_deref(), Some("https://share/sess_1"));
    }
}
