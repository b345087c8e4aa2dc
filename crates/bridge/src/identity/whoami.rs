use super::{IdentityRecord, ObjectKind, SessionVerifier, Verification};
use crate::config::IdentityEndpointConfig;
use crate::error::{SetupError, VerifyError};
use crate::identity::tls::pinned_client_config;
use crate::principal::PrincipalName;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Path of the JSON-RPC endpoint below the `/ipa` base.
pub const WHOAMI_PATH: &str = "/session/json";
/// Name of the cookie carrying the session secret.
pub const SESSION_COOKIE: &str = "ipa_session";

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Checks a session secret against the directory's `whoami` method.
pub struct WhoamiClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    endpoint: Uri,
    referer: String,
    api_version: String,
    timeout: Duration,
}

impl WhoamiClient {
    pub fn new(config: &IdentityEndpointConfig) -> Result<Self, SetupError> {
        let base = config.base_url();
        let endpoint: Uri = format!("{base}{WHOAMI_PATH}")
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| SetupError::InvalidEndpoint(e.to_string()))?;
        if endpoint.scheme_str() != Some("https") || endpoint.host().is_none() {
            return Err(SetupError::InvalidEndpoint(endpoint.to_string()));
        }

        let tls = pinned_client_config(&config.ca_cert_path)?;
        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_only()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            endpoint,
            referer: base,
            api_version: config.api_version.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// The `whoami` call for one session, ready to send.
    fn build_request(&self, session: &SecretString) -> Result<Request<Full<Bytes>>, VerifyError> {
        let secret = session.expose_secret();
        // one cookie only
        if secret.is_empty()
            || secret
                .chars()
                .any(|c| c == ';' || c == ',' || c.is_whitespace())
        {
            return Err(VerifyError::InvalidCookie);
        }
        let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={secret}"))
            .map_err(|_| VerifyError::InvalidCookie)?;

        Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header(header::REFERER, self.referer.as_str())
            .header(header::COOKIE, cookie)
            .body(Full::new(Bytes::from(whoami_payload(&self.api_version))))
            .map_err(|e| VerifyError::Network(e.to_string()))
    }

    async fn round_trip(&self, session: &SecretString) -> Result<IdentityRecord, VerifyError> {
        let request = self.build_request(session)?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| VerifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Http { status });
        }

        let body = Limited::new(response.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    VerifyError::BodyTooLarge(MAX_BODY_BYTES)
                } else {
                    VerifyError::Network(e.to_string())
                }
            })?
            .to_bytes();

        interpret_response(status, &body)
    }
}

impl SessionVerifier for WhoamiClient {
    #[tracing::instrument(name = "whoami", skip_all, fields(endpoint = %self.endpoint))]
    async fn verify(&self, session: &SecretString) -> Verification {
        match tokio::time::timeout(self.timeout, self.round_trip(session)).await {
            Ok(Ok(record)) => {
                debug!(
                    principal = %record.principal,
                    object = ?record.object_kind,
                    "Session verified"
                );
                Verification::Verified(record)
            }
            Ok(Err(VerifyError::Unverified)) => {
                debug!("Session is not authenticated");
                Verification::Failed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Identity verification failed");
                Verification::Failed
            }
            Err(_) => {
                warn!(error = %VerifyError::Timeout(self.timeout), "Identity verification failed");
                Verification::Failed
            }
        }
    }
}

/// JSON-RPC body of a `whoami` call.
pub fn whoami_payload(api_version: &str) -> String {
    serde_json::json!({
        "id": 0,
        "method": "whoami/1",
        "params": [[], { "version": api_version }],
    })
    .to_string()
}

#[derive(Deserialize)]
struct WhoamiEnvelope {
    #[serde(default)]
    result: Option<WhoamiResult>,
    #[serde(default)]
    principal: Option<String>,
}

#[derive(Deserialize)]
struct WhoamiResult {
    object: String,
    #[serde(default)]
    arguments: Vec<Value>,
}

/// Turn a `whoami` response into an identity record.
///
/// A missing or null `result` means the session is not authenticated and is
/// reported as [`VerifyError::Unverified`].
pub fn interpret_response(status: StatusCode, body: &[u8]) -> Result<IdentityRecord, VerifyError> {
    if !status.is_success() {
        return Err(VerifyError::Http { status });
    }

    let raw: Value =
        serde_json::from_slice(body).map_err(|e| VerifyError::InvalidJson(e.to_string()))?;
    let envelope = WhoamiEnvelope::deserialize(&raw)
        .map_err(|e| VerifyError::InvalidJson(e.to_string()))?;

    let Some(result) = envelope.result else {
        return Err(VerifyError::Unverified);
    };
    let principal = envelope.principal.ok_or(VerifyError::Unverified)?;
    let principal = PrincipalName::parse(&principal)?;

    let arguments = result
        .arguments
        .iter()
        .filter_map(|arg| arg.as_str().map(str::to_string))
        .collect();

    Ok(IdentityRecord::new(
        principal,
        ObjectKind::from_object_class(&result.object),
        arguments,
        raw,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> WhoamiClient {
        let mut config = IdentityEndpointConfig::new("ipa.example.com");
        config.ca_cert_path =
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ipa-ca.pem");
        WhoamiClient::new(&config).unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn request_carries_session_cookie_and_json_rpc_body() {
        let request = client()
            .build_request(&secret("MagBearerToken=abc123"))
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(
            request.uri().to_string(),
            "https://ipa.example.com/ipa/session/json"
        );
        let headers = request.headers();
        assert_eq!(headers[header::COOKIE], "ipa_session=MagBearerToken=abc123");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert_eq!(headers[header::REFERER], "https://ipa.example.com/ipa");
        assert_eq!(headers.get_all(header::COOKIE).iter().count(), 1);

        let body = request.into_body().collect().await.unwrap().to_bytes();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["method"], "whoami/1");
        assert_eq!(payload["params"][1]["version"], "2.254");
    }

    #[tokio::test]
    async fn secrets_that_smuggle_cookies_are_refused() {
        let client = client();
        for bad in ["x; other=y", "x,other=y", "x other", "x\tother", ""] {
            assert!(
                matches!(
                    client.build_request(&secret(bad)),
                    Err(VerifyError::InvalidCookie)
                ),
                "{bad:?} accepted"
            );
        }
        assert!(client.build_request(&secret("x\nother")).is_err());
    }

    #[test]
    fn payload_matches_json_rpc_shape() {
        let payload: Value = serde_json::from_str(&whoami_payload("2.254")).unwrap();
        assert_eq!(payload["id"], 0);
        assert_eq!(payload["method"], "whoami/1");
        assert_eq!(payload["params"][0], serde_json::json!([]));
        assert_eq!(payload["params"][1]["version"], "2.254");
    }

    #[test]
    fn host_response_is_verified() {
        let body = br#"{
            "result": {"object": "host", "command": "host_show/1", "arguments": ["web1.example.com"]},
            "error": null,
            "id": 0,
            "principal": "host/web1.example.com@EXAMPLE.COM",
            "version": "4.12.2"
        }"#;
        let record = interpret_response(StatusCode::OK, body).unwrap();
        assert_eq!(record.principal.to_string(), "host/web1.example.com@EXAMPLE.COM");
        assert_eq!(record.object_kind, ObjectKind::Host);
        assert_eq!(record.registered_hostname(), Some("web1.example.com"));
        assert_eq!(record.raw["version"], "4.12.2");
    }

    #[test]
    fn null_result_is_unverified() {
        let body = br#"{"result": null, "error": null, "principal": "host/web1.example.com@EXAMPLE.COM"}"#;
        assert!(matches!(
            interpret_response(StatusCode::OK, body),
            Err(VerifyError::Unverified)
        ));
        assert!(matches!(
            interpret_response(StatusCode::OK, br#"{"error": null}"#),
            Err(VerifyError::Unverified)
        ));
    }

    #[test]
    fn non_success_status_is_rejected_before_parsing() {
        assert!(matches!(
            interpret_response(StatusCode::INTERNAL_SERVER_ERROR, b"not json"),
            Err(VerifyError::Http { status }) if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(matches!(
            interpret_response(StatusCode::UNAUTHORIZED, b""),
            Err(VerifyError::Http { .. })
        ));
    }

    #[test]
    fn garbage_and_bad_principals_fail() {
        assert!(matches!(
            interpret_response(StatusCode::OK, b"<html>login</html>"),
            Err(VerifyError::InvalidJson(_))
        ));
        let body = br#"{"result": {"object": "host", "arguments": []}, "principal": "no-realm"}"#;
        assert!(matches!(
            interpret_response(StatusCode::OK, body),
            Err(VerifyError::Principal(_))
        ));
    }

    #[test]
    fn non_string_arguments_are_ignored() {
        let body = br#"{"result": {"object": "user", "arguments": [{"uid": "admin"}]}, "principal": "admin@EXAMPLE.COM"}"#;
        let record = interpret_response(StatusCode::OK, body).unwrap();
        assert_eq!(record.object_kind, ObjectKind::User);
        assert!(record.arguments.is_empty());
        assert_eq!(record.registered_hostname(), None);
    }
}
