#![allow(dead_code)]

use hyper::StatusCode;
use krb_oauth2_bridge::identity::{IdentityRecord, ObjectKind, interpret_response};
use krb_oauth2_bridge::store::MemoryGrantStore;
use krb_oauth2_bridge::{ClientIdentityCache, ClientValidator, GrantLifetimes, SessionVerifier, Verification};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const REALM: &str = "EXAMPLE.COM";
pub const WEB1: &str = "host/web1.example.com@EXAMPLE.COM";
pub const WEB1_SESSION: &str = "MagBearerToken=web1-session";

/// Canned identity endpoint: each session secret maps to an HTTP status and body.
#[derive(Default)]
pub struct ScriptedVerifier {
    responses: HashMap<String, (StatusCode, String)>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, session: &str, status: StatusCode, body: impl Into<String>) -> Self {
        self.responses
            .insert(session.to_string(), (status, body.into()));
        self
    }

    /// A `whoami` answer for a host or service object.
    pub fn whoami(self, session: &str, principal: &str, object: &str, argument: &str) -> Self {
        let body = serde_json::json!({
            "result": {"object": object, "command": format!("{object}_show/1"), "arguments": [argument]},
            "error": null,
            "id": 0,
            "principal": principal,
            "version": "4.12.2",
        });
        self.respond(session, StatusCode::OK, body.to_string())
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl SessionVerifier for ScriptedVerifier {
    async fn verify(&self, session: &SecretString) -> Verification {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(session.expose_secret()) {
            Some((status, body)) => match interpret_response(*status, body.as_bytes()) {
                Ok(record) => Verification::Verified(record),
                Err(_) => Verification::Failed,
            },
            None => Verification::Failed,
        }
    }
}

pub fn web1_verifier() -> ScriptedVerifier {
    ScriptedVerifier::new().whoami(WEB1_SESSION, WEB1, "host", "web1.example.com")
}

pub fn validator_with(
    verifier: ScriptedVerifier,
    lifetimes: GrantLifetimes,
) -> ClientValidator<ScriptedVerifier, MemoryGrantStore> {
    ClientValidator::new(
        REALM,
        verifier,
        MemoryGrantStore::new(),
        ClientIdentityCache::new(Duration::from_secs(300), 100),
        lifetimes,
    )
}

pub fn validator(verifier: ScriptedVerifier) -> ClientValidator<ScriptedVerifier, MemoryGrantStore> {
    validator_with(verifier, GrantLifetimes::default())
}

pub fn session(secret: &str) -> SecretString {
    SecretString::from(secret.to_string())
}

pub fn host_record(principal: &str, registered: &str) -> IdentityRecord {
    IdentityRecord::new(
        principal.parse().expect("valid principal"),
        ObjectKind::Host,
        vec![registered.to_string()],
        serde_json::Value::Null,
    )
}
