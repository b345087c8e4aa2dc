//! oxide-auth adapter tests.
//!
//! The adapters block on the async validator, so every test runs on a
//! multi-threaded runtime.

mod common;

use chrono::Utc;
use common::*;
use krb_oauth2_bridge::engine::{ValidatorAuthorizer, ValidatorIssuer, ValidatorRegistrar};
use krb_oauth2_bridge::store::MemoryGrantStore;
use oxide_auth::endpoint::{Registrar, Scope};
use oxide_auth::primitives::authorizer::Authorizer;
use oxide_auth::primitives::grant::{Extensions, Grant};
use oxide_auth::primitives::issuer::Issuer;
use oxide_auth::primitives::registrar::{ClientUrl, ExactUrl};
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use url::Url;

fn web1_grant(scope: &str) -> Grant {
    Grant {
        owner_id: "alice@idp.example.org".to_string(),
        client_id: WEB1.to_string(),
        scope: scope.parse().expect("scope"),
        redirect_uri: Url::parse("https://web1.example.com:9090/login").expect("url"),
        until: Utc::now() + chrono::Duration::minutes(10),
        extensions: Extensions::new(),
    }
}

fn client_url<'a>(client_id: &'a str, redirect_uri: Option<&str>) -> ClientUrl<'a> {
    ClientUrl {
        client_id: Cow::Borrowed(client_id),
        redirect_uri: redirect_uri.map(|uri| Cow::Owned(ExactUrl::new(uri.to_string()).expect("url"))),
    }
}

/// Runs the authorization endpoint's part of the flow and returns the issued
/// code, if any.
fn authorize_flow(
    registrar: &ValidatorRegistrar<ScriptedVerifier, MemoryGrantStore>,
    authorizer: &mut ValidatorAuthorizer<ScriptedVerifier, MemoryGrantStore>,
    client_id: &str,
) -> Option<String> {
    let bound = registrar.bound_redirect(client_url(client_id, None)).ok()?;
    let pre_grant = registrar.negotiate(bound, None).ok()?;
    let grant = Grant {
        owner_id: "alice@idp.example.org".to_string(),
        client_id: pre_grant.client_id,
        scope: pre_grant.scope,
        redirect_uri: Url::parse("https://web1.example.com:9090/login").expect("url"),
        until: Utc::now() + chrono::Duration::minutes(10),
        extensions: Extensions::new(),
    };
    authorizer.authorize(grant).ok()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registrar_binds_host_redirects() {
    let v = Arc::new(validator(web1_verifier()));
    let registrar = ValidatorRegistrar::with_session(Arc::clone(&v), session(WEB1_SESSION));

    assert!(registrar.bound_redirect(client_url(WEB1, None)).is_ok());
    assert!(v.cache().get(&WEB1.to_string()).is_some());
    assert!(
        registrar
            .bound_redirect(client_url(WEB1, Some("https://web1.example.com/cb")))
            .is_ok()
    );
    assert!(
        registrar
            .bound_redirect(client_url(WEB1, Some("https://evil.example.com/cb")))
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registrar_requires_identity_proof() {
    let verifier = web1_verifier();
    let calls = verifier.calls();
    let v = Arc::new(validator(verifier));

    // no session: rejected before any network call
    let anonymous = ValidatorRegistrar::new(Arc::clone(&v));
    assert!(anonymous.bound_redirect(client_url(WEB1, None)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let wrong = ValidatorRegistrar::with_session(Arc::clone(&v), session("stolen"));
    assert!(wrong.bound_redirect(client_url(WEB1, None)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // a valid session for web1 does not vouch for another host
    let other = ValidatorRegistrar::with_session(Arc::clone(&v), session(WEB1_SESSION));
    assert!(
        other
            .bound_redirect(client_url("host/web2.example.com@EXAMPLE.COM", None))
            .is_err()
    );
    assert!(v.cache().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unproven_client_gets_no_code() {
    let verifier = ScriptedVerifier::new();
    let calls = verifier.calls();
    let v = Arc::new(validator(verifier));
    let mut authorizer = ValidatorAuthorizer::new(Arc::clone(&v));

    let anonymous = ValidatorRegistrar::new(Arc::clone(&v));
    assert!(authorize_flow(&anonymous, &mut authorizer, WEB1).is_none());

    let unknown = ValidatorRegistrar::with_session(Arc::clone(&v), session(WEB1_SESSION));
    assert!(authorize_flow(&unknown, &mut authorizer, WEB1).is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(v.cache().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_proven_client_gets_a_code() {
    let v = Arc::new(validator(web1_verifier()));
    let registrar = ValidatorRegistrar::with_session(Arc::clone(&v), session(WEB1_SESSION));
    let mut authorizer = ValidatorAuthorizer::new(Arc::clone(&v));

    let code = authorize_flow(&registrar, &mut authorizer, WEB1).expect("code issued");
    let grant = authorizer
        .extract(&code)
        .expect("extract")
        .expect("grant present");
    assert_eq!(grant.client_id, WEB1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registrar_negotiates_openid() {
    let registrar = ValidatorRegistrar::with_session(
        Arc::new(validator(web1_verifier())),
        session(WEB1_SESSION),
    );
    let bound = || registrar.bound_redirect(client_url(WEB1, None)).expect("bound");

    let defaulted = registrar.negotiate(bound(), None).expect("default scope");
    assert_eq!(defaulted.client_id, WEB1);
    assert_eq!(defaulted.scope.to_string(), "openid");

    let requested: Scope = "openid profile".parse().expect("scope");
    assert!(registrar.negotiate(bound(), Some(requested)).is_ok());

    let without_openid: Scope = "profile".parse().expect("scope");
    assert!(registrar.negotiate(bound(), Some(without_openid)).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registrar_checks_session_as_passphrase() {
    let registrar = ValidatorRegistrar::new(Arc::new(validator(web1_verifier())));

    assert!(registrar.check(WEB1, Some(WEB1_SESSION.as_bytes())).is_ok());
    assert!(registrar.check(WEB1, Some(b"wrong")).is_err());
    assert!(registrar.check(WEB1, None).is_err());
    assert!(
        registrar
            .check("host/web1.example.com@OTHER.COM", Some(WEB1_SESSION.as_bytes()))
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_authorizer_codes_are_single_use() {
    let mut authorizer = ValidatorAuthorizer::new(Arc::new(validator(web1_verifier())));

    let code = authorizer
        .authorize(web1_grant("openid profile"))
        .expect("authorize");
    let grant = authorizer
        .extract(&code)
        .expect("extract")
        .expect("grant present");
    assert_eq!(grant.owner_id, "alice@idp.example.org");
    assert_eq!(grant.client_id, WEB1);
    assert_eq!(grant.redirect_uri.as_str(), "https://web1.example.com:9090/login");

    assert!(authorizer.extract(&code).expect("extract").is_none());
    assert!(authorizer.extract("never-issued").expect("extract").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_issuer_issues_recovers_and_refreshes() {
    let mut issuer = ValidatorIssuer::new(Arc::new(validator(web1_verifier())));

    let issued = issuer.issue(web1_grant("openid")).expect("issue");
    let refresh = issued.refresh.clone().expect("refresh token");
    assert!(issued.until > Utc::now());

    let recovered = issuer
        .recover_token(&issued.token)
        .expect("recover")
        .expect("grant present");
    assert_eq!(recovered.owner_id, "alice@idp.example.org");
    assert!(issuer.recover_refresh(&refresh).expect("recover").is_some());

    let refreshed = issuer
        .refresh(&refresh, web1_grant("openid"))
        .expect("refresh");
    assert_ne!(refreshed.token, issued.token);

    assert!(issuer.recover_token(&issued.token).expect("recover").is_none());
    assert!(issuer.recover_refresh(&refresh).expect("recover").is_none());
    assert!(issuer.recover_token(&refreshed.token).expect("recover").is_some());
    // a rotated refresh token cannot be used twice
    assert!(issuer.refresh(&refresh, web1_grant("openid")).is_err());
}
