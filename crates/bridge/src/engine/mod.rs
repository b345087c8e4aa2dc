//! `oxide-auth` primitives backed by [`ClientValidator`].
//!
//! The engine's traits are synchronous while the validator is async, so every
//! call blocks the current worker with [`tokio::task::block_in_place`]. These
//! adapters therefore only work on a multi-threaded tokio runtime.
//!
//! [`ClientValidator`]: crate::validator::ClientValidator

mod authorizer;
mod issuer;
mod registrar;

pub use authorizer::ValidatorAuthorizer;
pub use issuer::ValidatorIssuer;
pub use registrar::ValidatorRegistrar;

use crate::store::{AuthorizationCode, BearerToken};
use chrono::{DateTime, Utc};
use oxide_auth::primitives::grant::{Extensions, Grant};
use oxide_auth::primitives::scope::Scope;
use std::future::Future;
use time::OffsetDateTime;
use url::Url;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn to_chrono(at: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
}

fn scope_list(scope: &Scope) -> Vec<String> {
    scope
        .to_string()
        .split_whitespace()
        .map(String::from)
        .collect()
}

fn grant(
    client_id: &str,
    subject: &str,
    scopes: &[String],
    redirect_uri: &str,
    until: OffsetDateTime,
) -> Option<Grant> {
    Some(Grant {
        owner_id: subject.to_string(),
        client_id: client_id.to_string(),
        scope: scopes.join(" ").parse().ok()?,
        redirect_uri: Url::parse(redirect_uri).ok()?,
        until: to_chrono(until)?,
        extensions: Extensions::new(),
    })
}

fn code_grant(code: &AuthorizationCode) -> Option<Grant> {
    grant(
        &code.client_id,
        &code.subject,
        &code.scopes,
        &code.redirect_uri,
        code.expires_at,
    )
}

fn token_grant(token: &BearerToken, until: OffsetDateTime) -> Option<Grant> {
    grant(
        &token.client_id,
        &token.subject,
        &token.scopes,
        &token.redirect_uri,
        until,
    )
}
