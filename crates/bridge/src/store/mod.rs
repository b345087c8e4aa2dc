//! Persistence of authorization codes and bearer tokens.
//!
//! Both implementations guarantee that [`GrantStore::consume_code`] and
//! [`GrantStore::revoke`] have exactly one winner when called concurrently for
//! the same code or token.

mod db;
mod memory;

pub use db::DbGrantStore;
pub use memory::MemoryGrantStore;

use crate::error::StoreError;
use base64::Engine;
use std::future::Future;
use time::OffsetDateTime;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// 32 random bytes, base64url without padding.
pub fn generate_token() -> Result<String, StoreError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

pub(crate) fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

pub(crate) fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(String::from).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub subject: String,
    pub redirect_uri: String,
    pub redirect_uri_explicit: bool,
    pub scopes: Vec<String>,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl AuthorizationCode {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BearerToken {
    pub id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub subject: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
}

impl BearerToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_access_expired(&self) -> bool {
        self.access_expires_at <= OffsetDateTime::now_utc()
    }

    /// A token without a refresh half counts as expired.
    pub fn is_refresh_expired(&self) -> bool {
        match self.refresh_expires_at {
            Some(expires_at) => expires_at <= OffsetDateTime::now_utc(),
            None => true,
        }
    }

    /// Nothing about this token can be used any more.
    pub fn is_spent(&self) -> bool {
        self.is_access_expired() && self.is_refresh_expired()
    }

    pub fn covers<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested
            .iter()
            .all(|r| self.scopes.iter().any(|s| s == r.as_ref()))
    }
}

/// Which half of a token pair a revocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHint {
    Access,
    Refresh,
    Any,
}

/// Counts of rows removed by [`GrantStore::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub codes: u64,
    pub tokens: u64,
}

pub trait GrantStore: Send + Sync {
    fn save_code(&self, code: AuthorizationCode)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove and return the code if it exists and, when `client_id` is
    /// given, belongs to that client.
    ///
    /// A code owned by another client is left in place.
    fn consume_code(
        &self,
        code: &str,
        client_id: Option<&str>,
    ) -> impl Future<Output = Result<Option<AuthorizationCode>, StoreError>> + Send;

    fn save_token(&self, token: BearerToken)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    fn find_access_token(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<Option<BearerToken>, StoreError>> + Send;

    fn find_refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Option<BearerToken>, StoreError>> + Send;

    /// Mark the matching token pair revoked.
    ///
    /// Returns the revoked pair only to the caller that flipped it; unknown and
    /// already revoked tokens yield `None`.
    fn revoke(
        &self,
        token: &str,
        hint: TokenHint,
    ) -> impl Future<Output = Result<Option<BearerToken>, StoreError>> + Send;

    fn purge_expired(&self) -> impl Future<Output = Result<PurgeCounts, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn scope_coverage() {
        let now = OffsetDateTime::now_utc();
        let token = BearerToken {
            id: "1".into(),
            access_token: "a".into(),
            refresh_token: None,
            client_id: "c".into(),
            subject: "s".into(),
            redirect_uri: "https://web1.example.com/cb".into(),
            scopes: split_scopes("openid profile"),
            access_expires_at: now + time::Duration::hours(1),
            refresh_expires_at: None,
            created_at: now,
            revoked_at: None,
        };
        assert!(token.covers(&["openid"]));
        assert!(token.covers(&["profile", "openid"]));
        assert!(!token.covers(&["email"]));
        assert!(token.is_refresh_expired());
        assert!(!token.is_spent());
    }
}
