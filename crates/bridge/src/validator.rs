//! OAuth2 request validation for Kerberos-authenticated clients.
//!
//! Every OAuth2 client is a host or service principal of the configured realm.
//! A client proves its identity by presenting a directory session secret that
//! the identity endpoint resolves back to exactly that principal. Hooks are
//! called by the grant engine in protocol order and answer with plain
//! accept/reject decisions; the reasons are only logged.

use crate::cache::ClientIdentityCache;
use crate::error::ValidationError;
use crate::identity::{IdentityRecord, SessionVerifier, Verification};
use crate::principal::PrincipalName;
use crate::store::{
    AuthorizationCode, BearerToken, GrantStore, PurgeCounts, TokenHint, generate_token,
};
use secrecy::SecretString;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, warn};
use url::Url;

pub const OPENID_SCOPE: &str = "openid";
pub const RESPONSE_TYPE_CODE: &str = "code";
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
/// Port and path of the login console on enrolled hosts.
pub const DEFAULT_REDIRECT_PORT: u16 = 9090;
pub const DEFAULT_REDIRECT_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantLifetimes {
    pub code: Duration,
    pub access_token: Duration,
    pub refresh_token: Duration,
}

impl Default for GrantLifetimes {
    fn default() -> Self {
        Self {
            code: Duration::minutes(10),
            access_token: Duration::hours(1),
            refresh_token: Duration::days(7),
        }
    }
}

/// What the authorization endpoint approved, ready to be turned into a code.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub subject: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    /// The client named `redirect_uri` itself instead of relying on the default
    pub redirect_uri_explicit: bool,
}

/// Grant being exchanged for a token pair.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub client_id: String,
    pub subject: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

impl From<&AuthorizationCode> for TokenRequest {
    fn from(code: &AuthorizationCode) -> Self {
        Self {
            client_id: code.client_id.clone(),
            subject: code.subject.clone(),
            scopes: code.scopes.clone(),
            redirect_uri: code.redirect_uri.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub grants: PurgeCounts,
    pub cache_entries: usize,
}

pub struct ClientValidator<V, S> {
    realm: String,
    verifier: V,
    store: S,
    cache: ClientIdentityCache,
    lifetimes: GrantLifetimes,
}

impl<V, S> ClientValidator<V, S>
where
    V: SessionVerifier,
    S: GrantStore,
{
    pub fn new(
        realm: impl Into<String>,
        verifier: V,
        store: S,
        cache: ClientIdentityCache,
        lifetimes: GrantLifetimes,
    ) -> Self {
        Self {
            realm: realm.into(),
            verifier,
            store,
            cache,
            lifetimes,
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn cache(&self) -> &ClientIdentityCache {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lifetimes(&self) -> GrantLifetimes {
        self.lifetimes
    }

    /// Parse the client id and check it could be a client of this realm.
    ///
    /// Never touches the network.
    fn claimed_principal(&self, client_id: &str) -> Result<PrincipalName, ValidationError> {
        let principal = PrincipalName::parse(client_id)?;
        if principal.realm() != self.realm {
            return Err(ValidationError::denied(format!(
                "realm {} is not {}",
                principal.realm(),
                self.realm
            )));
        }
        if !principal.is_host() && !principal.is_service() {
            return Err(ValidationError::denied(
                "only host and service principals can be clients",
            ));
        }
        Ok(principal)
    }

    async fn prove_identity(
        &self,
        client_id: &str,
        session: Option<&SecretString>,
    ) -> Result<IdentityRecord, ValidationError> {
        let claimed = self.claimed_principal(client_id)?;
        let session = session.ok_or_else(|| ValidationError::denied("no session secret"))?;

        let Verification::Verified(record) = self.verifier.verify(session).await else {
            return Err(ValidationError::VerificationFailed);
        };

        if record.principal != claimed {
            return Err(ValidationError::denied(format!(
                "session belongs to {}",
                record.principal
            )));
        }
        if !record.object_kind.is_client() {
            return Err(ValidationError::denied(format!(
                "session object is {:?}",
                record.object_kind
            )));
        }
        Ok(record)
    }

    /// Accept `client_id` only if `session` proves the caller is that principal.
    #[tracing::instrument(skip(self, session))]
    pub async fn validate_client_id(
        &self,
        client_id: &str,
        session: Option<&SecretString>,
    ) -> bool {
        match self.prove_identity(client_id, session).await {
            Ok(record) => {
                self.cache.insert(client_id.to_string(), record);
                info!("Client identity verified");
                true
            }
            Err(e) => {
                info!(reason = %e, "Client rejected");
                false
            }
        }
    }

    /// Redirects must go back to the client's own host over https.
    #[tracing::instrument(skip(self))]
    pub fn validate_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> bool {
        match self.check_redirect_uri(client_id, redirect_uri) {
            Ok(()) => true,
            Err(e) => {
                info!(reason = %e, "Redirect URI rejected");
                false
            }
        }
    }

    fn check_redirect_uri(&self, client_id: &str, redirect_uri: &str) -> Result<(), ValidationError> {
        let principal = PrincipalName::parse(client_id)?;
        let hostname = principal
            .hostname()
            .ok_or_else(|| ValidationError::denied("principal has no hostname"))?;

        let url = Url::parse(redirect_uri)
            .map_err(|e| ValidationError::denied(format!("unparsable redirect URI: {e}")))?;
        if url.scheme() != "https" {
            return Err(ValidationError::denied("redirect URI must use https"));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ValidationError::denied("redirect URI has no host"))?;
        if !host.eq_ignore_ascii_case(hostname) {
            return Err(ValidationError::denied(format!(
                "redirect host {host} is not {hostname}"
            )));
        }

        if let Some(record) = self.cache.get(&client_id.to_string()) {
            match record.registered_hostname() {
                Some(registered) if registered.eq_ignore_ascii_case(hostname) => {}
                other => {
                    return Err(ValidationError::denied(format!(
                        "verified identity is registered for {other:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The login console of a host client; services have no default.
    pub fn get_default_redirect_uri(&self, client_id: &str) -> Option<String> {
        let principal = PrincipalName::parse(client_id).ok()?;
        if !principal.is_host() {
            return None;
        }
        principal
            .hostname()
            .map(|host| format!("https://{host}:{DEFAULT_REDIRECT_PORT}{DEFAULT_REDIRECT_PATH}"))
    }

    pub fn validate_scopes<S2: AsRef<str>>(&self, client_id: &str, scopes: &[S2]) -> bool {
        let ok = scopes.iter().any(|s| s.as_ref() == OPENID_SCOPE);
        if !ok {
            debug!(client_id, "Scopes rejected: openid was not requested");
        }
        ok
    }

    pub fn get_default_scopes(&self, _client_id: &str) -> Vec<String> {
        vec![OPENID_SCOPE.to_string()]
    }

    pub fn validate_response_type(&self, _client_id: &str, response_type: &str) -> bool {
        response_type == RESPONSE_TYPE_CODE
    }

    pub fn validate_grant_type(&self, _client_id: &str, grant_type: &str) -> bool {
        matches!(grant_type, GRANT_AUTHORIZATION_CODE | GRANT_REFRESH_TOKEN)
    }

    #[tracing::instrument(skip(self, request), fields(subject = %request.subject))]
    pub async fn save_authorization_code(
        &self,
        client_id: &str,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationCode, ValidationError> {
        let now = OffsetDateTime::now_utc();
        let code = AuthorizationCode {
            code: generate_token()?,
            client_id: client_id.to_string(),
            subject: request.subject,
            redirect_uri: request.redirect_uri,
            redirect_uri_explicit: request.redirect_uri_explicit,
            scopes: request.scopes,
            expires_at: now + self.lifetimes.code,
            created_at: now,
        };

        self.store
            .save_code(code.clone())
            .await
            .inspect_err(|e| error!(error = %e, "Failed to store authorization code"))?;
        debug!("Authorization code issued");
        Ok(code)
    }

    /// Redeem `code` for `client_id`. The code is gone afterwards whatever the outcome.
    #[tracing::instrument(skip(self, code))]
    pub async fn validate_code(&self, client_id: &str, code: &str) -> Option<AuthorizationCode> {
        self.redeem(code, Some(client_id)).await
    }

    /// Redeem a code without knowing the client yet.
    ///
    /// The caller must compare the returned grant's `client_id` with the
    /// authenticated client before issuing anything.
    pub async fn redeem_code(&self, code: &str) -> Option<AuthorizationCode> {
        self.redeem(code, None).await
    }

    async fn redeem(&self, code: &str, client_id: Option<&str>) -> Option<AuthorizationCode> {
        let consumed = match self.store.consume_code(code, client_id).await {
            Ok(consumed) => consumed,
            Err(e) => {
                error!(error = %e, "Grant store failed while redeeming a code");
                return None;
            }
        };

        match consumed {
            Some(grant) if grant.is_expired() => {
                info!("Authorization code expired");
                None
            }
            Some(grant) => Some(grant),
            None => {
                info!("Authorization code unknown, foreign or already redeemed");
                None
            }
        }
    }

    /// The token request must repeat the redirect URI the code was bound to.
    pub fn confirm_redirect_uri(
        &self,
        client_id: &str,
        grant: &AuthorizationCode,
        redirect_uri: Option<&str>,
    ) -> bool {
        if grant.client_id != client_id {
            return false;
        }
        match redirect_uri {
            Some(uri) => uri == grant.redirect_uri,
            None => !grant.redirect_uri_explicit,
        }
    }

    pub async fn invalidate_authorization_code(
        &self,
        client_id: &str,
        code: &str,
    ) -> Result<(), ValidationError> {
        self.store.consume_code(code, Some(client_id)).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn save_bearer_token(
        &self,
        request: &TokenRequest,
    ) -> Result<BearerToken, ValidationError> {
        let now = OffsetDateTime::now_utc();
        let token = BearerToken {
            id: uuid::Uuid::new_v4().to_string(),
            access_token: generate_token()?,
            refresh_token: Some(generate_token()?),
            client_id: request.client_id.clone(),
            subject: request.subject.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scopes: request.scopes.clone(),
            access_expires_at: now + self.lifetimes.access_token,
            refresh_expires_at: Some(now + self.lifetimes.refresh_token),
            created_at: now,
            revoked_at: None,
        };

        self.store
            .save_token(token.clone())
            .await
            .inspect_err(|e| error!(error = %e, "Failed to store bearer token"))?;
        debug!(token_id = %token.id, "Bearer token issued");
        Ok(token)
    }

    pub async fn validate_bearer_token<S2: AsRef<str>>(
        &self,
        access_token: &str,
        scopes: &[S2],
    ) -> Option<BearerToken> {
        let token = match self.store.find_access_token(access_token).await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                error!(error = %e, "Grant store failed while checking a bearer token");
                return None;
            }
        };

        if token.is_revoked() || token.is_access_expired() {
            debug!(token_id = %token.id, "Bearer token revoked or expired");
            return None;
        }
        if !token.covers(scopes) {
            debug!(token_id = %token.id, "Bearer token lacks requested scopes");
            return None;
        }
        Some(token)
    }

    /// A refresh token that is neither revoked nor expired, whoever owns it.
    pub async fn find_active_refresh_token(&self, refresh_token: &str) -> Option<BearerToken> {
        match self.store.find_refresh_token(refresh_token).await {
            Ok(Some(token)) if token.is_revoked() || token.is_refresh_expired() => None,
            Ok(found) => found,
            Err(e) => {
                error!(error = %e, "Grant store failed while checking a refresh token");
                None
            }
        }
    }

    pub async fn validate_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Option<BearerToken> {
        let token = self.find_active_refresh_token(refresh_token).await?;
        if token.client_id != client_id {
            warn!(token_id = %token.id, client_id, "Refresh token presented by another client");
            return None;
        }
        Some(token)
    }

    pub async fn get_original_scopes(&self, refresh_token: &str) -> Result<Vec<String>, ValidationError> {
        match self.store.find_refresh_token(refresh_token).await? {
            Some(token) => Ok(token.scopes),
            None => {
                let e = ValidationError::StoreInconsistency(
                    "refresh token passed validation but is not stored".to_string(),
                );
                error!(error = %e, "Cannot recover original scopes");
                Err(e)
            }
        }
    }

    /// Swap a refresh token for a fresh pair with the same grant.
    ///
    /// Only one of several concurrent callers presenting the same token gets a
    /// new pair.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn rotate_refresh_token(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<Option<BearerToken>, ValidationError> {
        if self
            .validate_refresh_token(refresh_token, client_id)
            .await
            .is_none()
        {
            return Ok(None);
        }

        let Some(old) = self.store.revoke(refresh_token, TokenHint::Refresh).await? else {
            info!("Refresh token already rotated");
            return Ok(None);
        };

        let request = TokenRequest {
            client_id: old.client_id,
            subject: old.subject,
            scopes: old.scopes,
            redirect_uri: old.redirect_uri,
        };
        self.save_bearer_token(&request).await.map(Some)
    }

    /// Token revocation. Unknown tokens and tokens of other clients are
    /// silently ignored; returns whether this call revoked something.
    #[tracing::instrument(skip(self, token))]
    pub async fn revoke_token(&self, client_id: &str, token: &str) -> Result<bool, ValidationError> {
        let owner = match self.store.find_access_token(token).await? {
            Some(found) => Some(found),
            None => self.store.find_refresh_token(token).await?,
        };
        match owner {
            Some(found) if found.client_id == client_id => {
                let revoked = self.store.revoke(token, TokenHint::Any).await?;
                Ok(revoked.is_some())
            }
            Some(_) => {
                warn!("Revocation requested for a token of another client");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    pub fn client_authentication_required(&self, _client_id: &str) -> bool {
        true
    }

    /// The credential of a client is its directory session secret.
    pub async fn authenticate_client(&self, client_id: &str, credential: &SecretString) -> bool {
        self.validate_client_id(client_id, Some(credential)).await
    }

    /// There are no public clients.
    pub fn authenticate_client_id(&self, client_id: &str) -> bool {
        debug!(client_id, "Rejecting unauthenticated client");
        false
    }

    pub async fn purge_expired(&self) -> Result<PurgeReport, ValidationError> {
        let grants = self.store.purge_expired().await?;
        let cache_entries = self.cache.purge_expired();
        info!(
            codes = grants.codes,
            tokens = grants.tokens,
            cache_entries,
            "Purged expired grants"
        );
        Ok(PurgeReport {
            grants,
            cache_entries,
        })
    }
}
