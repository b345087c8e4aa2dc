use super::{AuthorizationCode, BearerToken, GrantStore, PurgeCounts, TokenHint};
use crate::error::StoreError;
use dashmap::DashMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// In-process grant store.
///
/// Token pairs are keyed by id with secondary indexes for both token strings.
#[derive(Clone, Default)]
pub struct MemoryGrantStore {
    codes: Arc<DashMap<String, AuthorizationCode>>,
    tokens: Arc<DashMap<String, BearerToken>>,
    access_index: Arc<DashMap<String, String>>,
    refresh_index: Arc<DashMap<String, String>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn token_id(&self, token: &str, hint: TokenHint) -> Option<String> {
        let by_access = || self.access_index.get(token).map(|id| id.value().clone());
        let by_refresh = || self.refresh_index.get(token).map(|id| id.value().clone());
        match hint {
            TokenHint::Access => by_access(),
            TokenHint::Refresh => by_refresh(),
            TokenHint::Any => by_access().or_else(by_refresh),
        }
    }

    fn remove_token(&self, id: &str) {
        if let Some((_, token)) = self.tokens.remove(id) {
            self.access_index.remove(&token.access_token);
            if let Some(refresh) = &token.refresh_token {
                self.refresh_index.remove(refresh);
            }
        }
    }
}

impl GrantStore for MemoryGrantStore {
    async fn save_code(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        self.codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn consume_code(
        &self,
        code: &str,
        client_id: Option<&str>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        Ok(self
            .codes
            .remove_if(code, |_, stored| {
                client_id.is_none_or(|client_id| stored.client_id == client_id)
            })
            .map(|(_, stored)| stored))
    }

    async fn save_token(&self, token: BearerToken) -> Result<(), StoreError> {
        self.access_index
            .insert(token.access_token.clone(), token.id.clone());
        if let Some(refresh) = &token.refresh_token {
            self.refresh_index.insert(refresh.clone(), token.id.clone());
        }
        self.tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn find_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<BearerToken>, StoreError> {
        Ok(self
            .token_id(access_token, TokenHint::Access)
            .and_then(|id| self.tokens.get(&id).map(|t| t.value().clone())))
    }

    async fn find_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<BearerToken>, StoreError> {
        Ok(self
            .token_id(refresh_token, TokenHint::Refresh)
            .and_then(|id| self.tokens.get(&id).map(|t| t.value().clone())))
    }

    async fn revoke(&self, token: &str, hint: TokenHint) -> Result<Option<BearerToken>, StoreError> {
        let Some(id) = self.token_id(token, hint) else {
            return Ok(None);
        };

        // get_mut holds the shard write lock, so only one caller sees None here
        let Some(mut stored) = self.tokens.get_mut(&id) else {
            return Ok(None);
        };
        if stored.revoked_at.is_some() {
            return Ok(None);
        }
        stored.revoked_at = Some(OffsetDateTime::now_utc());
        Ok(Some(stored.clone()))
    }

    async fn purge_expired(&self) -> Result<PurgeCounts, StoreError> {
        let codes_before = self.codes.len();
        self.codes.retain(|_, code| !code.is_expired());
        let codes = codes_before.saturating_sub(self.codes.len());

        let spent: Vec<String> = self
            .tokens
            .iter()
            .filter(|t| t.value().is_spent())
            .map(|t| t.key().clone())
            .collect();
        for id in &spent {
            self.remove_token(id);
        }

        Ok(PurgeCounts {
            codes: codes as u64,
            tokens: spent.len() as u64,
        })
    }
}
