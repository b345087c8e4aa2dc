use super::{block_on, scope_list, to_chrono, token_grant};
use crate::identity::SessionVerifier;
use crate::store::{BearerToken, GrantStore};
use crate::validator::{ClientValidator, TokenRequest};
use oxide_auth::primitives::grant::Grant;
use oxide_auth::primitives::issuer::{IssuedToken, Issuer, RefreshedToken, TokenType};
use std::sync::Arc;

/// Bearer tokens kept in the validator's grant store.
pub struct ValidatorIssuer<V, S> {
    validator: Arc<ClientValidator<V, S>>,
}

impl<V, S> ValidatorIssuer<V, S> {
    pub fn new(validator: Arc<ClientValidator<V, S>>) -> Self {
        Self { validator }
    }
}

impl<V, S> Clone for ValidatorIssuer<V, S> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
        }
    }
}

fn issued(token: BearerToken) -> Result<IssuedToken, ()> {
    Ok(IssuedToken {
        until: to_chrono(token.access_expires_at).ok_or(())?,
        token: token.access_token,
        refresh: token.refresh_token,
        token_type: TokenType::Bearer,
    })
}

impl<V, S> Issuer for ValidatorIssuer<V, S>
where
    V: SessionVerifier,
    S: GrantStore,
{
    fn issue(&mut self, grant: Grant) -> Result<IssuedToken, ()> {
        let request = TokenRequest {
            client_id: grant.client_id.clone(),
            subject: grant.owner_id.clone(),
            scopes: scope_list(&grant.scope),
            redirect_uri: grant.redirect_uri.to_string(),
        };
        let token = block_on(self.validator.save_bearer_token(&request)).map_err(|_| ())?;
        issued(token)
    }

    fn refresh(&mut self, refresh: &str, grant: Grant) -> Result<RefreshedToken, ()> {
        let rotated = block_on(
            self.validator
                .rotate_refresh_token(&grant.client_id, refresh),
        )
        .map_err(|_| ())?
        .ok_or(())?;

        let token = issued(rotated)?;
        Ok(RefreshedToken {
            token: token.token,
            refresh: token.refresh,
            until: token.until,
            token_type: token.token_type,
        })
    }

    fn recover_token<'a>(&'a self, token: &'a str) -> Result<Option<Grant>, ()> {
        let no_scopes: &[&str] = &[];
        Ok(
            block_on(self.validator.validate_bearer_token(token, no_scopes))
                .and_then(|found| token_grant(&found, found.access_expires_at)),
        )
    }

    fn recover_refresh<'a>(&'a self, token: &'a str) -> Result<Option<Grant>, ()> {
        Ok(block_on(self.validator.find_active_refresh_token(token)).and_then(|found| {
            let until = found.refresh_expires_at?;
            token_grant(&found, until)
        }))
    }
}
