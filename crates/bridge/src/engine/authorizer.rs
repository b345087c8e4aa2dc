use super::{block_on, code_grant, scope_list};
use crate::identity::SessionVerifier;
use crate::store::GrantStore;
use crate::validator::{AuthorizationRequest, ClientValidator};
use oxide_auth::primitives::authorizer::Authorizer;
use oxide_auth::primitives::grant::Grant;
use std::sync::Arc;

/// Authorization codes kept in the validator's grant store.
pub struct ValidatorAuthorizer<V, S> {
    validator: Arc<ClientValidator<V, S>>,
}

impl<V, S> ValidatorAuthorizer<V, S> {
    pub fn new(validator: Arc<ClientValidator<V, S>>) -> Self {
        Self { validator }
    }
}

impl<V, S> Clone for ValidatorAuthorizer<V, S> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<V, S> Authorizer for ValidatorAuthorizer<V, S>
where
    V: SessionVerifier,
    S: GrantStore,
{
    fn authorize(&mut self, grant: Grant) -> Result<String, ()> {
        let redirect_uri = grant.redirect_uri.to_string();
        // The engine does not say whether the URI came from the request, so
        // anything other than the default counts as explicit.
        let redirect_uri_explicit =
            self.validator.get_default_redirect_uri(&grant.client_id).as_deref()
                != Some(redirect_uri.as_str());

        let request = AuthorizationRequest {
            subject: grant.owner_id.clone(),
            scopes: scope_list(&grant.scope),
            redirect_uri,
            redirect_uri_explicit,
        };

        block_on(
            self.validator
                .save_authorization_code(&grant.client_id, request),
        )
        .map(|code| code.code)
        .map_err(|_| ())
    }

    fn extract(&mut self, code: &str) -> Result<Option<Grant>, ()> {
        let Some(redeemed) = block_on(self.validator.redeem_code(code)) else {
            return Ok(None);
        };
        code_grant(&redeemed).map(Some).ok_or(())
    }
}
