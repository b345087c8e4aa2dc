use super::{block_on, scope_list};
use crate::identity::SessionVerifier;
use crate::store::GrantStore;
use crate::validator::ClientValidator;
use oxide_auth::endpoint::{PreGrant, Registrar, Scope};
use oxide_auth::primitives::registrar::RegistrarError;
use oxide_auth::primitives::registrar::{BoundClient, ClientUrl, ExactUrl, RegisteredUrl};
use secrecy::SecretString;
use std::borrow::Cow;
use std::sync::Arc;

/// Client registrar that knows no clients up front.
///
/// Every host or service principal of the realm is a potential client. Redirect
/// URIs are derived from the principal's hostname and the passphrase checked by
/// the token endpoint is the client's directory session secret.
///
/// At the authorization endpoint the client has to prove its identity before a
/// redirect is bound, so that registrar is built per request with
/// [`ValidatorRegistrar::with_session`]. A registrar without a session binds no
/// redirects at all and is only good for the token endpoint's `check`.
pub struct ValidatorRegistrar<V, S> {
    validator: Arc<ClientValidator<V, S>>,
    session: Option<SecretString>,
}

impl<V, S> ValidatorRegistrar<V, S> {
    pub fn new(validator: Arc<ClientValidator<V, S>>) -> Self {
        Self {
            validator,
            session: None,
        }
    }

    /// Registrar for one authorization request, carrying the session secret
    /// presented by the client (the `ipa_session` cookie).
    pub fn with_session(validator: Arc<ClientValidator<V, S>>, session: SecretString) -> Self {
        Self {
            validator,
            session: Some(session),
        }
    }
}

impl<V, S> Clone for ValidatorRegistrar<V, S> {
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
            session: self.session.clone(),
        }
    }
}

impl<V, S> Registrar for ValidatorRegistrar<V, S>
where
    V: SessionVerifier,
    S: GrantStore,
{
    fn bound_redirect<'a>(&self, bound: ClientUrl<'a>) -> Result<BoundClient<'a>, RegistrarError> {
        let client_id = bound.client_id.as_ref();

        if !block_on(
            self.validator
                .validate_client_id(client_id, self.session.as_ref()),
        ) {
            return Err(RegistrarError::Unspecified);
        }

        let redirect_uri = match bound.redirect_uri {
            Some(uri) => {
                if !self.validator.validate_redirect_uri(client_id, uri.as_str()) {
                    return Err(RegistrarError::Unspecified);
                }
                uri.as_str().to_string()
            }
            None => self
                .validator
                .get_default_redirect_uri(client_id)
                .ok_or(RegistrarError::Unspecified)?,
        };

        let registered = RegisteredUrl::Exact(
            ExactUrl::new(redirect_uri).map_err(|_| RegistrarError::Unspecified)?,
        );

        Ok(BoundClient {
            client_id: bound.client_id,
            redirect_uri: Cow::Owned(registered),
        })
    }

    fn negotiate(
        &self,
        bound: BoundClient,
        scope: Option<Scope>,
    ) -> Result<PreGrant, RegistrarError> {
        let client_id = bound.client_id.as_ref();
        let scopes = match &scope {
            Some(requested) => scope_list(requested),
            None => self.validator.get_default_scopes(client_id),
        };
        if !self.validator.validate_scopes(client_id, &scopes) {
            return Err(RegistrarError::Unspecified);
        }

        Ok(PreGrant {
            client_id: bound.client_id.into_owned(),
            redirect_uri: bound.redirect_uri.into_owned(),
            scope: scopes
                .join(" ")
                .parse()
                .map_err(|_| RegistrarError::Unspecified)?,
        })
    }

    fn check(&self, client_id: &str, passphrase: Option<&[u8]>) -> Result<(), RegistrarError> {
        let Some(passphrase) = passphrase else {
            return if self.validator.authenticate_client_id(client_id) {
                Ok(())
            } else {
                Err(RegistrarError::Unspecified)
            };
        };

        let secret = std::str::from_utf8(passphrase).map_err(|_| RegistrarError::Unspecified)?;
        let secret = SecretString::from(secret.to_string());
        if block_on(self.validator.authenticate_client(client_id, &secret)) {
            Ok(())
        } else {
            Err(RegistrarError::Unspecified)
        }
    }
}
