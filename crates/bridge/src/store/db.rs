//! SeaORM-backed grant store.
//!
//! Single-winner semantics come from the database: a code is only handed out
//! to the caller whose `DELETE` removed the row, and a token is only revoked by
//! the caller whose `UPDATE ... WHERE revoked_at IS NULL` touched it.

use super::{
    AuthorizationCode, BearerToken, GrantStore, PurgeCounts, TOKEN_TYPE_BEARER, TokenHint,
    join_scopes, split_scopes,
};
use crate::entity::{oauth2_authorization, oauth2_token};
use crate::error::StoreError;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct DbGrantStore {
    db: Arc<DatabaseConnection>,
}

impl DbGrantStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_token(
        &self,
        token: &str,
        hint: TokenHint,
    ) -> Result<Option<oauth2_token::Model>, StoreError> {
        let condition = match hint {
            TokenHint::Access => Condition::all().add(oauth2_token::Column::AccessToken.eq(token)),
            TokenHint::Refresh => {
                Condition::all().add(oauth2_token::Column::RefreshToken.eq(token))
            }
            TokenHint::Any => Condition::any()
                .add(oauth2_token::Column::AccessToken.eq(token))
                .add(oauth2_token::Column::RefreshToken.eq(token)),
        };

        Ok(oauth2_token::Entity::find()
            .filter(condition)
            .one(self.db.as_ref())
            .await?)
    }
}

impl From<oauth2_authorization::Model> for AuthorizationCode {
    fn from(model: oauth2_authorization::Model) -> Self {
        Self {
            scopes: split_scopes(&model.scope),
            code: model.code,
            client_id: model.client_id,
            subject: model.subject,
            redirect_uri: model.redirect_uri,
            redirect_uri_explicit: model.redirect_uri_explicit,
            expires_at: model.expires_at,
            created_at: model.created_at,
        }
    }
}

impl From<oauth2_token::Model> for BearerToken {
    fn from(model: oauth2_token::Model) -> Self {
        Self {
            scopes: split_scopes(&model.scope),
            id: model.id,
            access_token: model.access_token,
            refresh_token: model.refresh_token,
            client_id: model.client_id,
            subject: model.subject,
            redirect_uri: model.redirect_uri,
            access_expires_at: model.access_token_expires_at,
            refresh_expires_at: model.refresh_token_expires_at,
            created_at: model.created_at,
            revoked_at: model.revoked_at,
        }
    }
}

impl GrantStore for DbGrantStore {
    async fn save_code(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        let model = oauth2_authorization::ActiveModel {
            code: Set(code.code),
            client_id: Set(code.client_id),
            subject: Set(code.subject),
            redirect_uri: Set(code.redirect_uri),
            redirect_uri_explicit: Set(code.redirect_uri_explicit),
            scope: Set(join_scopes(&code.scopes)),
            expires_at: Set(code.expires_at),
            created_at: Set(code.created_at),
        };
        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn consume_code(
        &self,
        code: &str,
        client_id: Option<&str>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        let Some(stored) = oauth2_authorization::Entity::find_by_id(code)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };
        if client_id.is_some_and(|client_id| stored.client_id != client_id) {
            return Ok(None);
        }

        let deleted = oauth2_authorization::Entity::delete_many()
            .filter(oauth2_authorization::Column::Code.eq(code))
            .filter(oauth2_authorization::Column::ClientId.eq(stored.client_id.as_str()))
            .exec(self.db.as_ref())
            .await?;

        if deleted.rows_affected == 1 {
            Ok(Some(stored.into()))
        } else {
            Ok(None)
        }
    }

    async fn save_token(&self, token: BearerToken) -> Result<(), StoreError> {
        let model = oauth2_token::ActiveModel {
            id: Set(token.id),
            access_token: Set(token.access_token),
            refresh_token: Set(token.refresh_token),
            token_type: Set(TOKEN_TYPE_BEARER.to_string()),
            client_id: Set(token.client_id),
            subject: Set(token.subject),
            redirect_uri: Set(token.redirect_uri),
            scope: Set(join_scopes(&token.scopes)),
            access_token_expires_at: Set(token.access_expires_at),
            refresh_token_expires_at: Set(token.refresh_expires_at),
            created_at: Set(token.created_at),
            revoked_at: Set(token.revoked_at),
        };
        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn find_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<BearerToken>, StoreError> {
        Ok(self
            .find_token(access_token, TokenHint::Access)
            .await?
            .map(Into::into))
    }

    async fn find_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<BearerToken>, StoreError> {
        Ok(self
            .find_token(refresh_token, TokenHint::Refresh)
            .await?
            .map(Into::into))
    }

    async fn revoke(&self, token: &str, hint: TokenHint) -> Result<Option<BearerToken>, StoreError> {
        let Some(stored) = self.find_token(token, hint).await? else {
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();
        let updated = oauth2_token::Entity::update_many()
            .col_expr(oauth2_token::Column::RevokedAt, Expr::value(now))
            .filter(oauth2_token::Column::Id.eq(stored.id.clone()))
            .filter(oauth2_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;

        if updated.rows_affected == 1 {
            let mut revoked: BearerToken = stored.into();
            revoked.revoked_at = Some(now);
            Ok(Some(revoked))
        } else {
            Ok(None)
        }
    }

    async fn purge_expired(&self) -> Result<PurgeCounts, StoreError> {
        let now = OffsetDateTime::now_utc();

        let codes = oauth2_authorization::Entity::delete_many()
            .filter(oauth2_authorization::Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await?;

        let tokens = oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::AccessTokenExpiresAt.lte(now))
            .filter(
                Condition::any()
                    .add(oauth2_token::Column::RefreshTokenExpiresAt.is_null())
                    .add(oauth2_token::Column::RefreshTokenExpiresAt.lte(now)),
            )
            .exec(self.db.as_ref())
            .await?;

        Ok(PurgeCounts {
            codes: codes.rows_affected,
            tokens: tokens.rows_affected,
        })
    }
}
