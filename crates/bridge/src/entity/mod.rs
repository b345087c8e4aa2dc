//! SeaORM entities for the durable grant store.

pub mod oauth2_authorization;
pub mod oauth2_token;
