//! OAuth2 client validation for Kerberos host and service principals.
//!
//! A login console running on an enrolled host asks an OAuth2 grant engine to
//! authenticate end users against an external identity provider. The console
//! itself is the OAuth2 client, and its client id is its Kerberos principal
//! (`host/<fqdn>@REALM`). This crate decides, for every step of the
//! authorization-code grant, whether such a client is who it claims to be.

pub mod cache;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod identity;
pub mod idp;
pub mod principal;
pub mod store;
pub mod validator;

pub use cache::ClientIdentityCache;
pub use identity::{SessionVerifier, Verification, WhoamiClient};
pub use principal::{PrincipalKind, PrincipalName};
pub use validator::{ClientValidator, GrantLifetimes};
