//! Proof of client identity.
//!
//! A client proves it is the Kerberos principal it claims to be by presenting
//! a session that the trusted identity endpoint resolves back to that same
//! principal. [`SessionVerifier`] is the seam the validator talks to;
//! [`WhoamiClient`] is the production implementation.

mod record;
pub mod tls;
mod whoami;

pub use record::{IdentityRecord, ObjectKind, Verification};
pub use whoami::{SESSION_COOKIE, WHOAMI_PATH, WhoamiClient, interpret_response, whoami_payload};

use secrecy::SecretString;
use std::future::Future;

/// Resolves an opaque session secret to a verified identity.
///
/// Implementations must collapse every failure cause into
/// [`Verification::Failed`] so callers cannot tell an unreachable endpoint
/// from an invalid session.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, session: &SecretString) -> impl Future<Output = Verification> + Send;
}
