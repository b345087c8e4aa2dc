use hyper::StatusCode;
use thiserror::Error;

/// Reasons a string is not an acceptable Kerberos principal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    #[error("Principal is empty")]
    Empty,
    #[error("Principal is not in <name>@<realm> format: {0}")]
    NotNameAtRealm(String),
    #[error("Principal has no realm: {0}")]
    MissingRealm(String),
    #[error("Principal has an empty name component: {0}")]
    EmptyComponent(String),
    #[error("Principal has {count} name components, at most 2 are supported: {principal}")]
    TooManyComponents { principal: String, count: usize },
}

/// Why a client was not accepted.
///
/// Every variant ends up as a plain "deny" towards the grant engine; the
/// variants only exist so the reason can be logged.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Malformed principal: {0}")]
    MalformedPrincipal(#[from] PrincipalError),
    #[error("Client identity could not be verified")]
    VerificationFailed,
    #[error("Policy denied: {0}")]
    PolicyDenied(String),
    #[error("Grant store inconsistency: {0}")]
    StoreInconsistency(String),
}

impl ValidationError {
    pub fn denied(reason: impl Into<String>) -> Self {
        ValidationError::PolicyDenied(reason.into())
    }
}

impl From<StoreError> for ValidationError {
    fn from(e: StoreError) -> Self {
        ValidationError::StoreInconsistency(e.to_string())
    }
}

/// Causes of a failed `whoami` round trip. Logged, never handed to callers.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Timeout after {0:?} while calling the identity endpoint")]
    Timeout(std::time::Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status} from the identity endpoint")]
    Http { status: StatusCode },
    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),
    #[error("Session is not authenticated")]
    Unverified,
    #[error("Identity endpoint returned an unusable principal: {0}")]
    Principal(#[from] PrincipalError),
    #[error("Session secret cannot be sent as a cookie")]
    InvalidCookie,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Corrupt grant record {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("Random number generator failure: {0}")]
    Rng(#[from] getrandom::Error),
}

/// Failures while building long-lived components at start-up.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Cannot read CA certificate {path}: {source}")]
    CaCertificate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No usable CA certificate found in {0}")]
    NoCertificates(String),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("Invalid identity endpoint: {0}")]
    InvalidEndpoint(String),
}
