use hyper::StatusCode;
use krb_oauth2_bridge::error::{
    PrincipalError, SetupError, StoreError, ValidationError, VerifyError,
};
use std::time::Duration;

#[test]
fn test_principal_error_display() {
    assert_eq!(PrincipalError::Empty.to_string(), "Principal is empty");
    assert_eq!(
        PrincipalError::MissingRealm("host/web1".into()).to_string(),
        "Principal has no realm: host/web1"
    );
    assert_eq!(
        PrincipalError::TooManyComponents {
            principal: "a/b/c@EXAMPLE.COM".into(),
            count: 3,
        }
        .to_string(),
        "Principal has 3 name components, at most 2 are supported: a/b/c@EXAMPLE.COM"
    );
}

#[test]
fn test_validation_error_conversions() {
    let from_principal: ValidationError = PrincipalError::Empty.into();
    assert!(matches!(from_principal, ValidationError::MalformedPrincipal(_)));
    assert_eq!(from_principal.to_string(), "Malformed principal: Principal is empty");

    let denied = ValidationError::denied("user principals cannot be clients");
    assert_eq!(
        denied.to_string(),
        "Policy denied: user principals cannot be clients"
    );

    let corrupt = StoreError::Corrupt {
        id: "tok-1".into(),
        reason: "bad scopes".into(),
    };
    let from_store: ValidationError = corrupt.into();
    assert_eq!(
        from_store.to_string(),
        "Grant store inconsistency: Corrupt grant record tok-1: bad scopes"
    );
}

#[test]
fn test_verify_error_display() {
    assert_eq!(
        VerifyError::Http {
            status: StatusCode::UNAUTHORIZED
        }
        .to_string(),
        "HTTP 401 Unauthorized from the identity endpoint"
    );
    assert_eq!(
        VerifyError::Timeout(Duration::from_secs(5)).to_string(),
        "Timeout after 5s while calling the identity endpoint"
    );
    assert_eq!(
        VerifyError::BodyTooLarge(1024).to_string(),
        "Response body exceeds 1024 bytes"
    );
    let from_principal: VerifyError = PrincipalError::Empty.into();
    assert!(matches!(from_principal, VerifyError::Principal(_)));
}

#[test]
fn test_setup_error_keeps_io_source() {
    let err = SetupError::CaCertificate {
        path: "/etc/ipa/ca.crt".into(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
    };
    assert_eq!(
        err.to_string(),
        "Cannot read CA certificate /etc/ipa/ca.crt: missing"
    );
    assert!(std::error::Error::source(&err).is_some());
}
