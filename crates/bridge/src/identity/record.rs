use crate::principal::PrincipalName;
use serde_json::Value;

/// Directory object class of the verified caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Host,
    Service,
    User,
    Unknown,
}

impl ObjectKind {
    pub fn from_object_class(object: &str) -> Self {
        match object {
            "host" => ObjectKind::Host,
            "service" => ObjectKind::Service,
            "user" => ObjectKind::User,
            _ => ObjectKind::Unknown,
        }
    }

    /// Only hosts and services may act as OAuth2 clients.
    pub fn is_client(&self) -> bool {
        matches!(self, ObjectKind::Host | ObjectKind::Service)
    }
}

#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub principal: PrincipalName,
    pub object_kind: ObjectKind,
    pub arguments: Vec<String>,
    registered_host: Option<String>,
    pub raw: Value,
}

impl IdentityRecord {
    pub fn new(
        principal: PrincipalName,
        object_kind: ObjectKind,
        arguments: Vec<String>,
        raw: Value,
    ) -> Self {
        // hosts are keyed by fqdn, services by their full principal
        let registered_host = arguments.first().and_then(|first| match object_kind {
            ObjectKind::Service => PrincipalName::parse(first)
                .ok()
                .and_then(|p| p.hostname().map(str::to_string)),
            _ => Some(first.clone()),
        });
        Self {
            principal,
            object_kind,
            arguments,
            registered_host,
            raw,
        }
    }

    /// Hostname of the directory entry the session belongs to.
    pub fn registered_hostname(&self) -> Option<&str> {
        self.registered_host.as_deref()
    }
}

/// Outcome of a session check. There is deliberately no error detail.
#[derive(Debug, Clone)]
pub enum Verification {
    Verified(IdentityRecord),
    Failed,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified(_))
    }
}
