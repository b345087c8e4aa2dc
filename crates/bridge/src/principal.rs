//! Kerberos principal names as used for OAuth2 client identifiers.
//!
//! Only the text form is handled here (`primary[/instance]@REALM`, with `\/`
//! and `\@` escapes). Clients are host principals (`host/<fqdn>@REALM`) or
//! service principals (`<svc>/<fqdn>@REALM`); anything else parses as
//! [`PrincipalKind::Other`] and is never accepted as a client.

use crate::error::PrincipalError;
use std::fmt;
use std::str::FromStr;

const HOST_SERVICE: &str = "host";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    Host,
    Service,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrincipalName {
    primary: String,
    instance: Option<String>,
    realm: String,
    kind: PrincipalKind,
}

impl PrincipalName {
    pub fn parse(principal: &str) -> Result<Self, PrincipalError> {
        if principal.is_empty() {
            return Err(PrincipalError::Empty);
        }

        let name_and_realm = split_unescaped(principal, b'@');
        let (name, realm) = match name_and_realm.as_slice() {
            [_] => return Err(PrincipalError::MissingRealm(principal.to_string())),
            [name, realm] => (*name, unescape(realm)),
            _ => return Err(PrincipalError::NotNameAtRealm(principal.to_string())),
        };
        if realm.is_empty() {
            return Err(PrincipalError::MissingRealm(principal.to_string()));
        }

        let components: Vec<String> = split_unescaped(name, b'/')
            .into_iter()
            .map(unescape)
            .collect();
        if components.iter().any(String::is_empty) {
            return Err(PrincipalError::EmptyComponent(principal.to_string()));
        }

        let mut components = components.into_iter();
        match (components.next(), components.next(), components.len()) {
            (Some(primary), None, _) => Ok(Self {
                primary,
                instance: None,
                realm,
                kind: PrincipalKind::Other,
            }),
            (Some(primary), Some(instance), 0) => {
                let kind = if primary == HOST_SERVICE {
                    PrincipalKind::Host
                } else {
                    PrincipalKind::Service
                };
                Ok(Self {
                    primary,
                    instance: Some(instance),
                    realm,
                    kind,
                })
            }
            (_, _, rest) => Err(PrincipalError::TooManyComponents {
                principal: principal.to_string(),
                count: rest + 2,
            }),
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn is_host(&self) -> bool {
        self.kind == PrincipalKind::Host
    }

    /// True for `<svc>/<fqdn>` principals other than `host/`.
    pub fn is_service(&self) -> bool {
        self.kind == PrincipalKind::Service
    }

    /// Service name part; `host` for host principals.
    pub fn service_name(&self) -> Option<&str> {
        self.instance.as_ref().map(|_| self.primary.as_str())
    }

    /// The fqdn instance of a host or service principal.
    pub fn hostname(&self) -> Option<&str> {
        self.instance.as_deref()
    }
}

impl FromStr for PrincipalName {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", escape(&self.primary, &['/', '@']))?;
        if let Some(instance) = &self.instance {
            write!(f, "/{}", escape(instance, &['/', '@']))?;
        }
        write!(f, "@{}", escape(&self.realm, &['@']))
    }
}

/// Splits on `sep` unless it is preceded by a backslash.
fn split_unescaped(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == sep {
            parts.push(&s[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

fn unescape(s: &str) -> String {
    s.replace("\\@", "@").replace("\\/", "/")
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
