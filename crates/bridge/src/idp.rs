//! External identity provider endpoint records.
//!
//! An IdP is either described explicitly (`auth_uri` + `token_uri`) or picked
//! from a well-known provider preset. The two forms are mutually exclusive.

use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

const DEFAULT_SUBJECT_CLAIM: &str = "sub";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdpError {
    #[error("IdP name must not be empty")]
    EmptyName,
    #[error("IdP {0}: cannot specify both auth_uri/token_uri and provider")]
    MutuallyExclusive(String),
    #[error("IdP {name}: {field} or provider is required")]
    MissingEndpoint { name: String, field: &'static str },
    #[error("IdP {name}: invalid {field}: {reason}")]
    InvalidUri {
        name: String,
        field: &'static str,
        reason: String,
    },
    #[error("IdP {0} is defined more than once")]
    Duplicate(String),
    #[error("Unknown IdP provider: {0}")]
    UnknownProvider(String),
}

/// Well-known providers supporting the device authorization grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdpProvider {
    Google,
    Github,
    MicrosoftCommon,
    MicrosoftConsumer,
    MicrosoftOrganizations,
}

impl IdpProvider {
    pub const ALL: [IdpProvider; 5] = [
        IdpProvider::Google,
        IdpProvider::Github,
        IdpProvider::MicrosoftCommon,
        IdpProvider::MicrosoftConsumer,
        IdpProvider::MicrosoftOrganizations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdpProvider::Google => "google",
            IdpProvider::Github => "github",
            IdpProvider::MicrosoftCommon => "microsoft-common",
            IdpProvider::MicrosoftConsumer => "microsoft-consumer",
            IdpProvider::MicrosoftOrganizations => "microsoft-organizations",
        }
    }

    /// `(authorization endpoint, token endpoint)` of the preset.
    pub fn endpoints(&self) -> (&'static str, &'static str) {
        match self {
            IdpProvider::Google => (
                "https://oauth2.googleapis.com/device/code",
                "https://oauth2.googleapis.com/token",
            ),
            IdpProvider::Github => (
                "https://github.com/login/device",
                "https://github.com/login/oauth/access_token",
            ),
            IdpProvider::MicrosoftCommon => (
                "https://login.microsoftonline.com/common/oauth2/v2.0/devicecode",
                "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            ),
            IdpProvider::MicrosoftConsumer => (
                "https://login.microsoftonline.com/consumer/oauth2/v2.0/devicecode",
                "https://login.microsoftonline.com/consumer/oauth2/v2.0/token",
            ),
            IdpProvider::MicrosoftOrganizations => (
                "https://login.microsoftonline.com/organizations/oauth2/v2.0/devicecode",
                "https://login.microsoftonline.com/organizations/oauth2/v2.0/token",
            ),
        }
    }
}

impl fmt::Display for IdpProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdpProvider {
    type Err = IdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdpProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| IdpError::UnknownProvider(s.to_string()))
    }
}

fn default_subject_claim() -> String {
    DEFAULT_SUBJECT_CLAIM.to_string()
}

/// IdP record as written in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdpConfig {
    pub name: String,
    #[serde(default)]
    pub provider: Option<IdpProvider>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub userinfo_uri: Option<String>,
    #[serde(default)]
    pub keys_uri: Option<String>,
    #[serde(default)]
    pub issuer_url: Option<String>,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_subject_claim")]
    pub subject_claim: String,
}

/// Fully resolved, validated IdP endpoints.
#[derive(Debug, Clone)]
pub struct IdpEndpoints {
    pub name: String,
    pub auth_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Option<Url>,
    pub keys_endpoint: Option<Url>,
    pub issuer_url: Option<Url>,
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub scope: Option<String>,
    pub subject_claim: String,
}

impl IdpConfig {
    pub fn resolve(&self) -> Result<IdpEndpoints, IdpError> {
        if self.name.trim().is_empty() {
            return Err(IdpError::EmptyName);
        }

        let (auth, token) = match (self.provider, &self.auth_uri, &self.token_uri) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(IdpError::MutuallyExclusive(self.name.clone()));
            }
            (Some(provider), None, None) => provider.endpoints(),
            (None, None, _) => {
                return Err(self.missing("auth_uri"));
            }
            (None, _, None) => {
                return Err(self.missing("token_uri"));
            }
            (None, Some(auth), Some(token)) => (auth.as_str(), token.as_str()),
        };

        Ok(IdpEndpoints {
            name: self.name.clone(),
            auth_endpoint: self.parse_uri("auth_uri", auth)?,
            token_endpoint: self.parse_uri("token_uri", token)?,
            userinfo_endpoint: self.parse_optional("userinfo_uri", &self.userinfo_uri)?,
            keys_endpoint: self.parse_optional("keys_uri", &self.keys_uri)?,
            issuer_url: self.parse_optional("issuer_url", &self.issuer_url)?,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: self.scope.clone(),
            subject_claim: self.subject_claim.clone(),
        })
    }

    fn missing(&self, field: &'static str) -> IdpError {
        IdpError::MissingEndpoint {
            name: self.name.clone(),
            field,
        }
    }

    fn parse_uri(&self, field: &'static str, value: &str) -> Result<Url, IdpError> {
        let invalid = |reason: String| IdpError::InvalidUri {
            name: self.name.clone(),
            field,
            reason,
        };
        let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
        if url.host_str().is_none() {
            return Err(invalid("URI has no host".to_string()));
        }
        Ok(url)
    }

    fn parse_optional(
        &self,
        field: &'static str,
        value: &Option<String>,
    ) -> Result<Option<Url>, IdpError> {
        value
            .as_deref()
            .map(|v| self.parse_uri(field, v))
            .transpose()
    }
}

/// Resolved IdPs indexed by name.
#[derive(Debug, Clone, Default)]
pub struct IdpRegistry {
    by_name: BTreeMap<String, IdpEndpoints>,
}

impl IdpRegistry {
    pub fn from_configs(configs: &[IdpConfig]) -> Result<Self, IdpError> {
        let mut by_name = BTreeMap::new();
        for config in configs {
            let endpoints = config.resolve()?;
            if by_name.contains_key(&endpoints.name) {
                return Err(IdpError::Duplicate(endpoints.name));
            }
            by_name.insert(endpoints.name.clone(), endpoints);
        }
        Ok(Self { by_name })
    }

    pub fn get(&self, name: &str) -> Option<&IdpEndpoints> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
