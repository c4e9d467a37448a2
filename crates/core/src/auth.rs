//! Request authentication for the control surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared key for the `api_key` method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("auth misconfigured: {0}")]
    Misconfigured(String),
}

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            subject: "anonymous".to_string(),
        }
    }
}

/// Validates request credentials extracted from headers.
pub trait Authenticator: Send + Sync {
    /// Name of the method, e.g. "none" or "api_key".
    fn method_name(&self) -> &str;

    /// Authenticate from lowercase header name/value pairs.
    fn authenticate(&self, headers: &HashMap<String, String>) -> Result<Identity, AuthError>;
}

/// Accepts every request as anonymous.
pub struct NoneAuthenticator;

impl Authenticator for NoneAuthenticator {
    fn method_name(&self) -> &str {
        "none"
    }

    fn authenticate(&self, _headers: &HashMap<String, String>) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }
}

/// Validates a shared key passed in the `x-api-key` header.
pub struct ApiKeyAuthenticator {
    key: String,
}

impl ApiKeyAuthenticator {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn method_name(&self) -> &str {
        "api_key"
    }

    fn authenticate(&self, headers: &HashMap<String, String>) -> Result<Identity, AuthError> {
        let presented = headers
            .get("x-api-key")
            .ok_or(AuthError::MissingCredentials)?;
        if presented == &self.key {
            Ok(Identity {
                subject: "api_key".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Build the authenticator configured in `config`.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator)),
        AuthMethod::ApiKey => {
            let key = config.api_key.as_ref().ok_or_else(|| {
                AuthError::Misconfigured("api_key method requires auth.api_key".to_string())
            })?;
            Ok(Box::new(ApiKeyAuthenticator::new(key.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_none_accepts_everything() {
        let auth = NoneAuthenticator;
        let identity = auth.authenticate(&headers(&[])).unwrap();
        assert_eq!(identity, Identity::anonymous());
    }

    #[test]
    fn test_api_key_valid() {
        let auth = ApiKeyAuthenticator::new("secret");
        let identity = auth
            .authenticate(&headers(&[("x-api-key", "secret")]))
            .unwrap();
        assert_eq!(identity.subject, "api_key");
    }

    #[test]
    fn test_api_key_missing() {
        let auth = ApiKeyAuthenticator::new("secret");
        let result = auth.authenticate(&headers(&[]));
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[test]
    fn test_api_key_wrong() {
        let auth = ApiKeyAuthenticator::new("secret");
        let result = auth.authenticate(&headers(&[("x-api-key", "wrong")]));
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn test_create_authenticator_requires_key() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: None,
        };
        assert!(matches!(
            create_authenticator(&config),
            Err(AuthError::Misconfigured(_))
        ));

        let config = AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        };
        assert_eq!(create_authenticator(&config).unwrap().method_name(), "none");
    }
}
