// Talon
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Bearer credential resolution
//!
//! Credentials only select the tier and usage bucket. A missing, malformed or
//! invalid token never fails a request; the caller is treated as the shared
//! anonymous free-tier user instead.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use talon_core::Tier;
use thiserror::Error;
use tracing::{debug, warn};

/// Usage bucket shared by every anonymous caller
pub const ANONYMOUS_USER_ID: &str = "free-tier";

/// Credential failures, logged and never surfaced to clients
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid authorization header format")]
    InvalidHeader,

    #[error("Token carries no user id")]
    MissingUserId,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject of the usage counter
    pub user_id: String,

    /// `pro` unlocks unlimited analyses, anything else is free
    #[serde(default)]
    pub tier: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create claims expiring `expires_in` from now
    pub fn new(user_id: impl Into<String>, tier: Tier, expires_in: Duration) -> Self {
        let tier = match tier {
            Tier::Pro => "pro",
            Tier::Free => "free",
        };

        Self {
            user_id: user_id.into(),
            tier: tier.to_string(),
            exp: (Utc::now() + expires_in).timestamp(),
        }
    }

    pub fn tier(&self) -> Tier {
        if self.tier == "pro" { Tier::Pro } else { Tier::Free }
    }
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    /// Create a new JWT manager with a secret key
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Create a JWT token
    pub fn create_token(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }

    /// Validate and decode a JWT token, rejecting expired ones
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;
        if claims.user_id.trim().is_empty() {
            return Err(AuthError::MissingUserId);
        }
        Ok(claims)
    }
}

/// Resolved caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub tier: Tier,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER_ID.to_string(),
            tier: Tier::Free,
        }
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Maps request credentials to a caller identity
pub struct AuthService {
    jwt_manager: JwtManager,
    anonymous_per_ip: bool,
}

impl AuthService {
    pub fn new(jwt_secret: &str, anonymous_per_ip: bool) -> Self {
        Self {
            jwt_manager: JwtManager::new(jwt_secret),
            anonymous_per_ip,
        }
    }

    pub fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    /// Resolve the caller from an optional `Authorization` header value
    pub fn resolve(&self, auth_header: Option<&str>, remote_ip: Option<IpAddr>) -> AuthContext {
        let Some(header) = auth_header else {
            return self.anonymous(remote_ip);
        };

        match extract_token_from_header(header).and_then(|token| self.jwt_manager.validate_token(token)) {
            Ok(claims) => {
                debug!("Authenticated caller {}", claims.user_id);
                AuthContext {
                    tier: claims.tier(),
                    user_id: claims.user_id,
                }
            }
            Err(e) => {
                warn!("Ignoring invalid credentials: {}", e);
                self.anonymous(remote_ip)
            }
        }
    }

    fn anonymous(&self, remote_ip: Option<IpAddr>) -> AuthContext {
        match remote_ip {
            Some(ip) if self.anonymous_per_ip => AuthContext {
                user_id: format!("{}:{}", ANONYMOUS_USER_ID, ip),
                tier: Tier::Free,
            },
            _ => AuthContext::anonymous(),
        }
    }
}

/// Extract JWT token from Authorization header
pub fn extract_token_from_header(auth_header: &str) -> Result<&str, AuthError> {
    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::InvalidHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn bearer(claims: &Claims) -> String {
        format!("Bearer {}", JwtManager::new(SECRET).create_token(claims).unwrap())
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header("Bearer abc.def").unwrap(), "abc.def");
        assert!(extract_token_from_header("Basic abc").is_err());
        assert!(extract_token_from_header("Bearer ").is_err());
    }

    #[test]
    fn test_pro_token_resolves_to_pro() {
        let service = AuthService::new(SECRET, false);
        let header = bearer(&Claims::new("alice", Tier::Pro, Duration::hours(1)));

        let context = service.resolve(Some(&header), None);
        assert_eq!(context, AuthContext { user_id: "alice".to_string(), tier: Tier::Pro });
    }

    #[test]
    fn test_unknown_tier_is_free() {
        let service = AuthService::new(SECRET, false);
        let mut claims = Claims::new("bob", Tier::Free, Duration::hours(1));
        claims.tier = "enterprise".to_string();

        let context = service.resolve(Some(&bearer(&claims)), None);
        assert_eq!(context.user_id, "bob");
        assert_eq!(context.tier, Tier::Free);
    }

    #[test]
    fn test_invalid_credentials_fall_back_to_anonymous() {
        let service = AuthService::new(SECRET, false);
        let expired = bearer(&Claims::new("carol", Tier::Pro, Duration::hours(-2)));
        let foreign = format!("Bearer {}", JwtManager::new("other-secret").create_token(&Claims::new("dave", Tier::Pro, Duration::hours(1))).unwrap());

        for header in [None, Some("garbage"), Some("Bearer not.a.jwt"), Some(expired.as_str()), Some(foreign.as_str())] {
            assert_eq!(service.resolve(header, None), AuthContext::anonymous(), "header: {:?}", header);
        }
    }

    #[test]
    fn test_anonymous_per_ip() {
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        let shared = AuthService::new(SECRET, false);
        assert_eq!(shared.resolve(None, Some(ip)).user_id, "free-tier");

        let per_ip = AuthService::new(SECRET, true);
        assert_eq!(per_ip.resolve(None, Some(ip)).user_id, "free-tier:10.0.0.7");
        assert_eq!(per_ip.resolve(None, None).user_id, "free-tier");
    }
}
