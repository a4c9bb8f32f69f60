//! JWT access token issuing and verification
//!
//! Tokens are compact HS256 JWTs: header `{"typ":"JWT","alg":"HS256"}`,
//! payload `{iss, iat, exp, sub, id}`. There is no server-side state and no
//! revocation; a token dies at `exp`.

use crate::{
    auth::principal::{Principal, Role},
    config::{AppConfig, SigningConfig},
    error::{AppError, TokenError},
    models::Identity,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// JWT claims for access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration; a token without it never verifies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Subject (account email)
    pub sub: String,

    /// User ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Reserved for multi-role support; never emitted today
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Issues and verifies access tokens with one shared HMAC key.
pub struct TokenProvider {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenProvider {
    /// Build the provider from signing material loaded at startup
    pub fn new(config: &SigningConfig) -> Result<Self, AppError> {
        let key = config.key_bytes()?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Presence and expiry of `exp` are checked in `parse_and_verify_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Ok(Self {
            issuer: config.issuer.clone(),
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            validation,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(&config.jwt)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for `identity` valid for `ttl` from now
    pub fn generate_token(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        self.generate_token_at(identity, Utc::now(), ttl)
    }

    /// Issue a token as if the current time were `issued_at`
    pub fn generate_token_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        if identity.email.trim().is_empty() {
            return Err(TokenError::InvalidRequest("identity email is empty".to_string()));
        }
        // Sub-second lifetimes would collapse exp onto iat.
        if ttl.num_seconds() < 1 {
            return Err(TokenError::InvalidRequest(
                "ttl must be at least one second".to_string(),
            ));
        }

        let expires_at = issued_at + ttl;
        let claims = Claims {
            iss: Some(self.issuer.clone()),
            iat: Some(issued_at.timestamp()),
            exp: Some(expires_at.timestamp()),
            sub: identity.email.clone(),
            id: Some(identity.id),
            role: None,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            TokenError::Encoding(e.to_string())
        })
    }

    /// Verify signature, structure and expiry in a single parse
    pub fn parse_and_verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse_and_verify_at(token, Utc::now())
    }

    /// Same as [`parse_and_verify`](Self::parse_and_verify), judging expiry at `now`
    pub fn parse_and_verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| classify(e.kind()))?
            .claims;

        let exp = claims.exp.ok_or(TokenError::MissingClaim("exp"))?;
        if now.timestamp() >= exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// True only for a correctly signed, well-formed, unexpired token
    pub fn valid_token(&self, token: &str) -> bool {
        self.valid_token_at(token, Utc::now())
    }

    pub fn valid_token_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        match self.parse_and_verify_at(token, now) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(reason = %e, "Token validation failed");
                false
            }
        }
    }

    /// Extract the claims of a valid token
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse_and_verify(token)
    }

    /// Build the principal for a valid token.
    ///
    /// Every authenticated principal gets exactly [`Role::User`], whatever the
    /// payload says.
    pub fn get_authentication(&self, token: &str) -> Result<Principal, TokenError> {
        let claims = self.parse_and_verify(token)?;
        Ok(Principal::user(claims.sub, claims.id))
    }

    /// Extract the `id` claim of a valid token
    pub fn get_user_id(&self, token: &str) -> Result<i64, TokenError> {
        self.parse_and_verify(token)?
            .id
            .ok_or(TokenError::MissingClaim("id"))
    }
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureMismatch,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}
