//! Bearer-token verification: a pure function `token -> user_id | reject`.
//!
//! The issuer of tokens lives outside this system's scope (§1); this module
//! only verifies HS256-signed JWTs against a shared secret and extracts the
//! `sub` claim as the user id.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(jsonwebtoken::Algorithm::HS256),
        }
    }

    /// Verify `token` and return the embedded user id, or a `DomainError::Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<String, DomainError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|_| DomainError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(secret: &str, user_id: &str, exp_offset_secs: i64) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset_secs) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_user_id() {
        let verifier = TokenVerifier::new("secret");
        let token = token_for("secret", "u1", 3600);
        assert_eq!(verifier.verify(&token).unwrap(), "u1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let verifier = TokenVerifier::new("secret");
        let token = token_for("other-secret", "u1", 3600);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = TokenVerifier::new("secret");
        let token = token_for("secret", "u1", -3600);
        assert!(verifier.verify(&token).is_err());
    }
}
