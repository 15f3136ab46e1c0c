use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("jwt encoding failed")]
    JwtEncoding,
    #[error("jwt decoding failed")]
    JwtDecoding,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) exp: i64,
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Token issuance lives with the identity provider; this is kept for test
/// harnesses and local tooling.
pub(crate) fn create_access_token(
    subject: &str,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let expire = OffsetDateTime::now_utc()
        + expires_in.unwrap_or_else(|| {
            Duration::minutes(settings.security().access_token_expire_minutes as i64)
        });

    let claims = Claims { sub: subject.to_string(), exp: expire.unix_timestamp() };
    let key = EncodingKey::from_secret(settings.security().secret_key.as_bytes());

    encode(&jsonwebtoken::Header::new(algorithm), &claims, &key)
        .map_err(|_| SecurityError::JwtEncoding)
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let key = DecodingKey::from_secret(settings.security().secret_key.as_bytes());
    let validation = Validation::new(algorithm);

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| SecurityError::JwtDecoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn token_round_trip_preserves_subject() {
        let settings = test_support::test_settings();
        let token = create_access_token("user-42", &settings, None).expect("token");
        let claims = verify_token(&token, &settings).expect("claims");
        assert_eq!(claims.sub, "user-42");
    }

    #[test]
    fn expired_token_is_rejected() {
        let settings = test_support::test_settings();
        let token = create_access_token("user-42", &settings, Some(Duration::minutes(-5)))
            .expect("token");
        assert!(verify_token(&token, &settings).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let settings = test_support::test_settings();
        assert!(verify_token("not-a-token", &settings).is_err());
    }
}
