use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;

/// Load or generate the JWT signing key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/jwt_secret.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        // Invalid key file, regenerate
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    std::fs::create_dir_all(data_dir)?;
    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Issue an access token.
/// Claims: sub=user_name, number, iat, exp
pub fn issue_access_token(
    secret: &[u8],
    user_name: &str,
    number: i64,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_name.to_string(),
        number,
        iat: now,
        exp: now + ttl_hours * 3600,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate an access token and return its claims.
pub fn validate_access_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips_claims() {
        let secret = [7u8; 32];
        let token = issue_access_token(&secret, "minji", 3, 6).unwrap();
        let claims = validate_access_token(&secret, &token).unwrap();

        assert_eq!(claims.sub, "minji");
        assert_eq!(claims.number, 3);
        assert_eq!(claims.exp - claims.iat, 6 * 3600);
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let token = issue_access_token(&[1u8; 32], "minji", 3, 6).unwrap();
        assert!(validate_access_token(&[2u8; 32], &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let secret = [9u8; 32];
        let token = issue_access_token(&secret, "minji", 3, -1).unwrap();
        let err = validate_access_token(&secret, &token).unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn secret_is_persisted_between_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let first = load_or_generate_jwt_secret(dir).unwrap();
        let second = load_or_generate_jwt_secret(dir).unwrap();
        assert_eq!(first.len(), 32);
        assert_eq!(first, second);
    }
}
