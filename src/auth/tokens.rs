use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;

use crate::{
    auth::jwt::{decode_token, make_token, new_access_claims, new_refresh_claims, Keys},
    errors::AppError,
};

/// A freshly signed access/refresh pair. `expires_at` is the refresh
/// token's absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub refresh_jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Token-signing capability consumed by the session service. The token's
/// internal structure is this seam's concern; the service only needs a
/// signed pair on issue and an owner identity on validation.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: ObjectId) -> Result<IssuedTokens, AppError>;

    /// Checks structure and signature of a presented refresh token and
    /// extracts the owning user. Says nothing about revocation; that is the
    /// session store's call.
    fn validate_refresh(&self, token: &str) -> Result<ObjectId, AppError>;
}

pub struct JwtTokenIssuer {
    keys: Keys,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl JwtTokenIssuer {
    pub fn new(secret: &str, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        Self {
            keys: Keys::new(secret),
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, user_id: ObjectId) -> Result<IssuedTokens, AppError> {
        let access_claims = new_access_claims(user_id.to_hex(), self.access_ttl_seconds);
        let (refresh_claims, refresh_jti) =
            new_refresh_claims(user_id.to_hex(), self.refresh_ttl_seconds);

        let access_token = make_token(&self.keys, &access_claims)?;
        let refresh_token = make_token(&self.keys, &refresh_claims)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            refresh_jti,
            expires_at: Utc::now() + Duration::seconds(self.refresh_ttl_seconds),
        })
    }

    fn validate_refresh(&self, token: &str) -> Result<ObjectId, AppError> {
        let data = decode_token(&self.keys, token)?;
        let claims = data.claims;

        if claims.typ != "refresh" || claims.jti.is_none() {
            return Err(AppError::Jwt);
        }

        ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> JwtTokenIssuer {
        JwtTokenIssuer::new("test-secret", 900, 3600)
    }

    #[test]
    fn issued_refresh_token_validates_back_to_owner() {
        let user_id = ObjectId::new();
        let tokens = issuer().issue(user_id).unwrap();

        let owner = issuer().validate_refresh(&tokens.refresh_token).unwrap();
        assert_eq!(owner, user_id);
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let tokens = issuer().issue(ObjectId::new()).unwrap();
        assert!(matches!(
            issuer().validate_refresh(&tokens.access_token),
            Err(AppError::Jwt)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(issuer().validate_refresh("not-a-jwt").is_err());
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let tokens = JwtTokenIssuer::new("other-secret", 900, 3600)
            .issue(ObjectId::new())
            .unwrap();
        assert!(issuer().validate_refresh(&tokens.refresh_token).is_err());
    }
}
