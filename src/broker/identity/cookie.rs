use actix_web::HttpRequest;
use anyhow::Result;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::debug;
use serde_json::{Map, Value};

use super::{IdentityVerifier, VerifiedIdentity, VerifyResponse};

/// Verifies the session cookie set by the login portal: an HS256 JWT signed
/// with a shared secret.
pub struct CookieVerifier {
    cookie_name: String,
    key: DecodingKey,
    username_claim: String,
}

impl CookieVerifier {
    pub fn new(cookie_name: &str, secret: &[u8], username_claim: &str) -> Self {
        Self {
            cookie_name: cookie_name.to_string(),
            key: DecodingKey::from_secret(secret),
            username_claim: username_claim.to_string(),
        }
    }

    fn validate_token(&self, token: &str) -> Option<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_aud = false;

        let claims = match decode::<Map<String, Value>>(token, &self.key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("Reject session cookie: {e}");
                return None;
            }
        };

        let user = claims
            .get(&self.username_claim)
            .or_else(|| claims.get("sub"))
            .and_then(Value::as_str)
            .map(str::trim)?;
        if user.is_empty() {
            return None;
        }
        Some(user.to_string())
    }
}

impl IdentityVerifier for CookieVerifier {
    fn verify_request(&self, req: &HttpRequest) -> Result<VerifyResponse> {
        let cookie = match req.cookie(&self.cookie_name) {
            Some(cookie) => cookie,
            None => return Ok(VerifyResponse::Continue),
        };

        match self.validate_token(cookie.value()) {
            Some(user) => Ok(VerifyResponse::Ok(VerifiedIdentity::new(user))),
            None => Ok(VerifyResponse::Unauthenticated),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    /// Signs `claims` with HS256, adding an `exp` one hour ahead unless given.
    pub fn encode_token(secret: &[u8], mut claims: Value) -> String {
        if claims.get("exp").is_none() {
            claims["exp"] = Value::from(Utc::now().timestamp() + 3600);
        }
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn verify(verifier: &CookieVerifier, token: &str) -> Option<String> {
        let req = TestRequest::default()
            .cookie(Cookie::new("s3bridge_session", token.to_string()))
            .to_http_request();
        match verifier.verify_request(&req).unwrap() {
            VerifyResponse::Ok(identity) => Some(identity.to_string()),
            VerifyResponse::Continue => panic!("cookie is present"),
            VerifyResponse::Unauthenticated => None,
        }
    }

    #[test]
    fn test_cookie() {
        let verifier = CookieVerifier::new("s3bridge_session", b"secret", "logged_in_username");

        let token = encode_token(b"secret", serde_json::json!({"logged_in_username": "alice"}));
        assert_eq!(verify(&verifier, &token), Some(String::from("alice")));

        let token = encode_token(b"secret", serde_json::json!({"sub": "bob"}));
        assert_eq!(verify(&verifier, &token), Some(String::from("bob")));

        // Wrong signature
        let token = encode_token(b"other", serde_json::json!({"sub": "bob"}));
        assert_eq!(verify(&verifier, &token), None);

        // Expired
        let token = encode_token(
            b"secret",
            serde_json::json!({"sub": "bob", "exp": Utc::now().timestamp() - 3600}),
        );
        assert_eq!(verify(&verifier, &token), None);

        // No usable username
        let token = encode_token(b"secret", serde_json::json!({"logged_in_username": 42}));
        assert_eq!(verify(&verifier, &token), None);
        let token = encode_token(b"secret", serde_json::json!({"sub": "  "}));
        assert_eq!(verify(&verifier, &token), None);

        assert_eq!(verify(&verifier, "not-a-jwt"), None);

        let req = TestRequest::default().to_http_request();
        assert!(matches!(
            verifier.verify_request(&req).unwrap(),
            VerifyResponse::Continue
        ));
    }
}
