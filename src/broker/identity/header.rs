use actix_web::HttpRequest;
use anyhow::Result;

use super::{IdentityVerifier, VerifiedIdentity, VerifyResponse};

/// Accepts the identity an authorizing gateway put into a request header.
/// Only safe when the broker is reachable through that gateway alone.
pub struct TrustedHeaderVerifier {
    header: String,
}

impl TrustedHeaderVerifier {
    pub fn new(header: &str) -> Self {
        Self {
            header: header.to_string(),
        }
    }
}

impl IdentityVerifier for TrustedHeaderVerifier {
    fn verify_request(&self, req: &HttpRequest) -> Result<VerifyResponse> {
        let value = match req.headers().get(self.header.as_str()) {
            Some(value) => value,
            None => return Ok(VerifyResponse::Continue),
        };
        let user = match value.to_str() {
            Ok(user) => user.trim(),
            Err(_) => return Ok(VerifyResponse::Unauthenticated),
        };
        if user.is_empty() {
            return Ok(VerifyResponse::Unauthenticated);
        }
        Ok(VerifyResponse::Ok(VerifiedIdentity::new(user)))
    }
}
