use actix_web::HttpRequest;
use anyhow::Result;

use super::cookie::CookieVerifier;
use super::header::TrustedHeaderVerifier;
use super::{IdentityVerifier, VerifyResponse};

pub enum UnionVerifier {
    Cookie(CookieVerifier),
    TrustedHeader(TrustedHeaderVerifier),
}

impl IdentityVerifier for UnionVerifier {
    fn verify_request(&self, req: &HttpRequest) -> Result<VerifyResponse> {
        match self {
            UnionVerifier::Cookie(verifier) => verifier.verify_request(req),
            UnionVerifier::TrustedHeader(verifier) => verifier.verify_request(req),
        }
    }
}
