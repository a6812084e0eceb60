pub mod credentials;
pub mod healthz;
pub mod services;

use actix_web::HttpRequest;
use async_trait::async_trait;
use log::error;

use super::identity::chain::ChainVerifier;
use super::identity::{IdentityVerifier, VerifiedIdentity, VerifyResponse};
use super::response::{self, Response};

#[async_trait(?Send)]
pub trait Handler {
    async fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response;
}

/// Resolves the caller of `req`, or the response rejecting it.
fn verify_caller(
    verifier: &ChainVerifier,
    req: &HttpRequest,
) -> std::result::Result<VerifiedIdentity, Response> {
    let resp = match verifier.verify_request(req) {
        Ok(resp) => resp,
        Err(e) => {
            error!("Verify identity failed: {e:#}");
            return Err(Response::error(response::AUTHN_ERROR));
        }
    };
    match resp {
        VerifyResponse::Ok(identity) => Ok(identity),
        VerifyResponse::Unauthenticated => Err(Response::unauthenticated("Invalid credentials")),
        VerifyResponse::Continue => Err(Response::unauthenticated("Missing credentials")),
    }
}
