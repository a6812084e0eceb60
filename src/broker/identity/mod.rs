pub mod chain;
pub mod config;
pub mod cookie;
pub mod factory;
pub mod header;
pub mod union;

use std::fmt;

use actix_web::HttpRequest;
use anyhow::Result;

/// Caller identity that has passed verification. The authorization engine
/// accepts nothing else, it never looks at cookies or headers itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerifiedIdentity(String);

impl VerifiedIdentity {
    /// Wraps an identity the caller has already verified.
    pub fn new(user: impl Into<String>) -> Self {
        Self(user.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub enum VerifyResponse {
    Ok(VerifiedIdentity),
    /// This verifier has nothing to say about the request.
    Continue,
    /// The request carried credentials and they are invalid.
    Unauthenticated,
}

pub trait IdentityVerifier {
    fn verify_request(&self, req: &HttpRequest) -> Result<VerifyResponse>;
}
