use actix_web::HttpRequest;
use anyhow::Result;

use super::union::UnionVerifier;
use super::{IdentityVerifier, VerifyResponse};

/// Runs verifiers in order. The first verdict other than `Continue` wins.
pub struct ChainVerifier {
    verifiers: Vec<UnionVerifier>,
}

impl ChainVerifier {
    pub fn new(verifiers: Vec<UnionVerifier>) -> Self {
        Self { verifiers }
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

impl IdentityVerifier for ChainVerifier {
    fn verify_request(&self, req: &HttpRequest) -> Result<VerifyResponse> {
        for verifier in self.verifiers.iter() {
            match verifier.verify_request(req)? {
                VerifyResponse::Continue => continue,
                resp => return Ok(resp),
            }
        }
        Ok(VerifyResponse::Continue)
    }
}
