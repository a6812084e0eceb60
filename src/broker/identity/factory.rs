use anyhow::Result;
use log::{info, warn};

use super::chain::ChainVerifier;
use super::config::IdentityConfig;
use super::cookie::CookieVerifier;
use super::header::TrustedHeaderVerifier;
use super::union::UnionVerifier;

/// Builds the verifier chain: session cookie first, then the trusted header.
pub struct IdentityFactory;

impl IdentityFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_verifier(&self, cfg: &IdentityConfig) -> Result<ChainVerifier> {
        let mut verifiers = Vec::new();

        if !cfg.jwt_secret.is_empty() {
            info!("Session cookie '{}' verification is enabled", cfg.cookie_name);
            let cookie = CookieVerifier::new(
                &cfg.cookie_name,
                cfg.jwt_secret.as_bytes(),
                &cfg.username_claim,
            );
            verifiers.push(UnionVerifier::Cookie(cookie));
        }

        if !cfg.trusted_header.is_empty() {
            warn!(
                "Trusting identities from header '{}', the broker MUST only be reachable through the gateway setting it",
                cfg.trusted_header
            );
            let header = TrustedHeaderVerifier::new(&cfg.trusted_header);
            verifiers.push(UnionVerifier::TrustedHeader(header));
        }

        let chain = ChainVerifier::new(verifiers);
        if chain.is_empty() {
            warn!("No identity verifier configured, every credential request will be rejected");
        }
        Ok(chain)
    }
}
