use thiserror::Error;

/// Every way a broker operation can be rejected. Callers such as the audit
/// log rely on the variant, so a specific variant must be used whenever one
/// applies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    #[error("service '{0}' already exists")]
    DuplicateService(String),

    #[error("user '{user}' is not allowed to use service '{service}'")]
    AccessDenied { user: String, service: String },

    #[error("resource '{resource}' is not covered by service '{service}'")]
    ResourceNotAuthorized { service: String, resource: String },

    #[error("issue credentials failed: {0}")]
    IssuanceFailed(String),

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("provisioning failed: {0}")]
    ProvisioningFailed(String),
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

impl BrokerError {
    /// Stable tag for logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceNotFound(_) => "service_not_found",
            Self::DuplicateService(_) => "duplicate_service",
            Self::AccessDenied { .. } => "access_denied",
            Self::ResourceNotAuthorized { .. } => "resource_not_authorized",
            Self::IssuanceFailed(_) => "issuance_failed",
            Self::RegistryUnavailable(_) => "registry_unavailable",
            Self::ConfigurationError(_) => "configuration_error",
            Self::ProvisioningFailed(_) => "provisioning_failed",
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Wraps a persistence failure, keeping the whole context chain.
    pub fn registry(err: anyhow::Error) -> Self {
        Self::RegistryUnavailable(format!("{err:#}"))
    }

    pub fn issuance(err: anyhow::Error) -> Self {
        Self::IssuanceFailed(format!("{err:#}"))
    }

    pub fn provisioning(err: anyhow::Error) -> Self {
        Self::ProvisioningFailed(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_kind_and_message() {
        let err = BrokerError::AccessDenied {
            user: String::from("carol"),
            service: String::from("analytics"),
        };
        assert_eq!(err.kind(), "access_denied");
        assert_eq!(
            err.to_string(),
            "user 'carol' is not allowed to use service 'analytics'"
        );

        let err = BrokerError::registry(anyhow!("disk full").context("commit"));
        assert_eq!(err.kind(), "registry_unavailable");
        assert_eq!(err.to_string(), "registry unavailable: commit: disk full");
    }
}
