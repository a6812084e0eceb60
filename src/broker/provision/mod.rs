pub mod config;
pub mod factory;
pub mod local;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::service::ServiceDefinition;

/// The layer owning the privilege-bearing role behind each service. The
/// registry commits its own change first and then calls into this layer, so
/// every method here may fail independently of the registry.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Role reference for the service `name`. Must be deterministic, the
    /// registry stores it before the role is created.
    fn role_reference(&self, name: &str) -> String;

    /// Creates the role, or refreshes it if it already exists.
    async fn create_role(&self, service: &ServiceDefinition) -> Result<()>;

    /// Retires the role of the service `name`. Retiring an absent role succeeds.
    async fn delete_role(&self, name: &str) -> Result<()>;

    async fn role_exists(&self, name: &str) -> Result<bool>;

    /// Service names that currently own a role.
    async fn list_roles(&self) -> Result<Vec<String>>;
}
