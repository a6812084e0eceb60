use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use tokio::task;

use crate::broker::db::{Database, RoleRecord, Transaction};
use crate::broker::policy::build_policy;
use crate::time::current_timestamp;
use crate::types::service::ServiceDefinition;

use super::Provisioner;

/// Keeps one role record per service in the broker database, carrying the
/// service-wide policy the role would hold.
pub struct LocalProvisioner {
    db: Arc<Database>,
    account_id: String,
    role_path: String,
}

impl LocalProvisioner {
    pub fn new(db: Arc<Database>, account_id: &str, role_path: &str) -> Self {
        Self {
            db,
            account_id: account_id.to_string(),
            role_path: role_path.to_string(),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Transaction) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || db.with_transaction(f))
            .await
            .context("join provisioning task")?
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    fn role_reference(&self, name: &str) -> String {
        if self.role_path.is_empty() {
            format!("arn:aws:iam::{}:role/{name}-s3-access-role", self.account_id)
        } else {
            format!(
                "arn:aws:iam::{}:role/{}/{name}-s3-access-role",
                self.account_id, self.role_path
            )
        }
    }

    async fn create_role(&self, service: &ServiceDefinition) -> Result<()> {
        let policy = build_policy(service, None, None)
            .context("build role policy")?
            .to_json()?;
        let now = current_timestamp();
        let role = RoleRecord {
            name: service.name.clone(),
            arn: self.role_reference(&service.name),
            policy,
            create_time: now,
            update_time: now,
        };

        debug!("Provision role {}", role.arn);
        self.run(move |tx| {
            if tx.is_role_exists(&role.name)? {
                return tx.update_role_policy(&role.name, &role.policy, role.update_time);
            }
            tx.create_role(&role)
        })
        .await
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        debug!("Retire role of service {name}");
        let name = name.to_string();
        self.run(move |tx| tx.delete_role(&name)).await
    }

    async fn role_exists(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.run(move |tx| tx.is_role_exists(&name)).await
    }

    async fn list_roles(&self) -> Result<Vec<String>> {
        let roles = self.run(|tx| tx.list_roles()).await?;
        Ok(roles.into_iter().map(|role| role.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::broker::policy::PolicyDocument;
    use crate::types::service::PermissionTier;

    use super::*;

    fn mock_service(name: &str, patterns: &[&str]) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            bucket_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            permission: PermissionTier::ReadOnly,
            restricted_users: BTreeSet::new(),
            role: String::new(),
            create_time: 0,
            update_time: 0,
        }
    }

    #[test]
    fn test_role_reference() {
        let db = Arc::new(Database::memory().unwrap());
        let provisioner = LocalProvisioner::new(Arc::clone(&db), "123456789012", "service-role");
        assert_eq!(
            provisioner.role_reference("analytics"),
            "arn:aws:iam::123456789012:role/service-role/analytics-s3-access-role"
        );

        let provisioner = LocalProvisioner::new(db, "123456789012", "");
        assert_eq!(
            provisioner.role_reference("analytics"),
            "arn:aws:iam::123456789012:role/analytics-s3-access-role"
        );
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let db = Arc::new(Database::memory().unwrap());
        let provisioner = LocalProvisioner::new(Arc::clone(&db), "000000000000", "service-role");

        assert!(!provisioner.role_exists("analytics").await.unwrap());
        provisioner
            .create_role(&mock_service("analytics", &["analytics-*"]))
            .await
            .unwrap();
        assert!(provisioner.role_exists("analytics").await.unwrap());

        // A second create refreshes the policy in place.
        provisioner
            .create_role(&mock_service("analytics", &["analytics-*", "reports-*"]))
            .await
            .unwrap();
        let role = db.with_transaction(|tx| tx.get_role("analytics")).unwrap();
        let policy: PolicyDocument = serde_json::from_str(&role.policy).unwrap();
        assert_eq!(policy.resources().len(), 4);

        provisioner
            .create_role(&mock_service("webapp", &["webapp-*"]))
            .await
            .unwrap();
        assert_eq!(
            provisioner.list_roles().await.unwrap(),
            vec![String::from("analytics"), String::from("webapp")]
        );

        provisioner.delete_role("analytics").await.unwrap();
        provisioner.delete_role("analytics").await.unwrap();
        assert!(!provisioner.role_exists("analytics").await.unwrap());
    }
}
