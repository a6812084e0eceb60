use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::broker::db::Database;

use super::config::{ProvisionConfig, ProvisionType};
use super::local::LocalProvisioner;
use super::Provisioner;

pub struct ProvisionFactory;

impl ProvisionFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_provisioner(
        &self,
        cfg: &ProvisionConfig,
        db: Arc<Database>,
    ) -> Result<Arc<dyn Provisioner>> {
        match cfg.name {
            ProvisionType::Local => {
                info!(
                    "Using local role bookkeeping for account {}, path '{}'",
                    cfg.account_id, cfg.role_path
                );
                let provisioner = LocalProvisioner::new(db, &cfg.account_id, &cfg.role_path);
                Ok(Arc::new(provisioner))
            }
        }
    }
}
