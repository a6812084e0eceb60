mod validate;


use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::{task, time};

use crate::time::current_timestamp;
use crate::types::service::{
    NewService, PermissionTier, ServiceDefinition, ServiceEntry, ServicePatch, ServiceStatus,
};

use super::db::{CommitGate, Database, Transaction};
use super::error::{BrokerError, BrokerResult};
use super::pattern::normalize_patterns;
use super::provision::Provisioner;

pub use validate::{normalize_users, validate_name};

type Snapshot = Arc<BTreeMap<String, ServiceDefinition>>;

/// The distinguished service granting full access to administrators only.
#[derive(Debug, Clone)]
pub struct AdminService {
    pub name: String,
    pub users: BTreeSet<String>,
}

impl AdminService {
    fn definition(&self, role: String, now: u64) -> ServiceDefinition {
        ServiceDefinition {
            name: self.name.clone(),
            bucket_patterns: vec![String::from("*")],
            permission: PermissionTier::Admin,
            restricted_users: self.users.clone(),
            role,
            create_time: now,
            update_time: now,
        }
    }
}

/// Result of a create or update. The registry change is committed even when
/// provisioning failed; the failure is carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationReport {
    pub service: ServiceDefinition,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteReport {
    pub name: String,

    /// Whether a registry entry was removed. Only a forced delete of an
    /// absent service reports `false`.
    pub removed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_error: Option<String>,
}

/// Durable mapping from service name to definition.
///
/// Readers work on an immutable snapshot and never wait on writers. Writers
/// are serialized by one async lock, commit to the database, and only then
/// publish a fresh snapshot read back from the same transaction.
///
/// Commits made through another connection to the same store (the admin
/// CLI editing the file of a running broker) are picked up by the next read.
pub struct ServiceRegistry {
    db: Arc<Database>,
    provisioner: Arc<dyn Provisioner>,
    admin: AdminService,
    timeout: Duration,

    snapshot: RwLock<Snapshot>,
    write_lock: Mutex<()>,

    /// Store change counter the snapshot was read at.
    seen_version: AtomicI64,
}

impl ServiceRegistry {
    /// Loads every service and makes sure the admin service exists and is
    /// restricted to exactly the configured administrators.
    pub async fn open(
        db: Arc<Database>,
        provisioner: Arc<dyn Provisioner>,
        admin: AdminService,
        timeout: Duration,
    ) -> BrokerResult<Self> {
        validate_name(&admin.name)?;
        let users = normalize_users(&admin.users)?;
        if users.is_empty() {
            return Err(BrokerError::config("at least one administrator is required"));
        }
        let admin = AdminService {
            name: admin.name,
            users,
        };

        let registry = Self {
            db,
            provisioner,
            admin,
            timeout,
            snapshot: RwLock::new(Arc::new(BTreeMap::new())),
            write_lock: Mutex::new(()),
            seen_version: AtomicI64::new(-1),
        };
        registry.init().await?;
        Ok(registry)
    }

    async fn init(&self) -> BrokerResult<()> {
        let _guard = self.write_lock.lock().await;

        let admin = self
            .admin
            .definition(self.provisioner.role_reference(&self.admin.name), current_timestamp());
        let (services, created) = self
            .persist("load registry", move |tx| {
                if !tx.is_service_exists(&admin.name)? {
                    tx.create_service(&admin)?;
                    return Ok((tx.list_services()?, true));
                }
                let mut current = tx.get_service(&admin.name)?;
                if current.restricted_users != admin.restricted_users {
                    current.restricted_users = admin.restricted_users;
                    current.update_time = admin.update_time;
                    tx.update_service(&current)?;
                }
                Ok((tx.list_services()?, false))
            })
            .await?;
        if created {
            info!("Created admin service '{}'", self.admin.name);
        }
        info!("Loaded {} service(s) from registry", services.len());
        self.publish(services)?;
        self.mark_seen();

        let exists = self
            .provision(self.provisioner.role_exists(&self.admin.name))
            .await;
        if !matches!(exists, Ok(true)) {
            let admin = self.get(&self.admin.name)?;
            if let Err(err) = self.provision(self.provisioner.create_role(&admin)).await {
                warn!("Provision role for admin service failed: {err:#}");
            }
        }
        Ok(())
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.admin.users.contains(user)
    }

    pub fn get(&self, name: &str) -> BrokerResult<ServiceDefinition> {
        let snapshot = self.load()?;
        match snapshot.get(name) {
            Some(service) => Ok(service.clone()),
            None => Err(BrokerError::ServiceNotFound(name.to_string())),
        }
    }

    /// Registers a service. With `force`, an existing definition is replaced
    /// as a whole.
    pub async fn create(&self, new: NewService, force: bool) -> BrokerResult<MutationReport> {
        validate_name(&new.name)?;
        let bucket_patterns = normalize_patterns(&new.bucket_patterns)?;
        let restricted_users = normalize_users(&new.restricted_users)?;

        let _guard = self.write_lock.lock().await;

        let now = current_timestamp();
        let service = ServiceDefinition {
            role: self.provisioner.role_reference(&new.name),
            name: new.name,
            bucket_patterns,
            permission: new.permission,
            restricted_users,
            create_time: now,
            update_time: now,
        };

        let admin_name = self.admin.name.clone();
        let record = service.clone();
        let services = self
            .persist("create service", move |tx| {
                let exists = tx.is_service_exists(&record.name)?;
                if exists && !force {
                    bail!(BrokerError::DuplicateService(record.name));
                }
                if record.name == admin_name {
                    bail!(BrokerError::config(format!(
                        "service '{admin_name}' is managed by the broker and cannot be replaced"
                    )));
                }
                if exists {
                    tx.update_service(&record)?;
                } else {
                    tx.create_service(&record)?;
                }
                tx.list_services()
            })
            .await?;
        self.publish(services)?;
        info!(
            "Registered service '{}' ({}, {} pattern(s))",
            service.name,
            service.permission,
            service.bucket_patterns.len()
        );

        let provisioning_error = self
            .report(self.provision(self.provisioner.create_role(&service)))
            .await;
        Ok(MutationReport {
            service,
            provisioning_error,
        })
    }

    /// Patches the supplied fields of a service and leaves the rest untouched.
    pub async fn update(&self, name: &str, patch: ServicePatch) -> BrokerResult<MutationReport> {
        if patch.is_empty() {
            return Err(BrokerError::config("nothing to update"));
        }
        if name == self.admin.name && patch.restricted_users.is_some() {
            return Err(BrokerError::config(format!(
                "restricted users of service '{name}' are fixed to the configured administrators"
            )));
        }
        let bucket_patterns = match patch.bucket_patterns {
            Some(ref patterns) => Some(normalize_patterns(patterns)?),
            None => None,
        };
        let restricted_users = match patch.restricted_users {
            Some(ref users) => Some(normalize_users(users)?),
            None => None,
        };
        let refresh_role = bucket_patterns.is_some() || patch.permission.is_some();

        let _guard = self.write_lock.lock().await;

        let now = current_timestamp();
        let target = name.to_string();
        let permission = patch.permission;
        let (service, services) = self
            .persist("update service", move |tx| {
                if !tx.is_service_exists(&target)? {
                    bail!(BrokerError::ServiceNotFound(target));
                }
                let mut service = tx.get_service(&target)?;
                if let Some(patterns) = bucket_patterns {
                    service.bucket_patterns = patterns;
                }
                if let Some(permission) = permission {
                    service.permission = permission;
                }
                if let Some(users) = restricted_users {
                    service.restricted_users = users;
                }
                service.update_time = now;
                tx.update_service(&service)?;
                Ok((service, tx.list_services()?))
            })
            .await?;
        self.publish(services)?;
        info!("Updated service '{name}'");

        let provisioning_error = if refresh_role {
            self.report(self.provision(self.provisioner.create_role(&service)))
                .await
        } else {
            None
        };
        Ok(MutationReport {
            service,
            provisioning_error,
        })
    }

    /// Removes a service and retires its role.
    ///
    /// Without `force` the role goes first and a failure leaves the registry
    /// untouched. With `force` the registry entry goes first, an absent entry
    /// is tolerated, and role cleanup failure is only reported.
    pub async fn delete(&self, name: &str, force: bool) -> BrokerResult<DeleteReport> {
        if name == self.admin.name {
            return Err(BrokerError::config(format!(
                "service '{name}' is managed by the broker and cannot be deleted"
            )));
        }

        let _guard = self.write_lock.lock().await;

        if !force {
            let target = name.to_string();
            self.persist("check service", move |tx| {
                if !tx.is_service_exists(&target)? {
                    bail!(BrokerError::ServiceNotFound(target));
                }
                Ok(())
            })
            .await?;

            self.provision(self.provisioner.delete_role(name))
                .await
                .map_err(|err| {
                    BrokerError::provisioning(err.context(format!("retire role of '{name}'")))
                })?;

            let services = self.remove(name).await?.1;
            self.publish(services)?;
            info!("Deleted service '{name}'");
            return Ok(DeleteReport {
                name: name.to_string(),
                removed: true,
                provisioning_error: None,
            });
        }

        let (removed, services) = self.remove(name).await?;
        self.publish(services)?;
        if removed {
            info!("Deleted service '{name}' (forced)");
        } else {
            info!("Service '{name}' not in registry, cleaning up its role only");
        }

        let provisioning_error = self
            .report(self.provision(self.provisioner.delete_role(name)))
            .await;
        Ok(DeleteReport {
            name: name.to_string(),
            removed,
            provisioning_error,
        })
    }

    /// Every service with its status, plus roles that lost their registry
    /// entry, ordered by name.
    pub async fn list(&self) -> BrokerResult<Vec<ServiceEntry>> {
        let snapshot = self.load()?;
        let roles: BTreeSet<String> = self
            .provision(self.provisioner.list_roles())
            .await
            .map_err(|err| BrokerError::provisioning(err.context("list roles")))?
            .into_iter()
            .collect();

        let mut entries: BTreeMap<String, ServiceEntry> = snapshot
            .values()
            .map(|service| {
                let entry = ServiceEntry {
                    name: service.name.clone(),
                    status: ServiceStatus::from_presence(true, roles.contains(&service.name)),
                    definition: Some(service.clone()),
                };
                (service.name.clone(), entry)
            })
            .collect();
        for role in roles {
            entries.entry(role.clone()).or_insert(ServiceEntry {
                name: role,
                status: ServiceStatus::MissingConfig,
                definition: None,
            });
        }

        Ok(entries.into_values().collect())
    }

    /// Status of any name, registered or not.
    pub async fn status(&self, name: &str) -> BrokerResult<ServiceStatus> {
        let config = self.load()?.contains_key(name);
        let role = self
            .provision(self.provisioner.role_exists(name))
            .await
            .map_err(|err| BrokerError::provisioning(err.context("check role")))?;
        Ok(ServiceStatus::from_presence(config, role))
    }

    /// Re-reads the registry from the database.
    pub async fn reload(&self) -> BrokerResult<()> {
        let _guard = self.write_lock.lock().await;
        let services = self.persist("reload registry", |tx| tx.list_services()).await?;
        self.publish(services)?;
        self.mark_seen();
        Ok(())
    }

    /// Waits for in-flight writes and closes the database. The snapshot
    /// stays readable; every later write fails with `RegistryUnavailable`.
    pub async fn close(&self) -> BrokerResult<()> {
        let _guard = self.write_lock.lock().await;
        self.db.close().map_err(BrokerError::registry)?;
        info!("Registry closed");
        Ok(())
    }

    async fn remove(&self, name: &str) -> BrokerResult<(bool, Vec<ServiceDefinition>)> {
        let target = name.to_string();
        self.persist("delete service", move |tx| {
            let exists = tx.is_service_exists(&target)?;
            if exists {
                tx.delete_service(&target)?;
            }
            Ok((exists, tx.list_services()?))
        })
        .await
    }

    /// Runs `f` in one transaction on the blocking pool, bounded by the
    /// registry timeout. A [`BrokerError`] raised inside `f` comes back as
    /// is, anything else becomes `RegistryUnavailable`.
    async fn persist<T, F>(&self, op: &'static str, f: F) -> BrokerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Transaction) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let gate = Arc::new(CommitGate::new());
        let task_gate = Arc::clone(&gate);
        let mut handle =
            task::spawn_blocking(move || db.with_gated_transaction(&task_gate, f));
        let joined = match time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => joined,
            // The transaction rolls back instead of committing once the
            // gate is cancelled. A commit already under way is awaited.
            Err(_) if gate.cancel() => {
                warn!("Registry {op} timed out after {:?}, rolled back", self.timeout);
                return Err(BrokerError::RegistryUnavailable(format!(
                    "{op}: timed out after {:?}",
                    self.timeout
                )));
            }
            Err(_) => handle.await,
        };
        let result = match joined {
            Ok(result) => result,
            Err(err) => Err(anyhow!("join persistence task: {err}")),
        };
        match result {
            Ok(value) => Ok(value),
            Err(err) => match err.downcast::<BrokerError>() {
                Ok(err) => Err(err),
                Err(err) => Err(BrokerError::registry(err.context(op))),
            },
        }
    }

    async fn provision<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => bail!("timed out after {:?}", self.timeout),
        }
    }

    async fn report(&self, fut: impl Future<Output = Result<()>>) -> Option<String> {
        match fut.await {
            Ok(()) => None,
            Err(err) => {
                warn!("Provisioning failed, registry change kept: {err:#}");
                Some(format!("{err:#}"))
            }
        }
    }

    fn load(&self) -> BrokerResult<Snapshot> {
        self.sync_with_store();
        match self.snapshot.read() {
            Ok(snapshot) => Ok(Arc::clone(&snapshot)),
            Err(_) => Err(BrokerError::RegistryUnavailable(String::from(
                "registry snapshot lock poisoned",
            ))),
        }
    }

    /// Re-reads the registry when another connection committed to the store
    /// since the snapshot was taken. Skipped while a local write is in flight
    /// or the store is busy; a failed re-read keeps the last snapshot.
    fn sync_with_store(&self) {
        let version = match self.db.data_version() {
            Ok(Some(version)) => version,
            Ok(None) => return,
            Err(err) => {
                debug!("Read registry store version failed: {err:#}");
                return;
            }
        };
        if version == self.seen_version.load(Ordering::Acquire) {
            return;
        }
        let Ok(_guard) = self.write_lock.try_lock() else {
            return;
        };
        match self.db.with_transaction(|tx| tx.list_services()) {
            Ok(services) => {
                let count = services.len();
                if self.publish(services).is_ok() {
                    self.seen_version.store(version, Ordering::Release);
                    info!("Registry changed in store, reloaded {count} service(s)");
                }
            }
            Err(err) => warn!("Reload changed registry failed, keep last snapshot: {err:#}"),
        }
    }

    fn mark_seen(&self) {
        if let Ok(Some(version)) = self.db.data_version() {
            self.seen_version.store(version, Ordering::Release);
        }
    }

    fn publish(&self, services: Vec<ServiceDefinition>) -> BrokerResult<()> {
        let snapshot: BTreeMap<String, ServiceDefinition> = services
            .into_iter()
            .map(|service| (service.name.clone(), service))
            .collect();
        debug!("Publish registry snapshot with {} service(s)", snapshot.len());
        match self.snapshot.write() {
            Ok(mut current) => {
                *current = Arc::new(snapshot);
                Ok(())
            }
            Err(_) => Err(BrokerError::RegistryUnavailable(String::from(
                "registry snapshot lock poisoned",
            ))),
        }
    }
}
