use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};

use super::config::BrokerConfig;
use super::db::factory::DbFactory;
use super::db::Database;
use super::engine::AuthorizationEngine;
use super::handlers::credentials::CredentialsHandler;
use super::handlers::healthz::HealthzHandler;
use super::handlers::services::ServicesHandler;
use super::identity::factory::IdentityFactory;
use super::issuer::factory::IssuerFactory;
use super::provision::factory::ProvisionFactory;
use super::registry::ServiceRegistry;
use super::restful::{RestfulContext, RestfulServer};

/// Wires the broker together from its configuration.
pub struct BrokerFactory {
    db: Arc<Database>,
    cfg: BrokerConfig,
}

impl BrokerFactory {
    pub fn new(cfg: BrokerConfig) -> Result<Self> {
        let db_factory = DbFactory::new();
        let db = db_factory.build_db(&cfg.db).context("init database")?;
        Ok(Self { cfg, db })
    }

    /// Opens the registry. Admin commands use it directly without starting
    /// the server.
    pub async fn build_registry(&self) -> Result<Arc<ServiceRegistry>> {
        let provision_factory = ProvisionFactory::new();
        let provisioner = provision_factory
            .build_provisioner(&self.cfg.provision, self.db.clone())
            .context("init provisioner")?;

        let registry = ServiceRegistry::open(
            self.db.clone(),
            provisioner,
            self.cfg.admin.admin_service(),
            self.cfg.registry.timeout(),
        )
        .await
        .context("open registry")?;
        Ok(Arc::new(registry))
    }

    pub async fn build_engine(
        &self,
        registry: Arc<ServiceRegistry>,
    ) -> Result<Arc<AuthorizationEngine>> {
        let issuer_factory = IssuerFactory::new();
        let issuer = issuer_factory
            .build_issuer(&self.cfg.issuer)
            .await
            .context("init credential issuer")?;

        let engine = AuthorizationEngine::new(
            registry,
            issuer,
            self.cfg.issuer.lifetime(),
            Duration::from_secs(self.cfg.issuer.timeout_secs),
            &self.cfg.issuer.session_prefix,
        );
        Ok(Arc::new(engine))
    }

    pub async fn build_server(&self) -> Result<RestfulServer> {
        let ssl = self.build_ssl()?;
        let ctx = self.build_context().await?;

        let mut srv = RestfulServer::new(self.cfg.bind.clone(), ssl, ctx);
        if self.cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(self.cfg.keep_alive_secs);
        }
        if self.cfg.workers > 0 {
            srv.set_workers(self.cfg.workers);
        }

        Ok(srv)
    }

    pub fn build_ssl(&self) -> Result<Option<SslAcceptorBuilder>> {
        if !self.cfg.ssl {
            return Ok(None);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&self.cfg.key_path, SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&self.cfg.cert_path)
            .context("load ssl cert file")?;

        Ok(Some(builder))
    }

    pub async fn build_context(&self) -> Result<Arc<RestfulContext>> {
        let identity_factory = IdentityFactory::new();
        let verifier = identity_factory
            .build_verifier(&self.cfg.identity)
            .context("init identity verifier")?;
        let verifier = Arc::new(verifier);

        let registry = self.build_registry().await?;
        let engine = self.build_engine(registry.clone()).await?;

        let ctx = RestfulContext {
            healthz_handler: HealthzHandler::new(),
            credentials_handler: CredentialsHandler::new(verifier.clone(), engine),
            services_handler: ServicesHandler::new(verifier, registry.clone()),
            registry,
        };
        Ok(Arc::new(ctx))
    }
}
