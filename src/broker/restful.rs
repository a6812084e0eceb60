use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes, Data, ServiceConfig};
use actix_web::{HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use crate::types::response::CommonResponse;

use super::handlers::credentials::CredentialsHandler;
use super::handlers::healthz::HealthzHandler;
use super::handlers::services::ServicesHandler;
use super::handlers::Handler;
use super::registry::ServiceRegistry;

pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    ctx: Arc<RestfulContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,
}

pub struct RestfulContext {
    pub healthz_handler: HealthzHandler,
    pub credentials_handler: CredentialsHandler,
    pub services_handler: ServicesHandler,

    pub registry: Arc<ServiceRegistry>,
}

impl RestfulServer {
    const HEALTHZ_PATH: &str = "/healthz";
    const CREDENTIALS_PATH: &str = "/credentials";
    const SERVICES_PATH: &str = "/api/services";
    const SERVICE_PATH: &str = "/api/services/{name}";

    pub fn new(bind: String, ssl: Option<SslAcceptorBuilder>, ctx: Arc<RestfulContext>) -> Self {
        Self {
            ssl,
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
        }
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    /// Registers every route of the broker on an app.
    pub fn configure(ctx: Arc<RestfulContext>) -> impl FnOnce(&mut ServiceConfig) {
        move |cfg: &mut ServiceConfig| {
            cfg.app_data(Data::new(ctx))
                .service(
                    web::resource(Self::HEALTHZ_PATH).route(web::get().to(Self::handle_healthz)),
                )
                .service(
                    web::resource(Self::CREDENTIALS_PATH)
                        .route(web::route().to(Self::handle_credentials)),
                )
                .service(
                    web::resource(Self::SERVICES_PATH)
                        .route(web::route().to(Self::handle_services)),
                )
                .service(
                    web::resource(Self::SERVICE_PATH).route(web::route().to(Self::handle_services)),
                )
                .default_service(web::route().to(Self::default_handler));
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let mut srv = HttpServer::new(move || {
            actix_web::App::new().configure(Self::configure(ctx.clone()))
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). Session cookies and credentials travel in plain text");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        let result = srv.run().await.context("run server");
        info!("Server stopped");

        self.shutdown().await?;
        result
    }

    /// Lets in-flight registry writes finish and closes the store.
    pub async fn shutdown(&self) -> Result<()> {
        self.ctx.registry.close().await.context("close registry")?;
        Ok(())
    }

    async fn handle_healthz(
        req: HttpRequest,
        body: Option<Bytes>,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        let body = Self::parse_body(body);

        ctx.healthz_handler.handle("", req, body).await.into()
    }

    async fn handle_credentials(
        req: HttpRequest,
        body: Option<Bytes>,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        let body = Self::parse_body(body);

        ctx.credentials_handler.handle("", req, body).await.into()
    }

    async fn handle_services(
        req: HttpRequest,
        body: Option<Bytes>,
        ctx: Data<Arc<RestfulContext>>,
    ) -> HttpResponse {
        // Empty for the collection route.
        let name = req.match_info().get("name").unwrap_or_default().to_string();
        let body = Self::parse_body(body);

        ctx.services_handler.handle(&name, req, body).await.into()
    }

    async fn default_handler(req: HttpRequest) -> HttpResponse {
        let path = req.uri().path().to_string();
        let method = req.method().as_str().to_string();
        let message = format!("No route to {method} {path}");
        let ret = CommonResponse {
            code: StatusCode::NOT_FOUND.into(),
            kind: None,
            message: Some(message),
        };
        HttpResponse::NotFound().json(ret)
    }

    fn parse_body(body: Option<Bytes>) -> Option<Vec<u8>> {
        body.filter(|b| !b.is_empty()).map(|b| b.to_vec())
    }
}
