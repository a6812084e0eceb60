use std::collections::BTreeSet;
use std::sync::Arc;

use actix_web::web::Query;
use actix_web::HttpRequest;
use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::broker::identity::chain::ChainVerifier;
use crate::broker::registry::ServiceRegistry;
use crate::broker::response::{self, Response};
use crate::types::service::{NewService, PermissionTier, ServicePatch};

use super::{verify_caller, Handler};

/// Body of `PUT /api/services/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutServiceBody {
    pub bucket_patterns: Vec<String>,

    #[serde(default = "NewService::default_permission")]
    pub permission: PermissionTier,

    #[serde(default)]
    pub restricted_users: BTreeSet<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ForceQuery {
    #[serde(default)]
    force: bool,
}

/// Registry administration, open to administrators only.
pub struct ServicesHandler {
    verifier: Arc<ChainVerifier>,
    registry: Arc<ServiceRegistry>,
}

impl ServicesHandler {
    pub fn new(verifier: Arc<ChainVerifier>, registry: Arc<ServiceRegistry>) -> Self {
        Self { verifier, registry }
    }

    async fn handle_list(&self) -> Response {
        match self.registry.list().await {
            Ok(entries) => Response::json(entries),
            Err(err) => Response::broker_error(&err),
        }
    }

    fn handle_get(&self, name: &str) -> Response {
        match self.registry.get(name) {
            Ok(service) => Response::json(service),
            Err(err) => Response::broker_error(&err),
        }
    }

    async fn handle_put(&self, name: &str, force: bool, body: Option<Vec<u8>>) -> Response {
        let body: PutServiceBody = match parse_json(body) {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        let new = NewService {
            name: name.to_string(),
            bucket_patterns: body.bucket_patterns,
            permission: body.permission,
            restricted_users: body.restricted_users,
        };
        match self.registry.create(new, force).await {
            Ok(report) => Response::json(report),
            Err(err) => Response::broker_error(&err),
        }
    }

    async fn handle_patch(&self, name: &str, body: Option<Vec<u8>>) -> Response {
        let patch: ServicePatch = match parse_json(body) {
            Ok(patch) => patch,
            Err(resp) => return resp,
        };
        match self.registry.update(name, patch).await {
            Ok(report) => Response::json(report),
            Err(err) => Response::broker_error(&err),
        }
    }

    async fn handle_delete(&self, name: &str, force: bool) -> Response {
        match self.registry.delete(name, force).await {
            Ok(report) => Response::json(report),
            Err(err) => Response::broker_error(&err),
        }
    }
}

#[async_trait(?Send)]
impl Handler for ServicesHandler {
    async fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let caller = match verify_caller(&self.verifier, &req) {
            Ok(caller) => caller,
            Err(resp) => return resp,
        };
        if !self.registry.is_admin(caller.as_str()) {
            warn!("Reject registry request from non-admin user '{caller}'");
            return Response::unauthorized("registry is managed by administrators only");
        }

        let force = match Query::<ForceQuery>::from_query(req.query_string()) {
            Ok(query) => query.force,
            Err(e) => return Response::bad_request(format!("Invalid query: {e}")),
        };

        let method = req.method().as_str();
        if path.is_empty() {
            return match method {
                "GET" => self.handle_list().await,
                _ => Response::method_not_allowed(),
            };
        }

        match method {
            "GET" => self.handle_get(path),
            "PUT" => self.handle_put(path, force, body).await,
            "PATCH" => self.handle_patch(path, body).await,
            "DELETE" => self.handle_delete(path, force).await,
            _ => Response::method_not_allowed(),
        }
    }
}

fn parse_json<T: DeserializeOwned>(body: Option<Vec<u8>>) -> std::result::Result<T, Response> {
    let body = match body {
        Some(body) => body,
        None => return Err(Response::bad_request("Request body is required")),
    };
    serde_json::from_slice(&body)
        .map_err(|e| Response::bad_request(format!("{}: {e}", response::JSON_ERROR)))
}
