use std::sync::Arc;

use actix_web::web::Query;
use actix_web::HttpRequest;
use async_trait::async_trait;

use crate::broker::engine::{AccessRequest, AuthorizationEngine};
use crate::broker::identity::chain::ChainVerifier;
use crate::broker::response::Response;
use crate::types::credential::CredentialQuery;

use super::{verify_caller, Handler};

/// `GET /credentials`: the only path through which credentials leave the
/// broker.
pub struct CredentialsHandler {
    verifier: Arc<ChainVerifier>,
    engine: Arc<AuthorizationEngine>,
}

impl CredentialsHandler {
    pub fn new(verifier: Arc<ChainVerifier>, engine: Arc<AuthorizationEngine>) -> Self {
        Self { verifier, engine }
    }
}

#[async_trait(?Send)]
impl Handler for CredentialsHandler {
    async fn handle(&self, _path: &str, req: HttpRequest, _body: Option<Vec<u8>>) -> Response {
        if req.method().as_str() != "GET" {
            return Response::method_not_allowed();
        }

        let caller = match verify_caller(&self.verifier, &req) {
            Ok(caller) => caller,
            Err(resp) => return resp,
        };

        let query = match Query::<CredentialQuery>::from_query(req.query_string()) {
            Ok(query) => query.into_inner(),
            Err(e) => return Response::bad_request(format!("Invalid query: {e}")),
        };
        if query.service.is_empty() {
            return Response::bad_request("Service is required");
        }

        let access = AccessRequest {
            caller,
            service: query.service,
            resource: query.resource.filter(|r| !r.is_empty()),
            prefix: query.prefix.filter(|p| !p.is_empty()),
            duration_secs: query.duration,
        };
        match self.engine.authorize(&access).await {
            Ok(grant) => Response::json(grant.credentials),
            Err(err) => Response::broker_error(&err),
        }
    }
}
