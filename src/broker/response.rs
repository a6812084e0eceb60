use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::{de::DeserializeOwned, Serialize};

use crate::types::response::{CommonResponse, ResourceResponse};

use super::error::BrokerError;

pub const AUTHN_ERROR: &str = "Identity verification failed";
pub const JSON_ERROR: &str = "Encode or decode JSON failed";

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, None, message)
    }

    pub fn unauthenticated(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthenticated: {}", message.as_ref());
        Self::err_response(StatusCode::UNAUTHORIZED, Some("unauthenticated"), message)
    }

    pub fn unauthorized(message: &str) -> Self {
        let message = format!("Unauthorized: {message}");
        Self::err_response(StatusCode::FORBIDDEN, Some("access_denied"), message)
    }

    pub fn method_not_allowed() -> Self {
        Self::err_response(
            StatusCode::METHOD_NOT_ALLOWED,
            None,
            "Method not allowed".to_string(),
        )
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, None, message)
    }

    /// Maps a rejection onto its status code, keeping the kind tag so that
    /// clients can tell the reasons apart.
    pub fn broker_error(err: &BrokerError) -> Self {
        let status = match err {
            BrokerError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            BrokerError::DuplicateService(_) => StatusCode::CONFLICT,
            BrokerError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            BrokerError::ResourceNotAuthorized { .. } => StatusCode::FORBIDDEN,
            BrokerError::ConfigurationError(_) => StatusCode::BAD_REQUEST,
            BrokerError::IssuanceFailed(_) => StatusCode::BAD_GATEWAY,
            BrokerError::ProvisioningFailed(_) => StatusCode::BAD_GATEWAY,
            BrokerError::RegistryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::err_response(status, Some(err.kind()), err.to_string())
    }

    pub fn json<T: Serialize + DeserializeOwned>(data: T) -> Self {
        Self::resource_response(data)
    }

    fn resource_response<T: Serialize + DeserializeOwned>(rsc: T) -> Self {
        let resp = ResourceResponse::<T> {
            code: StatusCode::OK.into(),
            kind: None,
            message: None,
            data: Some(rsc),
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    fn err_response(status: StatusCode, kind: Option<&str>, message: String) -> Self {
        let resp = CommonResponse {
            code: status.into(),
            kind: kind.map(String::from),
            message: Some(message),
        };
        Self {
            http_response: HttpResponseBuilder::new(status).json(resp),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
