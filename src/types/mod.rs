pub mod credential;
pub mod healthz;
pub mod response;
pub mod service;
