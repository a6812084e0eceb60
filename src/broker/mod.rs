pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod factory;
pub mod handlers;
pub mod identity;
pub mod issuer;
pub mod pattern;
pub mod policy;
pub mod provision;
pub mod registry;
pub mod response;
pub mod restful;
pub mod tier;
