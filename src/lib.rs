pub mod broker;
pub mod client;
pub mod config;
pub mod display;
pub mod logs;
pub mod table;
pub mod time;
pub mod types;
