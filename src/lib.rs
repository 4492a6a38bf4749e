pub mod api_types;
pub mod audit;
pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
