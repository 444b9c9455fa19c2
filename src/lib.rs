pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod live;
pub mod models;
pub mod state;
pub mod store;
