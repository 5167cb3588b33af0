pub mod app;
pub mod artifacts;
pub mod auth;
pub mod config;
pub mod error;
pub mod html;
pub mod mal;
pub mod models;
pub mod rank;
pub mod scrape;
pub mod season;
