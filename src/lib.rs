// Library exports for Agora
// Integration tests build the router and schema through these modules

pub mod auth;
pub mod components;
pub mod config;
pub mod data_sources;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graphql;
pub mod middleware;
pub mod routes;
pub mod state;
