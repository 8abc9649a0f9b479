pub mod bus;
pub mod config;
pub mod db;
pub mod effects;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod role;
pub mod routes;
pub mod state;
