// Common library for shared code across the scheduler and API

pub mod config;
pub mod db;
pub mod detector;
pub mod differ;
pub mod errors;
pub mod evaluator;
pub mod intervals;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod throttle;
pub mod upstream;
