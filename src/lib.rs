pub mod api;
pub mod config;
pub mod data;
pub mod forecast;
pub mod ml;
pub mod state;
pub mod telemetry;
