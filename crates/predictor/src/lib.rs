//! Energy predictor server: configuration and HTTP API over `meter_lib`

pub mod api;
pub mod config;
