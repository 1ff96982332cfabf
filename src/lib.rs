pub mod broker;
pub mod cli;
pub mod config;
pub mod costing;
pub mod data_paths;
pub mod desk;
pub mod errors;
pub mod ledger;
pub mod logging;
pub mod portfolio;
pub mod trade;
