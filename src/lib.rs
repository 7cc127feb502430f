pub mod aggregator;
pub mod args;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod plaid_api;
pub mod registry;
pub mod server;
pub mod snapshot_cache;
pub mod store;
pub mod sync;
pub mod terminal;

#[cfg(test)]
mod testutils;
