pub mod config;
pub mod context;
pub mod correlator;
pub mod error;
pub mod models;
pub mod monitor;
pub mod poll_loop;
pub mod report;
pub mod state_reader;
pub mod status_client;

#[cfg(test)]
mod testing;
