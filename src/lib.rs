//! CastLab service library.
//!
//! A crowdfunding marketplace for replication experiments: an HTTP API
//! serving a listing catalog plus on-chain funding flows (approve/deposit
//! sequencing, withdrawals, parimutuel bets, claims) against a 6-decimal
//! stablecoin and a funding contract.

pub mod blockchain;
pub mod config;
pub mod funding;
pub mod http;
pub mod lifecycle;
pub mod marketplace;
pub mod observability;

pub use config::schema::CastLabConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
