//! Use Cases Layer - Application Logic
//!
//! Orchestrates the domain with the port interfaces. The single use
//! case here is the `OracleService`: the in-memory authority that
//! generates synthetic price updates and answers snapshot queries.

pub mod oracle_service;

pub use oracle_service::OracleService;
