//! sqlgrade - Grades student SQL queries by majority consensus.
//!
//! This library exposes the core modules for use by the binary and by
//! integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod feedback;
pub mod grading;
pub mod logging;
pub mod query;
pub mod safety;
