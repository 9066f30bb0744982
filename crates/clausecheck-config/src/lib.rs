//! Configuration model, discovery, and validation for clausecheck

mod config;

pub use config::*;
