pub mod atomic_write;
pub mod canonicalization;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod types;
