// Public API - data types, extraction and export functions
pub mod config;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod lookup;
pub mod state;

// Internal implementation - not part of public API
pub(crate) mod cli;
