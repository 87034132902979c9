//! Subcommand implementations

pub mod config;
pub mod crawl;
pub mod doctor;
pub mod synth;
