// ABOUTME: Library exports for the Jira CLI query and bulk-operation engine
// ABOUTME: Makes internal modules available to the binary, integration tests and benchmarks

pub mod aliases;
pub mod bulk;
pub mod cli;
pub mod cli_output;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod fields;
pub mod output;
pub mod query;
pub mod search;
pub mod templates;
pub mod types;
pub mod velocity;

#[cfg(test)]
mod test_support;
