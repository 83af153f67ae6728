mod client;
mod provider;
mod types;

pub use provider::{GerritProvider, DEFAULT_QUERY_SIZE};
