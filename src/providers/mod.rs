mod gerrit;
mod github;
pub mod rest;

pub use gerrit::{GerritProvider, DEFAULT_QUERY_SIZE};
pub use github::{GitHubGathered, GitHubProvider};
