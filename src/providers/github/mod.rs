mod client;
mod provider;
mod types;

#[cfg(test)]
mod tests;

pub use provider::{GitHubGathered, GitHubProvider};
