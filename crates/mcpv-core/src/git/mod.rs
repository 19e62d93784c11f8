//! Git operations for fetching server source trees.
//!
//! - Cloning a repository and checking out a tag or branch
//! - Listing remote tags to find the newest release

mod fetcher;
mod spec;

pub use fetcher::{GitFetcher, LATEST, RepositoryFetcher, is_latest, pick_latest_tag};
pub use spec::GitSpec;
