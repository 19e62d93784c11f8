//! Git fetcher for cloning server repositories at a requested version.

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{BranchType, Direction, Remote, Repository};
use tracing::debug;

use super::GitSpec;
use crate::error::FetchError;

/// Sentinel version meaning "whatever the default branch points at".
pub const LATEST: &str = "latest";

/// Retrieves source trees for installation.
pub trait RepositoryFetcher: Send + Sync {
    /// Clone `url` into `destination` and check out `reference`.
    ///
    /// An empty reference or [`LATEST`] keeps the default branch. Otherwise
    /// the reference is tried as a tag, then as a branch.
    fn fetch(&self, url: &str, reference: &str, destination: &Path) -> Result<(), FetchError>;

    /// Newest released version advertised by the repository.
    fn latest_version(&self, url: &str) -> Result<String, FetchError>;
}

/// Returns true when `reference` asks for the default branch.
pub fn is_latest(reference: &str) -> bool {
    reference.is_empty() || reference == LATEST
}

/// [`RepositoryFetcher`] backed by libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitFetcher;

impl GitFetcher {
    pub fn new() -> Self {
        Self
    }

    fn checkout_tag(repo: &Repository, tag: &str) -> Result<(), git2::Error> {
        let reference = repo.find_reference(&format!("refs/tags/{tag}"))?;
        let commit = reference.peel_to_commit()?;
        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
        repo.set_head_detached(commit.id())
    }

    fn checkout_branch(repo: &Repository, branch: &str) -> Result<(), git2::Error> {
        let remote_ref = repo.find_reference(&format!("refs/remotes/origin/{branch}"))?;
        let commit = remote_ref.peel_to_commit()?;
        let local = match repo.find_branch(branch, BranchType::Local) {
            Ok(existing) => existing,
            Err(_) => repo.branch(branch, &commit, false)?,
        };
        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
        let head = local
            .get()
            .name()
            .ok_or_else(|| git2::Error::from_str("branch name is not valid UTF-8"))?;
        repo.set_head(head)
    }

    /// Check if a directory exists and has entries.
    fn is_populated(path: &Path) -> bool {
        std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}

impl RepositoryFetcher for GitFetcher {
    fn fetch(&self, url: &str, reference: &str, destination: &Path) -> Result<(), FetchError> {
        if Self::is_populated(destination) {
            return Err(FetchError::DestinationNotEmpty(destination.to_path_buf()));
        }

        let spec = GitSpec::parse(url);
        debug!(url = %spec.repo_url, dest = %destination.display(), "cloning repository");
        let repo =
            Repository::clone(&spec.repo_url, destination).map_err(|source| FetchError::Clone {
                url: spec.repo_url.clone(),
                source,
            })?;

        if is_latest(reference) {
            return Ok(());
        }

        match Self::checkout_tag(&repo, reference) {
            Ok(()) => Ok(()),
            Err(tag_err) => {
                debug!(reference, error = %tag_err, "not a tag, trying branch");
                Self::checkout_branch(&repo, reference).map_err(|source| FetchError::Checkout {
                    reference: reference.to_string(),
                    source,
                })
            }
        }
    }

    fn latest_version(&self, url: &str) -> Result<String, FetchError> {
        let spec = GitSpec::parse(url);
        let remote_err = |source| FetchError::Remote {
            url: spec.repo_url.clone(),
            source,
        };

        let mut remote = Remote::create_detached(spec.repo_url.as_str()).map_err(remote_err)?;
        remote.connect(Direction::Fetch).map_err(remote_err)?;
        let tags: Vec<String> = remote
            .list()
            .map_err(remote_err)?
            .iter()
            .filter_map(|head| head.name().strip_prefix("refs/tags/"))
            .map(|name| name.trim_end_matches("^{}").to_string())
            .collect();
        remote.disconnect().map_err(remote_err)?;

        Ok(pick_latest_tag(tags.iter().map(String::as_str)).unwrap_or_else(|| LATEST.to_string()))
    }
}

/// Pick the highest semver tag, accepting an optional leading `v`.
pub fn pick_latest_tag<'a>(tags: impl IntoIterator<Item = &'a str>) -> Option<String> {
    tags.into_iter()
        .filter_map(|tag| {
            let bare = tag.strip_prefix('v').unwrap_or(tag);
            semver::Version::parse(bare).ok().map(|v| (v, tag))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, tag)| tag.to_string())
}
