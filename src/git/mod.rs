//! The repository capability used by promotions and its git2 implementation.

pub mod cache;
pub mod repository;
pub mod transport;

use std::path::Path;

use thiserror::Error;

use crate::model::Author;

pub use cache::{CacheKey, GitCloner, Lease, RepoFactory, RepositoryCache};
pub use repository::GitRepository;
pub use transport::Transport;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Branch {branch} already exists.")]
    BranchExists { branch: String },
    #[error("Branch {branch} was not found.")]
    BranchNotFound { branch: String },
    #[error("Repository at {path} has no working tree")]
    Bare { path: String },
    #[error("Push of {reference} was rejected: {message}")]
    PushRejected { reference: String, message: String },
    #[error("{path} resolves outside the working copy")]
    Escapes { path: String },
    #[error("{path} is not a regular file")]
    NotAFile { path: String },
    #[error("Repository at {path} is not cached")]
    NotCached { path: String },
    #[error("Cache location {location} is not a directory")]
    BadLocation { location: String },
    #[error("Cache lock cannot be acquired: {0}")]
    Lock(#[from] crate::flock::Error),
}

/// Callback invoked once per file by [`Source::walk`] with the directory the
/// walk started from and the file path relative to it.
pub type Visit<'a> = dyn FnMut(&Path, &str) -> Result<(), RepoError> + 'a;

/// A tree that files can be promoted from.
pub trait Source {
    /// Visits every file below the repository-rooted `root`.
    ///
    /// `prefix` is the local directory containing `root`, `name` the file's
    /// path relative to `prefix`, so `name` starts with the last component of
    /// `root`. Order is deterministic for a given tree. The walk stops at the
    /// first error returned by `visit`. A missing `root` visits nothing.
    fn walk(&self, root: &str, visit: &mut Visit<'_>) -> Result<(), RepoError>;
}

/// A tree that files can be promoted into.
pub trait Destination {
    /// Copies the local file `from` to the repository-rooted path `to`.
    fn copy_file(&self, from: &Path, to: &str) -> Result<(), RepoError>;
}

/// A locally materialised working copy of a remote repository.
pub trait Repo: Source + Destination {
    fn local_path(&self) -> &Path;

    /// Names of the directories directly below the repository-rooted `path`.
    fn directories(&self, path: &str) -> Result<Vec<String>, RepoError>;

    /// Creates `name` from the tip of `base` and checks it out.
    fn create_branch(&self, base: &str, name: &str) -> Result<(), RepoError>;

    /// Stages `paths` and commits them onto the current branch.
    fn commit(&self, paths: &[String], author: &Author, message: &str) -> Result<(), RepoError>;

    fn push(&self, branch: &str) -> Result<(), RepoError>;

    /// Deletes the local working copy.
    fn remove(&self) -> Result<(), RepoError>;
}

/// Hands out repositories by URL and branch and takes them back.
pub trait RepoOpener {
    type Repo: Repo;

    /// Leases the working copy for `url` at `branch`. While the lease is
    /// alive, other opens of the same working copy wait for it to be dropped
    /// or evicted.
    fn open(&self, url: &str, branch: &str, shallow: bool) -> Result<Lease<Self::Repo>, RepoError>;

    /// Removes the leased working copy from local storage and releases the
    /// lease. A failed removal keeps the copy cached.
    fn evict(&self, lease: Lease<Self::Repo>) -> Result<(), RepoError>;
}

impl<T: RepoOpener + ?Sized> RepoOpener for &T {
    type Repo = T::Repo;

    fn open(&self, url: &str, branch: &str, shallow: bool) -> Result<Lease<Self::Repo>, RepoError> {
        (**self).open(url, branch, shallow)
    }

    fn evict(&self, lease: Lease<Self::Repo>) -> Result<(), RepoError> {
        (**self).evict(lease)
    }
}
