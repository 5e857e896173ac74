use std::fmt::Display;

use chrono::{DateTime, Utc};
use log::{info, warn};
use regex_lite::Regex;
use thiserror::Error;

use crate::{
    copy::{copy_service, CopyError},
    credentials::{CredentialError, CredentialInjector},
    git::{Lease, Repo, RepoError, RepoOpener},
    model::{redact_url, Author, EnvLocation},
};

pub const DEFAULT_COMMIT_MESSAGE: &str = "Promote service configuration";

const ENVIRONMENTS_ROOT: &str = "/environments";

#[derive(Error, Debug)]
pub enum PromoteError {
    #[error("Failed to add credentials to {url}: {source}")]
    Credential {
        url: String,
        #[source]
        source: CredentialError,
    },
    #[error("Failed to open repository {location}: {source}")]
    RepoOpen {
        location: String,
        #[source]
        source: RepoError,
    },
    #[error("Failed to determine the environment of {location}: {source}")]
    Environment {
        location: String,
        #[source]
        source: EnvironmentError,
    },
    #[error("Failed to create branch {branch}: {source}")]
    BranchCreate {
        branch: String,
        #[source]
        source: RepoError,
    },
    #[error("Failed to copy configuration of {service}: {source}")]
    Copy {
        service: String,
        #[source]
        source: CopyError,
    },
    #[error("Failed to commit to branch {branch}: {source}")]
    Commit {
        branch: String,
        #[source]
        source: RepoError,
    },
    #[error("Failed to push branch {branch}: {source}")]
    Push {
        branch: String,
        #[source]
        source: RepoError,
    },
}

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("no environment found under /environments")]
    NotFound,
    #[error("more than one environment found under /environments: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A repository that could not be removed from the cache.
#[derive(Debug)]
pub struct EvictionFailure {
    pub location: String,
    pub source: RepoError,
}

impl Display for EvictionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.source)
    }
}

#[derive(Error, Debug)]
#[error("Failed to evict repositories from the cache: {}", describe(.failures))]
pub struct CacheEvictionError {
    pub failures: Vec<EvictionFailure>,
}

fn describe(failures: &[EvictionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// What happened to the cached repositories after a successful promotion.
#[derive(Debug)]
pub enum CleanupOutcome {
    /// Eviction was not requested.
    Retained,
    Evicted,
    Failed(CacheEvictionError),
}

#[derive(Debug)]
pub struct PromotionOutcome {
    pub branch: String,
    /// Destination paths in the order they were copied.
    pub copied: Vec<String>,
    pub cleanup: CleanupOutcome,
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Runs promotions of service configuration between environment repositories.
pub struct Promoter<O, C> {
    opener: O,
    credentials: C,
    author: Author,
    shallow: bool,
    clock: Box<dyn Clock + Send + Sync>,
}

impl<O, C> Promoter<O, C>
where
    O: RepoOpener,
    C: CredentialInjector,
{
    pub fn new(opener: O, credentials: C, author: Author) -> Promoter<O, C> {
        Promoter {
            opener,
            credentials,
            author,
            shallow: false,
            clock: Box::new(SystemClock),
        }
    }

    /// Clone source repositories with a depth of one.
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Promotes `service_name` from `from` onto a new branch of `to`.
    ///
    /// An empty `new_branch_name` is generated from the service name and the
    /// current time, an empty `commit_msg` becomes [`DEFAULT_COMMIT_MESSAGE`].
    /// Both working copies stay leased until the promotion ends, so another
    /// run on the same repository and branch waits for this one. Unless
    /// `keep_cache` is set both are evicted after a successful push; a failed
    /// promotion leaves them cached.
    pub fn promote(
        &self,
        service_name: &str,
        from: &EnvLocation,
        to: &EnvLocation,
        new_branch_name: &str,
        commit_msg: &str,
        keep_cache: bool,
    ) -> Result<PromotionOutcome, PromoteError> {
        let from_url = self.add_credentials(&from.repo_path)?;
        let to_url = self.add_credentials(&to.repo_path)?;

        let source = self.open(&from_url, from, self.shallow)?;
        // A second lease on the same working copy would wait for the first.
        let destination = if from_url == to_url && from.branch == to.branch && !self.shallow {
            None
        } else {
            Some(self.open(&to_url, to, false)?)
        };
        let destination_repo: &O::Repo = destination.as_deref().unwrap_or(&*source);

        let source_environment = environment(from, &*source)?;
        let destination_environment = environment(to, destination_repo)?;

        let branch = if new_branch_name.is_empty() {
            self.generate_branch_name(service_name)
        } else {
            new_branch_name.to_owned()
        };
        info!("Creating branch {} from {} in {}", branch, to.branch, to);
        destination_repo
            .create_branch(&to.branch, &branch)
            .map_err(|source| PromoteError::BranchCreate {
                branch: branch.clone(),
                source,
            })?;

        let copied = copy_service(
            service_name,
            &*source,
            destination_repo,
            &source_environment,
            &destination_environment,
        )
        .map_err(|source| PromoteError::Copy {
            service: service_name.to_owned(),
            source,
        })?;
        if copied.is_empty() {
            warn!(
                "No configuration of {} found in {}, the promotion commit will be empty",
                service_name, source_environment
            );
        }

        let message = if commit_msg.is_empty() {
            DEFAULT_COMMIT_MESSAGE
        } else {
            commit_msg
        };
        destination_repo
            .commit(&copied, &self.author, message)
            .map_err(|source| PromoteError::Commit {
                branch: branch.clone(),
                source,
            })?;

        info!("Pushing {} to {}", branch, to);
        destination_repo
            .push(&branch)
            .map_err(|source| PromoteError::Push {
                branch: branch.clone(),
                source,
            })?;

        let cleanup = if keep_cache {
            CleanupOutcome::Retained
        } else {
            self.evict(source, destination)
        };

        Ok(PromotionOutcome {
            branch,
            copied,
            cleanup,
        })
    }

    fn add_credentials(&self, url: &str) -> Result<String, PromoteError> {
        self.credentials
            .add_credentials(url, &self.author)
            .map_err(|source| PromoteError::Credential {
                url: redact_url(url),
                source,
            })
    }

    fn open(
        &self,
        url: &str,
        location: &EnvLocation,
        shallow: bool,
    ) -> Result<Lease<O::Repo>, PromoteError> {
        self.opener
            .open(url, &location.branch, shallow)
            .map_err(|source| PromoteError::RepoOpen {
                location: location.to_string(),
                source,
            })
    }

    fn evict(&self, source: Lease<O::Repo>, destination: Option<Lease<O::Repo>>) -> CleanupOutcome {
        let failures: Vec<EvictionFailure> = std::iter::once(source)
            .chain(destination)
            .filter_map(|lease| {
                let location = lease.local_path().display().to_string();
                self.opener
                    .evict(lease)
                    .err()
                    .map(|source| EvictionFailure { location, source })
            })
            .collect();

        if failures.is_empty() {
            CleanupOutcome::Evicted
        } else {
            let error = CacheEvictionError { failures };
            warn!("{}", error);
            CleanupOutcome::Failed(error)
        }
    }

    fn generate_branch_name(&self, service_name: &str) -> String {
        let invalid = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
        let dots = Regex::new(r"\.\.+").unwrap();
        let service = invalid.replace_all(service_name, "-");
        let service = dots.replace_all(&service, ".");
        let service = match service.trim_matches(|c: char| c == '-' || c == '.') {
            "" => "promotion",
            trimmed => trimmed,
        };
        format!("{}-{}", service, self.clock.now().format("%Y%m%d%H%M%S"))
    }
}

fn environment<R: Repo>(location: &EnvLocation, repo: &R) -> Result<String, PromoteError> {
    if let Some(environment) = &location.environment {
        return Ok(environment.clone());
    }
    discover_environment(repo).map_err(|source| PromoteError::Environment {
        location: location.to_string(),
        source,
    })
}

/// The single directory below `/environments`.
fn discover_environment<R: Repo>(repo: &R) -> Result<String, EnvironmentError> {
    let mut found = repo.directories(ENVIRONMENTS_ROOT)?;
    match found.len() {
        0 => Err(EnvironmentError::NotFound),
        1 => Ok(found.remove(0)),
        _ => Err(EnvironmentError::Ambiguous(found)),
    }
}
