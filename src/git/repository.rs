use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use git2::{build::CheckoutBuilder, build::RepoBuilder, BranchType, Commit, Repository, Signature};
use log::{debug, info, trace};

use crate::{
    git::{Destination, Repo, RepoError, Source, Transport, Visit},
    model::{redact_url, Author},
    paths::rooted_path,
};

const REMOTE: &str = "origin";

/// A cloned working copy backed by libgit2.
pub struct GitRepository {
    git_repo: Mutex<Repository>,
    workdir: PathBuf,
    /// `workdir` with symbolic links resolved.
    real_workdir: PathBuf,
    transport: Transport,
}

impl GitRepository {
    /// Clones `url` at `branch` into `path`, or refreshes a clone left there by
    /// an earlier run.
    pub fn materialize(
        path: &Path,
        url: &str,
        branch: &str,
        shallow: bool,
        transport: Transport,
    ) -> Result<GitRepository, RepoError> {
        let git_repo = if path.join(".git").exists() {
            Self::refresh(path, url, branch, shallow, &transport)?
        } else {
            if path.exists() {
                debug!("Removing incomplete checkout at {}", path.display());
                std::fs::remove_dir_all(path)?;
            }
            Self::fresh_clone(path, url, branch, shallow, &transport)?
        };

        let workdir = git_repo
            .workdir()
            .ok_or_else(|| RepoError::Bare {
                path: path.display().to_string(),
            })?
            .to_path_buf();
        let real_workdir = workdir.canonicalize()?;

        Ok(GitRepository {
            git_repo: Mutex::new(git_repo),
            workdir,
            real_workdir,
            transport,
        })
    }

    fn fresh_clone(
        path: &Path,
        url: &str,
        branch: &str,
        shallow: bool,
        transport: &Transport,
    ) -> Result<Repository, RepoError> {
        info!(
            "Cloning {} at branch {} into {}",
            redact_url(url),
            branch,
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repo = RepoBuilder::new()
            .branch(branch)
            .fetch_options(transport.fetch_options(shallow))
            .clone(url, path)?;
        Ok(repo)
    }

    fn refresh(
        path: &Path,
        url: &str,
        branch: &str,
        shallow: bool,
        transport: &Transport,
    ) -> Result<Repository, RepoError> {
        info!("Reusing checkout at {}", path.display());
        let repo = Repository::open(path)?;

        {
            let remote = repo.find_remote(REMOTE)?;
            if remote.url() != Some(url) {
                trace!("Updating remote url of {}", path.display());
                repo.remote_set_url(REMOTE, url)?;
            }
        }

        {
            let mut remote = repo.find_remote(REMOTE)?;
            let refspec = format!("+refs/heads/{branch}:refs/remotes/{REMOTE}/{branch}");
            remote.fetch(&[refspec], Some(&mut transport.fetch_options(shallow)), None)?;
        }

        {
            let tip = repo
                .find_reference(&format!("refs/remotes/{REMOTE}/{branch}"))
                .and_then(|reference| reference.peel_to_commit())
                .map_err(|_| RepoError::BranchNotFound {
                    branch: branch.to_owned(),
                })?;
            // Detach first, a checked out branch cannot be force-updated.
            repo.set_head_detached(tip.id())?;
            repo.checkout_head(Some(CheckoutBuilder::new().force().remove_untracked(true)))?;
            repo.branch(branch, &tip, true)?;
            repo.set_head(&format!("refs/heads/{branch}"))?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        }

        Ok(repo)
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        self.git_repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Location of a repository-rooted path inside the working copy.
    fn resolve(&self, path: &str) -> PathBuf {
        self.workdir.join(relative(path))
    }

    /// Whether the nearest existing ancestor of `path` lies inside the working
    /// copy once symbolic links are resolved.
    fn contains(&self, path: &Path) -> Result<bool, RepoError> {
        for ancestor in path.ancestors() {
            match ancestor.canonicalize() {
                Ok(real) => return Ok(real.starts_with(&self.real_workdir)),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Ok(false)
    }
}

fn relative(path: &str) -> String {
    rooted_path(&[path]).trim_start_matches('/').to_owned()
}

fn branch_tip<'r>(repo: &'r Repository, branch: &str) -> Result<Commit<'r>, RepoError> {
    repo.find_branch(branch, BranchType::Local)
        .or_else(|_| repo.find_branch(&format!("{REMOTE}/{branch}"), BranchType::Remote))
        .and_then(|found| found.get().peel_to_commit())
        .map_err(|_| RepoError::BranchNotFound {
            branch: branch.to_owned(),
        })
}

fn walk_dir(dir: &Path, prefix: &Path, visit: &mut Visit<'_>) -> Result<(), RepoError> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(&path, prefix, visit)?;
        } else if file_type.is_file() {
            let name = relative_name(&path, prefix);
            visit(prefix, &name)?;
        } else {
            debug!("Skipping {}, not a regular file", path.display());
        }
    }
    Ok(())
}

fn relative_name(path: &Path, prefix: &Path) -> String {
    path.strip_prefix(prefix)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl Source for GitRepository {
    fn walk(&self, root: &str, visit: &mut Visit<'_>) -> Result<(), RepoError> {
        let base = self.resolve(root);
        let prefix = base.parent().unwrap_or(&self.workdir).to_path_buf();
        trace!("Walking {}", base.display());

        let file_type = match std::fs::symlink_metadata(&base) {
            Ok(metadata) => metadata.file_type(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist, nothing to walk", base.display());
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };
        if !self.contains(&base)? {
            debug!("{} leaves the working copy, nothing to walk", base.display());
            return Ok(());
        }

        if file_type.is_dir() {
            walk_dir(&base, &prefix, visit)
        } else if file_type.is_file() {
            visit(&prefix, &relative_name(&base, &prefix))
        } else {
            debug!("{} is not a regular file or directory, nothing to walk", base.display());
            Ok(())
        }
    }
}

impl Destination for GitRepository {
    fn copy_file(&self, from: &Path, to: &str) -> Result<(), RepoError> {
        if !std::fs::symlink_metadata(from)?.is_file() {
            return Err(RepoError::NotAFile {
                path: from.display().to_string(),
            });
        }

        let target = self.resolve(to);
        let escapes = || RepoError::Escapes {
            path: to.to_owned(),
        };
        if !self.contains(&target)? {
            return Err(escapes());
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if std::fs::symlink_metadata(&target).is_ok_and(|metadata| metadata.file_type().is_symlink()) {
            return Err(escapes());
        }

        trace!("Copying {} to {}", from.display(), target.display());
        std::fs::copy(from, &target)?;
        Ok(())
    }
}

impl Repo for GitRepository {
    fn local_path(&self) -> &Path {
        &self.workdir
    }

    fn directories(&self, path: &str) -> Result<Vec<String>, RepoError> {
        let dir = self.resolve(path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn create_branch(&self, base: &str, name: &str) -> Result<(), RepoError> {
        let repo = self.repo();
        if repo.find_branch(name, BranchType::Local).is_ok() {
            return Err(RepoError::BranchExists {
                branch: name.to_owned(),
            });
        }
        let tip = branch_tip(&repo, base)?;
        debug!("Creating branch {} from {} at {}", name, base, tip.id());

        repo.branch(name, &tip, false).map_err(|e| match e.code() {
            git2::ErrorCode::Exists => RepoError::BranchExists {
                branch: name.to_owned(),
            },
            _ => e.into(),
        })?;
        repo.set_head(&format!("refs/heads/{name}"))?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        Ok(())
    }

    fn commit(&self, paths: &[String], author: &Author, message: &str) -> Result<(), RepoError> {
        let repo = self.repo();
        let mut index = repo.index()?;
        for path in paths {
            index.add_path(Path::new(&relative(path)))?;
        }
        index.write()?;

        let tree = repo.find_tree(index.write_tree()?)?;
        let parent = repo.head()?.peel_to_commit()?;
        let signature = Signature::now(author.name(), author.email())?;
        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;
        debug!("Committed {} file(s) as {}", paths.len(), oid);
        Ok(())
    }

    fn push(&self, branch: &str) -> Result<(), RepoError> {
        let repo = self.repo();
        let mut remote = repo.find_remote(REMOTE)?;
        let reference = format!("refs/heads/{branch}");
        let rejection = RefCell::new(None);

        {
            let mut callbacks = self.transport.callbacks();
            callbacks.push_update_reference(|name, status| {
                if let Some(message) = status {
                    rejection.replace(Some((name.to_owned(), message.to_owned())));
                }
                Ok(())
            });
            let mut options = self.transport.push_options(callbacks);
            info!("Pushing {} to {}", branch, REMOTE);
            remote.push(&[format!("{reference}:{reference}")], Some(&mut options))?;
        }

        match rejection.into_inner() {
            Some((reference, message)) => Err(RepoError::PushRejected { reference, message }),
            None => Ok(()),
        }
    }

    fn remove(&self) -> Result<(), RepoError> {
        debug!("Removing {}", self.workdir.display());
        std::fs::remove_dir_all(&self.workdir)?;
        Ok(())
    }
}
