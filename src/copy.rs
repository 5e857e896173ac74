use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::{
    git::{Destination, RepoError, Source},
    paths::{path_for_service_config, path_valid_for_promotion},
};

#[derive(Error, Debug)]
#[error("Failed to copy {from} to {to}: {source}")]
pub struct CopyError {
    pub from: String,
    pub to: String,
    /// Files copied before the failure. They are left in place.
    pub copied: Vec<String>,
    #[source]
    pub source: RepoError,
}

/// Copies `service_name`'s promotable configuration from `source_environment`
/// in `source` to `destination_environment` in `destination`.
///
/// Only files ending up below
/// `/environments/<destination_environment>/services/<service_name>/base/config`
/// are copied. Returns the destination paths in walk order.
pub fn copy_service(
    service_name: &str,
    source: &dyn Source,
    destination: &dyn Destination,
    source_environment: &str,
    destination_environment: &str,
) -> Result<Vec<String>, CopyError> {
    let root = path_for_service_config(service_name, source_environment);
    info!("Copying {} from {}", service_name, root);

    let mut copied = Vec::new();
    let mut failure = None;

    let walked = source.walk(&root, &mut |prefix: &Path, name: &str| {
        let destination_path = path_for_service_config(name, destination_environment);
        if !path_valid_for_promotion(service_name, &destination_path, destination_environment) {
            debug!("Skipping {}, not promotable", destination_path);
            return Ok(());
        }

        let source_path = prefix.join(name);
        debug!(
            "Copying {} to {}",
            source_path.display(),
            destination_path
        );
        match destination.copy_file(&source_path, &destination_path) {
            Ok(()) => {
                copied.push(destination_path);
                Ok(())
            }
            Err(error) => {
                failure = Some((source_path.display().to_string(), destination_path));
                Err(error)
            }
        }
    });

    match walked {
        Ok(()) => Ok(copied),
        Err(source) => {
            let (from, to) = failure.unwrap_or_else(|| (root.clone(), String::new()));
            Err(CopyError {
                from,
                to,
                copied,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        cell::RefCell,
        collections::BTreeMap,
        path::PathBuf,
    };

    use pretty_assertions::assert_eq;

    use crate::git::Visit;

    /// Files keyed by repository-rooted path, walked in sorted order.
    struct Tree {
        local_path: PathBuf,
        files: BTreeMap<String, String>,
    }

    impl Tree {
        fn new(local_path: &str, files: &[&str]) -> Tree {
            Tree {
                local_path: PathBuf::from(local_path),
                files: files
                    .iter()
                    .map(|path| (path.to_string(), format!("content of {path}")))
                    .collect(),
            }
        }
    }

    impl Source for Tree {
        fn walk(&self, root: &str, visit: &mut Visit<'_>) -> Result<(), RepoError> {
            let parent = root.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
            let prefix = self.local_path.join(parent.trim_start_matches('/'));
            for path in self.files.keys() {
                if path.starts_with(&format!("{root}/")) {
                    visit(&prefix, &path[parent.len() + 1..])?;
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        copies: RefCell<Vec<(PathBuf, String)>>,
        fail_on: Option<String>,
    }

    impl Destination for Recorder {
        fn copy_file(&self, from: &Path, to: &str) -> Result<(), RepoError> {
            if self.fail_on.as_deref() == Some(to) {
                return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into());
            }
            self.copies
                .borrow_mut()
                .push((from.to_path_buf(), to.to_owned()));
            Ok(())
        }
    }

    #[test]
    fn copies_only_base_config() {
        let source = Tree::new(
            "/dev",
            &[
                "/environments/dev/services/my-service/base/config/a.yaml",
                "/environments/dev/services/my-service/base/config/nested/b.yaml",
                "/environments/dev/services/my-service/base/kustomization.yaml",
                "/environments/dev/services/my-service/overlays/patch.yaml",
                "/environments/dev/services/other/base/config/c.yaml",
            ],
        );
        let destination = Recorder::default();

        let copied = copy_service("my-service", &source, &destination, "dev", "staging").unwrap();

        assert_eq!(
            copied,
            vec![
                "/environments/staging/services/my-service/base/config/a.yaml",
                "/environments/staging/services/my-service/base/config/nested/b.yaml",
            ]
        );
        assert_eq!(
            destination.copies.into_inner(),
            vec![
                (
                    PathBuf::from("/dev/environments/dev/services/my-service/base/config/a.yaml"),
                    "/environments/staging/services/my-service/base/config/a.yaml".to_owned()
                ),
                (
                    PathBuf::from(
                        "/dev/environments/dev/services/my-service/base/config/nested/b.yaml"
                    ),
                    "/environments/staging/services/my-service/base/config/nested/b.yaml"
                        .to_owned()
                ),
            ]
        );
    }

    #[test]
    fn empty_subtree_copies_nothing() {
        let source = Tree::new("/dev", &["/environments/dev/services/other/base/config/c.yaml"]);
        let destination = Recorder::default();

        let copied = copy_service("my-service", &source, &destination, "dev", "staging").unwrap();

        assert!(copied.is_empty());
        assert!(destination.copies.into_inner().is_empty());
    }

    #[test]
    fn stops_at_first_failure() {
        let source = Tree::new(
            "/dev",
            &[
                "/environments/dev/services/my-service/base/config/a.yaml",
                "/environments/dev/services/my-service/base/config/b.yaml",
                "/environments/dev/services/my-service/base/config/c.yaml",
            ],
        );
        let destination = Recorder {
            fail_on: Some("/environments/staging/services/my-service/base/config/b.yaml".to_owned()),
            ..Default::default()
        };

        let error = copy_service("my-service", &source, &destination, "dev", "staging").unwrap_err();

        assert_eq!(
            error.copied,
            vec!["/environments/staging/services/my-service/base/config/a.yaml"]
        );
        assert_eq!(
            error.to,
            "/environments/staging/services/my-service/base/config/b.yaml"
        );
        assert!(matches!(error.source, RepoError::IO(_)));
        assert_eq!(destination.copies.into_inner().len(), 1);
    }

    #[test]
    fn walk_failure_is_reported() {
        struct Broken;

        impl Source for Broken {
            fn walk(&self, _root: &str, _visit: &mut Visit<'_>) -> Result<(), RepoError> {
                Err(std::io::Error::from(std::io::ErrorKind::NotFound).into())
            }
        }

        let error = copy_service("my-service", &Broken, &Recorder::default(), "dev", "staging")
            .unwrap_err();
        assert!(error.copied.is_empty());
        assert_eq!(error.from, "/environments/dev/services/my-service");
    }
}
