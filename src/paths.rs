//! Layout of a GitOps environment repository.
//!
//! Configuration for a service lives under
//! `/environments/<environment>/services/<service>`, and only files below its
//! `base/config` directory are promoted.

const ENVIRONMENTS_DIR: &str = "environments";
const SERVICES_DIR: &str = "services";

/// Root directory of `service_name`'s configuration in `environment`.
///
/// Any `environments` substring in `environment` is dropped, so a caller that
/// already prefixed it does not end up with the root twice.
pub fn path_for_service_config(service_name: &str, environment: &str) -> String {
    let environment = environment.replace(ENVIRONMENTS_DIR, "");
    rooted_path(&[ENVIRONMENTS_DIR, &environment, SERVICES_DIR, service_name])
}

/// Whether `file_path` lies under `service_name`'s `base/config` directory in
/// `environment`.
pub fn path_valid_for_promotion(service_name: &str, file_path: &str, environment: &str) -> bool {
    let filter = rooted_path(&[
        &path_for_service_config(service_name, environment),
        "base",
        "config",
    ]);
    let filter: Vec<&str> = components(&filter).collect();
    let candidate: Vec<&str> = components(file_path).collect();
    candidate.starts_with(&filter)
}

/// Joins `parts` into a path with exactly one leading `/`, resolving `.` and
/// `..` lexically. `..` never climbs above the root.
pub(crate) fn rooted_path(parts: &[&str]) -> String {
    let mut resolved: Vec<&str> = Vec::new();
    for component in parts.iter().flat_map(|part| components(part)) {
        match component {
            "." => {}
            ".." => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    format!("/{}", resolved.join("/"))
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|component| !component.is_empty())
}
