use log::{info, warn};

use crate::{
    cli::args::PromoteArgs,
    git::{RepoFactory, RepositoryCache},
    model::EnvLocation,
    promote::CleanupOutcome,
    Promotion,
};
use std::error::Error;

/// Handler to promote command
pub fn do_promote(promotion: &Promotion, args: &PromoteArgs) -> Result<(), Box<dyn Error>> {
    let from = env_location(&args.from, &args.from_branch, args.from_environment.as_deref());
    let to = env_location(&args.to, &args.to_branch, args.to_environment.as_deref());

    info!("Promoting {} from {} to {}", args.service, from, to);
    let outcome = promotion.promote(
        &args.service,
        &from,
        &to,
        &args.branch_name,
        &args.msg,
        args.keep_cache,
    )?;

    for path in &outcome.copied {
        info!("Copied {}", path);
    }
    info!(
        "Promoted {} file(s) of {} to branch {} of {}",
        outcome.copied.len(),
        args.service,
        outcome.branch,
        to
    );

    match outcome.cleanup {
        CleanupOutcome::Retained => info!(
            "Kept cached repositories in {}",
            promotion.cache_location().display()
        ),
        CleanupOutcome::Evicted => {}
        CleanupOutcome::Failed(error) => warn!("{}", error),
    }
    Ok(())
}

/// Handler to clear-cache command
pub fn do_clear_cache<F: RepoFactory>(cache: &RepositoryCache<F>) -> Result<(), Box<dyn Error>> {
    cache.clear()?;
    Ok(())
}

fn env_location(repo_path: &str, branch: &str, environment: Option<&str>) -> EnvLocation {
    let location = EnvLocation::new(repo_path, branch);
    match environment {
        Some(environment) => location.with_environment(environment),
        None => location,
    }
}
