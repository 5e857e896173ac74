use std::{error::Error, path::Path};

use crate::{
    cli::command_handlers::do_clear_cache,
    credentials::TokenCredentials,
    git::{GitCloner, RepositoryCache},
    model::{Author, EnvLocation},
    promote::{PromoteError, Promoter, PromotionOutcome},
};

mod builder;

pub use builder::PromotionBuilder;

pub struct Promotion {
    promoter: Promoter<RepositoryCache<GitCloner>, TokenCredentials>,
}

impl Promotion {
    pub fn builder() -> PromotionBuilder {
        PromotionBuilder::default()
    }

    /// Copies the promotable configuration of `service_name` from `from` to a
    /// new branch of `to` and pushes it.
    pub fn promote(
        &self,
        service_name: &str,
        from: &EnvLocation,
        to: &EnvLocation,
        new_branch_name: &str,
        commit_msg: &str,
        keep_cache: bool,
    ) -> Result<PromotionOutcome, PromoteError> {
        self.promoter.promote(
            service_name,
            from,
            to,
            new_branch_name,
            commit_msg,
            keep_cache,
        )
    }

    pub fn author(&self) -> &Author {
        self.promoter.author()
    }

    pub fn cache_location(&self) -> &Path {
        self.promoter.opener().location()
    }

    pub fn clear_cache(&self) -> Result<(), Box<dyn Error>> {
        do_clear_cache(self.promoter.opener())
    }
}
