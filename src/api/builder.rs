use std::{error::Error, path::PathBuf};

use home::home_dir;

use crate::{
    cli::command_handlers::do_clear_cache,
    credentials::TokenCredentials,
    git::{GitCloner, RepositoryCache, Transport},
    model::Author,
    promote::Promoter,
    Promotion,
};

#[derive(Default)]
pub struct PromotionBuilder {
    cache_directory_path: Option<PathBuf>,
    name: Option<String>,
    email: Option<String>,
    token: Option<String>,
    insecure_skip_verify: bool,
    shallow: bool,
}

impl PromotionBuilder {
    /// Location of the repository cache directory.
    ///
    /// Defaults to `$HOME/.promotion/cache`.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory_path = Some(path.into());
        self
    }

    /// Commit author name.
    ///
    /// Defaults to `user.name` from the git configuration.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Commit author email.
    ///
    /// Defaults to `user.email` from the git configuration.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Token injected into https remote URLs.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Accept any TLS certificate or SSH host key.
    pub fn insecure_skip_verify(mut self, insecure_skip_verify: bool) -> Self {
        self.insecure_skip_verify = insecure_skip_verify;
        self
    }

    /// Clone source repositories with a depth of one.
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn try_build(self) -> Result<Promotion, Box<dyn Error>> {
        let cache = self.cache()?;
        let Self {
            name,
            email,
            token,
            shallow,
            ..
        } = self;

        let git_config = git2::Config::open_default().ok();
        let from_git_config = |key: &str| {
            git_config
                .as_ref()
                .and_then(|config| config.get_string(key).ok())
                .unwrap_or_default()
        };
        let name = name.unwrap_or_else(|| from_git_config("user.name"));
        let email = email.unwrap_or_else(|| from_git_config("user.email"));
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err("Unable to identify user and email for commits. \
                Set them with --name and --email, PROMOTION_GIT_NAME and PROMOTION_GIT_EMAIL, \
                or user.name and user.email in the git configuration"
                .into());
        }
        let author = Author::new(name, email, token.unwrap_or_default());

        let promoter = Promoter::new(cache, TokenCredentials::default(), author).shallow(shallow);

        Ok(Promotion { promoter })
    }

    /// Empties the repository cache. Needs no commit identity.
    pub fn clear_cache(self) -> Result<(), Box<dyn Error>> {
        do_clear_cache(&self.cache()?)
    }

    fn cache(&self) -> Result<RepositoryCache<GitCloner>, Box<dyn Error>> {
        let cache_directory = match &self.cache_directory_path {
            Some(path) => path.clone(),
            None => default_cache_directory()?,
        };
        let cloner = GitCloner::new(Transport::new(self.insecure_skip_verify));
        Ok(RepositoryCache::new(cache_directory, cloner)?)
    }
}

fn default_cache_directory() -> Result<PathBuf, Box<dyn Error>> {
    let mut cache_directory =
        home_dir().ok_or("Could not find home dir. Please define $HOME env variable.")?;
    cache_directory.push(".promotion/cache");
    Ok(cache_directory)
}
