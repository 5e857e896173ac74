use thiserror::Error;
use url::Url;

use crate::model::Author;

/// Username embedded next to the author's token in remote URLs.
pub const PROMOTION_USERNAME: &str = "promotion";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Invalid repository URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

pub trait CredentialInjector {
    /// Returns `url` with credentials usable for clone and push.
    fn add_credentials(&self, url: &str, author: &Author) -> Result<String, CredentialError>;
}

/// Embeds the author's token into remote URLs that carry no credentials yet.
#[derive(Debug, Clone)]
pub struct TokenCredentials {
    username: String,
}

impl TokenCredentials {
    pub fn new(username: impl Into<String>) -> TokenCredentials {
        TokenCredentials {
            username: username.into(),
        }
    }
}

impl Default for TokenCredentials {
    fn default() -> Self {
        TokenCredentials::new(PROMOTION_USERNAME)
    }
}

impl CredentialInjector for TokenCredentials {
    fn add_credentials(&self, url: &str, author: &Author) -> Result<String, CredentialError> {
        inject(url, &self.username, author.token())
    }
}

/// Adds `promotion:<token>` credentials to a remote URL unless it already has some.
///
/// Local paths and URLs without a host are returned unchanged.
pub fn add_credentials_if_necessary(url: &str, author: &Author) -> Result<String, CredentialError> {
    inject(url, PROMOTION_USERNAME, author.token())
}

fn inject(raw: &str, username: &str, token: &str) -> Result<String, CredentialError> {
    let mut parsed = match Url::parse(raw) {
        Ok(parsed) => parsed,
        // Filesystem paths and scp-like ssh locations have no scheme.
        Err(url::ParseError::RelativeUrlWithoutBase) => return Ok(raw.to_owned()),
        Err(source) => {
            return Err(CredentialError::InvalidUrl {
                url: raw.to_owned(),
                source,
            })
        }
    };

    if parsed.scheme() == "file" || parsed.host().is_none() {
        return Ok(raw.to_owned());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Ok(raw.to_owned());
    }
    if token.is_empty() {
        log::debug!("No token available, leaving {} without credentials", raw);
        return Ok(raw.to_owned());
    }

    // Both setters only fail for URLs without a host, handled above.
    let _ = parsed.set_username(username);
    let _ = parsed.set_password(Some(token));

    Ok(parsed.to_string())
}
