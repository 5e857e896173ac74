use std::fmt::{Debug, Display};

/// Identity used for promotion commits and for authenticating against remotes.
#[derive(Clone, PartialEq, Eq)]
pub struct Author {
    name: String,
    email: String,
    token: String,
}

impl Author {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Author {
        Author {
            name: name.into(),
            email: email.into(),
            token: token.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Debug for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Author")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A repository and the branch to read from or promote onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLocation {
    pub repo_path: String,
    pub branch: String,
    /// Environment folder under `/environments`. Discovered from the
    /// repository when not given.
    pub environment: Option<String>,
}

impl EnvLocation {
    pub fn new(repo_path: impl Into<String>, branch: impl Into<String>) -> EnvLocation {
        EnvLocation {
            repo_path: repo_path.into(),
            branch: branch.into(),
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> EnvLocation {
        self.environment = Some(environment.into());
        self
    }
}

impl Display for EnvLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}@{}", redact_url(&self.repo_path), self.branch)
    }
}

/// Hides the password component of a URL so it can be logged.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            // Only fails for cannot-be-a-base URLs, which carry no password.
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => raw.to_owned(),
    }
}
