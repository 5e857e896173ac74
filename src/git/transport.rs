use git2::{
    cert::Cert, CertificateCheckStatus, Config, Cred, CredentialType, FetchOptions, PushOptions,
    RemoteCallbacks,
};
use log::trace;
use ssh_key::{known_hosts::HostPatterns, KnownHosts};

const GLOBAL_KNOWN_HOSTS: &str = "/etc/ssh/ssh_known_hosts";
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Authentication and certificate policy for talking to remotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transport {
    insecure_skip_verify: bool,
}

impl Transport {
    pub fn new(insecure_skip_verify: bool) -> Transport {
        Transport {
            insecure_skip_verify,
        }
    }

    pub fn callbacks<'a>(&self) -> RemoteCallbacks<'a> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0;
        callbacks.credentials(move |url, username, allowed_types| {
            trace!(
                "Requested credentials for {}, username {:?}, allowed types {:?}",
                crate::model::redact_url(url),
                username,
                allowed_types
            );
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication rejected by remote"));
            }
            // Asking for ssh username
            if allowed_types.contains(CredentialType::USERNAME) {
                return Cred::username(username.unwrap_or("git"));
            }
            if allowed_types.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some((user, password)) = url_credentials(url) {
                    return Cred::userpass_plaintext(&user, &password);
                }
                let git_config = Config::open_default()?;
                return Cred::credential_helper(&git_config, url, username);
            }
            Err(git2::Error::from_str("no valid authentication available"))
        });

        let insecure_skip_verify = self.insecure_skip_verify;
        callbacks.certificate_check(move |certificate, host| {
            check_certificate(certificate, host, insecure_skip_verify)
        });
        callbacks
    }

    pub fn fetch_options<'a>(&self, shallow: bool) -> FetchOptions<'a> {
        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(self.callbacks())
            .download_tags(git2::AutotagOption::None);
        if shallow {
            fetch_options.depth(1);
        }
        fetch_options
    }

    pub fn push_options<'a>(&self, callbacks: RemoteCallbacks<'a>) -> PushOptions<'a> {
        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);
        push_options
    }
}

fn url_credentials(raw: &str) -> Option<(String, String)> {
    let parsed = url::Url::parse(raw).ok()?;
    let password = parsed.password()?;
    if parsed.username().is_empty() {
        return None;
    }
    Some((parsed.username().to_owned(), password.to_owned()))
}

fn check_certificate(
    certificate: &Cert<'_>,
    host: &str,
    insecure_skip_verify: bool,
) -> Result<CertificateCheckStatus, git2::Error> {
    if insecure_skip_verify {
        trace!("Skipping certificate verification for {}", host);
        return Ok(CertificateCheckStatus::CertificateOk);
    }
    if let Some(hostkey) = certificate.as_hostkey().and_then(|h| h.hostkey()) {
        match KnownHosts::read_file(GLOBAL_KNOWN_HOSTS) {
            Ok(entries) => {
                let known = entries.iter().any(|entry| {
                    host_matches_patterns(host, entry.host_patterns())
                        && entry.public_key().to_bytes().as_deref() == Ok(hostkey)
                });
                if known {
                    trace!("Host key of {} found in {}", host, GLOBAL_KNOWN_HOSTS);
                    return Ok(CertificateCheckStatus::CertificateOk);
                }
            }
            Err(error) => trace!("Could not load {}: {}", GLOBAL_KNOWN_HOSTS, error),
        }
    }
    Ok(CertificateCheckStatus::CertificatePassthrough)
}

fn host_matches_patterns(host: &str, patterns: &HostPatterns) -> bool {
    match patterns {
        HostPatterns::Patterns(patterns) => {
            let mut matched = false;
            for pattern in patterns {
                let pattern = pattern.to_lowercase();
                // * and ? wildcards are not supported
                if let Some(negated) = pattern.strip_prefix('!') {
                    if negated == host {
                        return false;
                    }
                } else {
                    matched |= pattern == host;
                }
            }
            matched
        }
        HostPatterns::HashedName { .. } => false,
    }
}
