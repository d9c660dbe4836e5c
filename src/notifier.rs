// System
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Third Party
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// Well-known location of the service account token mounted into the pod.
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to read credential from {}: {source}", path.display())]
    CredentialUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("credential file {} is empty", path.display())]
    CredentialEmpty { path: PathBuf },
    #[error("invalid notification endpoint {url}: {source}")]
    InvalidEndpoint {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to reach notification endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification endpoint rejected completion report with status {0}")]
    Rejected(reqwest::StatusCode),
    #[error("cancelled while reporting completion")]
    Cancelled,
}

/// Read the bearer credential for the notification call. The content is
/// passed through byte for byte; only "non-empty" is validated.
pub fn read_credential(path: &Path) -> Result<String, NotifyError> {
    let credential = fs::read_to_string(path).map_err(|source| NotifyError::CredentialUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    if credential.is_empty() {
        return Err(NotifyError::CredentialEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(credential)
}

/// Reports workload completion to the launchpad service with a single
/// authenticated request. Whatever the failure, no retry is attempted; the
/// pod restart policy is the only recovery mechanism.
pub struct CompletionNotifier {
    http: reqwest::Client,
    endpoint_base: String,
}

impl CompletionNotifier {
    pub fn new(endpoint_base: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint_base: endpoint_base.trim_end_matches('/').to_string(),
        })
    }

    /// Issue the one completion notification. Any status outside the 2xx
    /// range is a rejection carrying the actual status code.
    pub async fn notify(
        &self,
        credential: &str,
        cancel: &CancellationToken,
    ) -> Result<(), NotifyError> {
        let raw_url = format!(
            "{}/api/mission/launched/{}",
            self.endpoint_base, credential
        );
        let url = Url::parse(&raw_url).map_err(|source| NotifyError::InvalidEndpoint {
            url: raw_url.clone(),
            source,
        })?;

        info!("Reporting completion to {}", self.endpoint_base);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(NotifyError::Cancelled),
            result = self.http.get(url).send() => result?,
        };
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status));
        }
        Ok(())
    }
}
