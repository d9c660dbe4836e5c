// System
use std::env;
use std::time::Duration;

// Third Party
use anyhow::{bail, Context};

// Local
use crate::detector::WatchTarget;

/// Container watched when `TARGET_CONTAINER` is not set.
pub const DEFAULT_TARGET_CONTAINER: &str = "main";

const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 30;

/// Immutable process configuration, assembled once at startup and passed
/// explicitly into the detector and notifier.
#[derive(Debug, Clone)]
pub struct Config {
    pub pod_name: String,
    pub pod_namespace: String,
    pub container_name: String,
    pub endpoint_base: String,
    pub notify_timeout: Duration,
}

impl Config {
    /// Read the configuration from the environment. A missing or empty
    /// required variable is fatal.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let pod_name = require_env("MY_POD_NAME")?;
        let pod_namespace = require_env("MY_POD_NAMESPACE")?;
        let endpoint_base = require_env("LAUNCHPAD_API_URL")?;
        let container_name = env::var("TARGET_CONTAINER")
            .unwrap_or_else(|_| DEFAULT_TARGET_CONTAINER.to_string());
        let notify_timeout = match env::var("NOTIFY_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .parse()
                    .with_context(|| format!("NOTIFY_TIMEOUT_SECS is not a number: {}", raw))?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
        };
        Ok(Config {
            pod_name,
            pod_namespace,
            container_name,
            endpoint_base,
            notify_timeout,
        })
    }

    pub fn watch_target(&self) -> WatchTarget {
        WatchTarget {
            namespace: self.pod_namespace.clone(),
            pod_name: self.pod_name.clone(),
            container_name: self.container_name.clone(),
        }
    }
}

fn require_env(name: &str) -> Result<String, anyhow::Error> {
    let value =
        env::var(name).with_context(|| format!("required environment variable {} is not set", name))?;
    if value.is_empty() {
        bail!("required environment variable {} is empty", name);
    }
    Ok(value)
}
