// System
use std::fmt;

// Third Party
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{api::Api, Client};
use rand::Rng;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The pod and container whose completion is being watched. Built once from
/// configuration and never modified.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

/// Snapshot of the watched container's lifecycle phase, produced fresh on
/// every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerObservation {
    Waiting,
    Running,
    Terminated,
    /// The pod status carried no entry for the container. This happens while
    /// the kubelet has not yet published the sibling's status.
    NotFound,
}

impl fmt::Display for ContainerObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerObservation::Waiting => write!(f, "waiting"),
            ContainerObservation::Running => write!(f, "running"),
            ContainerObservation::Terminated => write!(f, "terminated"),
            ContainerObservation::NotFound => write!(f, "not present in pod status"),
        }
    }
}

/// A source of container status snapshots for a pod.
#[async_trait]
pub trait StatusQuery {
    async fn query(&self, target: &WatchTarget) -> Result<ContainerObservation, anyhow::Error>;
}

/// Status source backed by the Kubernetes API.
pub struct KubeStatusQuery {
    client: Client,
}

impl KubeStatusQuery {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.clone(),
        }
    }
}

#[async_trait]
impl StatusQuery for KubeStatusQuery {
    async fn query(&self, target: &WatchTarget) -> Result<ContainerObservation, anyhow::Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let pod = pods.get(&target.pod_name).await?;
        let statuses = pod
            .status
            .and_then(|status| status.container_statuses)
            .unwrap_or_default();
        for status in statuses {
            if status.name == target.container_name {
                let state = status.state.unwrap_or_default();
                let observation = if state.terminated.is_some() {
                    ContainerObservation::Terminated
                } else if state.running.is_some() {
                    ContainerObservation::Running
                } else {
                    ContainerObservation::Waiting
                };
                return Ok(observation);
            }
        }
        Ok(ContainerObservation::NotFound)
    }
}

/// How long and how often the detector keeps polling before giving up.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the attempt following `attempt` (1-based): exponential
    /// doubling capped at `max_delay`, plus jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        let jitter_cap = delay.as_millis() as u64 / 4;
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        delay + Duration::from_millis(jitter)
    }
}

/// The condition seen on the most recent unsuccessful poll, kept as context
/// for the exhaustion error.
#[derive(Debug)]
pub enum LastPoll {
    Observed(ContainerObservation),
    QueryFailed(anyhow::Error),
}

impl fmt::Display for LastPoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastPoll::Observed(observation) => {
                write!(f, "container was last seen {}", observation)
            }
            LastPoll::QueryFailed(error) => write!(f, "status query failed: {}", error),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("container did not terminate within {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: LastPoll },
    #[error("cancelled while waiting for container completion")]
    Cancelled,
}

/// Polls a status source until the watched container is terminated or the
/// retry budget runs out. Each transient condition, a container that is not
/// yet done, a status entry that has not been published, or a failed query,
/// is retried under the same budget.
pub struct CompletionDetector<S> {
    source: S,
    policy: BackoffPolicy,
}

impl<S: StatusQuery> CompletionDetector<S> {
    pub fn new(source: S, policy: BackoffPolicy) -> Self {
        Self { source, policy }
    }

    pub async fn detect(
        &self,
        target: &WatchTarget,
        cancel: &CancellationToken,
    ) -> Result<(), DetectionError> {
        info!(
            "Watching container {} of pod {}/{} for completion...",
            target.container_name, target.namespace, target.pod_name
        );
        let mut last = LastPoll::Observed(ContainerObservation::NotFound);
        for attempt in 1..=self.policy.max_attempts {
            match self.source.query(target).await {
                Ok(ContainerObservation::Terminated) => {
                    info!(
                        "Container {} has terminated (attempt {}/{})",
                        target.container_name, attempt, self.policy.max_attempts
                    );
                    return Ok(());
                }
                Ok(observation) => {
                    info!(
                        "Container {} is {} (attempt {}/{})",
                        target.container_name, observation, attempt, self.policy.max_attempts
                    );
                    last = LastPoll::Observed(observation);
                }
                Err(error) => {
                    warn!(
                        "Status query for pod {}/{} failed (attempt {}/{}): {}",
                        target.namespace, target.pod_name, attempt, self.policy.max_attempts, error
                    );
                    last = LastPoll::QueryFailed(error);
                }
            }

            if attempt == self.policy.max_attempts {
                break;
            }
            let delay = self.policy.delay_for(attempt);
            tokio::select! {
                _ = cancel.cancelled() => return Err(DetectionError::Cancelled),
                _ = time::sleep(delay) => {}
            }
        }
        Err(DetectionError::Exhausted {
            attempts: self.policy.max_attempts,
            last,
        })
    }
}
