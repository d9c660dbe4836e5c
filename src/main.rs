// System
use std::path::Path;

// Third Party
use anyhow::Context;
use kube::Client;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// Local
use launchpad_sidecar::{
    config::Config,
    detector::{BackoffPolicy, CompletionDetector, KubeStatusQuery},
    notifier::{read_credential, CompletionNotifier, SERVICE_ACCOUNT_TOKEN_PATH},
    utils::init_tracing,
};

#[tokio::main]
async fn main() {
    init_tracing("launchpad_sidecar", tracing::Level::INFO);
    if let Err(error) = run().await {
        error!("{:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), anyhow::Error> {
    let config = Config::from_env().context("loading configuration")?;

    // Cancel promptly on SIGTERM so the sidecar never delays pod shutdown by
    // sitting in a backoff sleep or a request wait.
    let cancel = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate()).context("registering SIGTERM handler")?;
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            sigterm.recv().await;
            info!("Received SIGTERM, shutting down...");
            cancel.cancel();
        });
    }

    let client = Client::try_default()
        .await
        .context("building Kubernetes client")?;
    let detector = CompletionDetector::new(KubeStatusQuery::new(&client), BackoffPolicy::default());
    detector.detect(&config.watch_target(), &cancel).await?;

    let credential = read_credential(Path::new(SERVICE_ACCOUNT_TOKEN_PATH))?;
    let notifier = CompletionNotifier::new(&config.endpoint_base, config.notify_timeout)?;
    notifier.notify(&credential, &cancel).await?;
    info!(
        "Reported completion of container {} to {}",
        config.container_name, config.endpoint_base
    );
    Ok(())
}
