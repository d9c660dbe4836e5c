pub mod config;
pub mod detector;
pub mod notifier;
pub mod utils;

pub use config::Config;
pub use detector::{BackoffPolicy, CompletionDetector, KubeStatusQuery, WatchTarget};
pub use notifier::CompletionNotifier;
