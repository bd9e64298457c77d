mod cache;
mod error;
mod key;
pub mod metrics;
mod queue;
mod reconciler;

pub use cache::ResourceCache;
pub use error::{Error, Result};
pub use key::Key;
pub use queue::{BackoffConfig, WorkQueue};
pub use reconciler::{Handler, MetricLabel, Reconciler};
