mod metrics;

use std::{net::SocketAddr, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::Result;

/// Serves `/metrics` and `/readyz` until `cancel` fires.
pub async fn serve_metrics(
    addr: SocketAddr,
    ready: CancellationToken,
    cancel: CancellationToken,
) -> Result<()> {
    let state = Arc::new(metrics::State::new(ready));

    metrics::serve(addr, state, cancel).await
}
