use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::State as AxumState,
    response::{IntoResponse, Response},
    routing::get,
};
use http::{StatusCode, header};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;

#[derive(Clone)]
pub(crate) struct State {
    ready: CancellationToken,
}

impl State {
    pub fn new(ready: CancellationToken) -> Self {
        Self { ready }
    }

    pub fn ready(&self) -> Readiness {
        if self.ready.is_cancelled() {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }
}

pub(crate) async fn serve(
    addr: SocketAddr,
    state: Arc<State>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("metrics listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

pub(crate) fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn metrics() -> String {
    mesh_controller_runtime::metrics::encode()
}

async fn readyz(AxumState(state): AxumState<Arc<State>>) -> Readiness {
    state.ready()
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Readiness {
    Ready,
    NotReady,
}

impl IntoResponse for Readiness {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Readiness::Ready => (StatusCode::OK, "Ok"),
            Readiness::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "NotReady"),
        };
        (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::Request;
    use mesh_controller_runtime::metrics::ControllerMetrics;
    use tower::ServiceExt;

    use super::*;

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_readyz_follows_ready_token() {
        let ready = CancellationToken::new();
        let app = router(Arc::new(State::new(ready.clone())));
        assert_eq!(
            get_status(app.clone(), "/readyz").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        ready.cancel();
        assert_eq!(get_status(app, "/readyz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_exposes_reconcile_counters() {
        let metrics = ControllerMetrics::new("http-test");
        drop(metrics.count_and_measure("Service"));

        let app = router(Arc::new(State::new(CancellationToken::new())));
        let res = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("reconcile_runs"));
    }
}
