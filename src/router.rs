use std::future::ready;

use axum::http::{Method, StatusCode};
use axum::{routing::get, Router};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let export_prometheus = state.export_prometheus;

    // Permissive policy; the lookup API is read-only and public.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_origin(AllowOrigin::mirror_request());

    let status_router = Router::new()
        .route("/_readiness", get(|| ready(StatusCode::OK)))
        .route("/_liveness", get(|| ready("ok")));

    let lookup_router = Router::new()
        .route("/cep/:cep", get(api::lookup_cep))
        .route("/ceps", get(api::list_ceps))
        .route("/stats", get(api::stats));

    let router = Router::new()
        .route("/", get(api::index))
        .merge(status_router)
        .merge(lookup_router)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .layer(cors)
        .with_state(state);

    // Don't install the recorder unless asked to; a global recorder does not
    // play well with the crate being used as a library in tests.
    if export_prometheus {
        let recorder_handle = setup_metrics_recorder();
        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
