use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::router::router;
use crate::state::AppState;
use crate::store::addresses::AddressStore;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = match AddressStore::open(&config.db_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(%err, path = %config.db_path, "failed to open address store");
            return;
        }
    };

    let state = AppState {
        store,
        export_prometheus: config.export_prometheus,
    };

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    let app = router(state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap()
}
