use std::sync::Arc;

use crate::store::addresses::AddressStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AddressStore>,
    pub export_prometheus: bool,
}
