use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::dne::cep::normalize_cep;
use crate::dne::record::AddressDocument;
use crate::metrics_const::LOOKUP_REQUESTS_COUNTER;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("CEP must contain exactly 8 digits")]
    InvalidCep,

    #[error("CEP not found")]
    NotFound,

    #[error("store read failed")]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let status = match self {
            LookupError::InvalidCep => StatusCode::BAD_REQUEST,
            LookupError::NotFound => StatusCode::NOT_FOUND,
            LookupError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn index() -> &'static str {
    "cep lookup service"
}

pub async fn lookup_cep(
    State(state): State<AppState>,
    Path(cep): Path<String>,
) -> Result<Json<AddressDocument>, LookupError> {
    let Some(normalized) = normalize_cep(&cep) else {
        counter!(LOOKUP_REQUESTS_COUNTER, "outcome" => "invalid").increment(1);
        return Err(LookupError::InvalidCep);
    };

    match state.store.get(&normalized) {
        Ok(Some(document)) => {
            counter!(LOOKUP_REQUESTS_COUNTER, "outcome" => "hit").increment(1);
            Ok(Json(document))
        }
        Ok(None) => {
            counter!(LOOKUP_REQUESTS_COUNTER, "outcome" => "miss").increment(1);
            Err(LookupError::NotFound)
        }
        Err(err) => {
            error!(cep = %normalized, %err, "store read failed");
            Err(LookupError::Store(err))
        }
    }
}

const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub prefix: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub total: usize,
    pub data: Vec<AddressDocument>,
}

pub async fn list_ceps(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, LookupError> {
    let limit = params.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let store = state.store.clone();
    let documents = tokio::task::spawn_blocking(move || store.list(&params.prefix, limit))
        .await
        .map_err(|err| LookupError::Store(err.into()))??;

    Ok(Json(ListResponse {
        total: documents.len(),
        data: documents,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_ceps: u64,
    pub por_uf: BTreeMap<String, u64>,
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, LookupError> {
    let store = state.store.clone();
    let (total_ceps, por_uf) = tokio::task::spawn_blocking(move || store.uf_breakdown())
        .await
        .map_err(|err| LookupError::Store(err.into()))??;

    Ok(Json(StatsResponse { total_ceps, por_uf }))
}
