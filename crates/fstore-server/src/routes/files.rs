//! # `/files` Resource
//!
//! One path, dispatched on method and the optional `?action=` query:
//!
//! | Method | Action | Operation |
//! |--------|--------|-----------|
//! | GET | – | list stored files |
//! | GET | `wc` | total word count (plain text) |
//! | GET | `freq-words` | top words by count |
//! | POST, PUT | `try_with_sha256` | dedup negotiation |
//! | POST, PUT | – | multipart bulk upload |
//! | DELETE | – | delete named files |
//!
//! Any other action is a 400. Filesystem work runs on the blocking pool.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use fstore_core::protocol::{
    Action, FileDeletionResponse, FileList, TryWithSha256Request, WordCountResponse, FILES_PATH,
    FREQ_WORDS_LIMIT,
};

use crate::dedup::{self, DedupIndex};
use crate::error::AppError;
use crate::state::AppState;
use crate::{stats, upload};

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
}

impl ActionQuery {
    fn parse(&self) -> Result<Option<Action>, AppError> {
        match self.action.as_deref() {
            None => Ok(None),
            Some(raw) => Action::parse(raw)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest(format!("unknown action: {raw:?}"))),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        FILES_PATH,
        get(list_or_stats)
            .post(store_files)
            .put(store_files)
            .delete(delete_files),
    )
}

/// Run filesystem work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

async fn read_json<T: DeserializeOwned>(request: Request, state: &AppState) -> Result<T, AppError> {
    let body = Bytes::from_request(request, state).await?;
    Ok(serde_json::from_slice(&body)?)
}

fn storage_error(context: &str) -> impl FnOnce(std::io::Error) -> AppError + '_ {
    move |e| AppError::Storage(format!("{context}: {e}"))
}

async fn list_or_stats(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    match query.parse()? {
        None => {
            let files = blocking(move || {
                store.list().map_err(storage_error("failed to list storage root"))
            })
            .await?;
            tracing::debug!(count = files.len(), "listed files");
            Ok(Json(FileList { files }).into_response())
        }
        Some(Action::WordCount) => {
            let count = blocking(move || {
                stats::word_count(&store).map_err(storage_error("failed to count words"))
            })
            .await?;
            tracing::info!(words = count, "word count");
            Ok(count.to_string().into_response())
        }
        Some(Action::FreqWords) => {
            let word_count_pairs = blocking(move || {
                stats::frequent_words(&store, FREQ_WORDS_LIMIT)
                    .map_err(storage_error("failed to count words"))
            })
            .await?;
            Ok(Json(WordCountResponse { word_count_pairs }).into_response())
        }
        Some(other) => Err(AppError::BadRequest(format!(
            "action {other} is not valid for GET"
        ))),
    }
}

async fn store_files(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    request: Request,
) -> Result<Response, AppError> {
    match query.parse()? {
        Some(Action::TryWithSha256) => negotiate(&state, request).await,
        None => {
            let multipart = Multipart::from_request(request, &state).await?;
            let summary =
                upload::receive(&state.store, multipart, state.config.verify_uploads).await?;
            state
                .metrics
                .record_upload(summary.files.len() as u64, summary.bytes);
            tracing::info!(
                files = summary.files.len(),
                bytes = summary.bytes,
                "bulk upload committed"
            );
            Ok(StatusCode::OK.into_response())
        }
        Some(other) => Err(AppError::BadRequest(format!(
            "action {other} is not valid for POST or PUT"
        ))),
    }
}

async fn negotiate(state: &AppState, request: Request) -> Result<Response, AppError> {
    let body: TryWithSha256Request = read_json(request, state).await?;
    let requested = body.file_sha256_pairs.len();

    let store = state.store.clone();
    let resolutions = blocking(move || {
        let index = DedupIndex::build(&store).map_err(storage_error("failed to index storage root"))?;
        tracing::debug!(digests = index.len(), "built dedup index");
        Ok(dedup::resolve(&store, &index, body.file_sha256_pairs))
    })
    .await?;

    for resolution in &resolutions {
        state.metrics.record_dedup_outcome(resolution.outcome.label());
    }
    let response = dedup::unresolved(&resolutions);
    tracing::info!(
        requested,
        unresolved = response.unsuccessful_file_names.len(),
        "dedup negotiation complete"
    );
    Ok(Json(response).into_response())
}

async fn delete_files(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<FileDeletionResponse>, AppError> {
    let body: FileList = read_json(request, &state).await?;
    let store = state.store.clone();
    let unsuccessful_file_names = blocking(move || Ok(store.delete(&body.files))).await?;
    Ok(Json(FileDeletionResponse {
        unsuccessful_file_names,
    }))
}
