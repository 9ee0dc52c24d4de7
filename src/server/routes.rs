use axum::extract::State;
use axum::response::Html;
use axum::Json;
use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::error::{ServerError, ServerResult};
use super::AppState;
use crate::keywords::KeywordScore;
use crate::search::ScoredMatch;

/// A validated `/nearest_prompts` body. The query text sits under the key
/// named by `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub field: String,
    pub filename: String,
    pub model_name: String,
    pub n: usize,
    pub query: String,
}

fn required_str(object: &Map<String, Value>, key: &str) -> ServerResult<String> {
    match object.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ServerError::BadRequest(format!("'{key}' must be a string"))),
        None => Err(ServerError::BadRequest(format!("missing '{key}'"))),
    }
}

impl RetrievalRequest {
    pub fn parse(body: &str) -> ServerResult<Self> {
        let value: Value = serde_json::from_str(body)?;
        let object = value
            .as_object()
            .ok_or_else(|| ServerError::BadRequest("request body must be a JSON object".into()))?;

        let field = required_str(object, "field")?;
        let filename = required_str(object, "filename")?;
        let model_name = required_str(object, "model_name")?;
        let n = object
            .get("n")
            .and_then(Value::as_u64)
            .ok_or_else(|| ServerError::BadRequest("'n' must be a non-negative integer".into()))?;
        let query = match object.get(&field) {
            Some(Value::String(text)) => text.clone(),
            Some(_) => {
                return Err(ServerError::BadRequest(format!(
                    "query field '{field}' must be a string"
                )))
            }
            None => {
                return Err(ServerError::BadRequest(format!(
                    "request names '{field}' as the query field but has no such key"
                )))
            }
        };

        Ok(Self {
            field,
            filename,
            model_name,
            n: usize::try_from(n).unwrap_or(usize::MAX),
            query,
        })
    }
}

/// Joins a request filename onto the data root, refusing anything that could
/// step outside it.
pub fn resolve_dataset_path(data_root: &Path, filename: &str) -> ServerResult<PathBuf> {
    let relative = Path::new(filename);
    if filename.trim().is_empty() {
        return Err(ServerError::BadRequest("'filename' is empty".into()));
    }
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ServerError::BadRequest(format!(
            "filename '{filename}' must be relative to the data root"
        )));
    }
    Ok(data_root.join(relative))
}

pub async fn index() -> Html<&'static str> {
    Html("<html><body>Hello World</body></html>")
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "models": state.picker.registry().names(),
        "cached_datasets": state.picker.store().len(),
    }))
}

pub async fn nearest_prompts(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ServerResult<Json<Vec<Value>>> {
    let request = RetrievalRequest::parse(&body)?;
    let path = resolve_dataset_path(&state.data_root, &request.filename)?;

    tracing::info!(
        field = %request.field,
        filename = %request.filename,
        model = %request.model_name,
        n = request.n,
        "nearest_prompts"
    );

    let worker = Arc::clone(&state);
    let matches = tokio::task::spawn_blocking(move || {
        worker.picker.nearest(
            &path,
            &request.field,
            &request.model_name,
            &request.query,
            request.n,
        )
    })
    .await
    .map_err(|e| ServerError::Internal(format!("search task failed: {e}")))??;

    Ok(Json(matches.into_iter().map(ScoredMatch::into_json).collect()))
}

pub async fn keywords(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ServerResult<Json<Vec<KeywordScore>>> {
    tracing::info!(chars = body.len(), "keywords");

    let worker = Arc::clone(&state);
    let keywords = tokio::task::spawn_blocking(move || worker.picker.keywords(&body))
        .await
        .map_err(|e| ServerError::Internal(format!("keyword task failed: {e}")))?;

    Ok(Json(keywords))
}
