use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;
use crate::media::recipe_image_path;

pub fn media_router() -> Router {
    Router::new().route("/media/recipes/:file_name", get(recipe_image))
}

async fn recipe_image(
    Path(file_name): Path<String>,
    Extension(config): Extension<Arc<Config>>,
) -> Result<impl IntoResponse, ApiError> {
    let not_found = || ApiError::NotFound("Not found".into());

    let path = recipe_image_path(&config.media_root, &file_name).ok_or_else(not_found)?;
    let file = tokio::fs::File::open(&path).await.map_err(|err| {
        debug!(path = %path.display(), error = %err, "Media file unavailable");
        not_found()
    })?;

    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}
