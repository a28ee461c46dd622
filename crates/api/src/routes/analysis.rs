//! Route definitions for the `/analysis` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use retinoscan_core::analysis::MAX_IMAGE_BYTES;

use crate::handlers::analysis;
use crate::state::AppState;

/// Request body cap for uploads: the largest accepted image plus room for
/// the multipart framing and patient fields. Anything between the image
/// limit and this cap reaches validation and gets a descriptive error.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 2 * 1024 * 1024;

/// Routes mounted at `/analysis`.
///
/// ```text
/// POST   /upload   -> upload_analysis
/// GET    /         -> list_analyses
/// GET    /{id}     -> get_analysis
/// DELETE /{id}     -> delete_analysis
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(analysis::upload_analysis).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/", get(analysis::list_analyses))
        .route(
            "/{id}",
            get(analysis::get_analysis).delete(analysis::delete_analysis),
        )
}
