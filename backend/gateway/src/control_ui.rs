//! Static asset serving for the browser client.

use axum::response::Redirect;
use std::path::Path;
use tower_http::services::ServeDir;

/// Entry page of the bundled client.
pub const INDEX_PATH: &str = "/static/index.html";

/// `GET /` sends browsers to the client page.
pub async fn index() -> Redirect {
    Redirect::to(INDEX_PATH)
}

/// Service serving files from `dir`, mounted under `/static`.
pub fn static_files(dir: &Path) -> ServeDir {
    ServeDir::new(dir)
}
