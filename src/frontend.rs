use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

// Embedded static pages plus the playlist cover image.
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Assets;

pub async fn serve_assets(uri: Uri) -> impl IntoResponse {
    let path = uri.path().trim_start_matches('/');

    if let Some(content) = Assets::get(path) {
        return serve_asset(path, content.data.into_owned());
    }

    // The site root serves the landing page.
    if path.is_empty() {
        if let Some(content) = Assets::get("index.html") {
            return serve_asset("index.html", content.data.into_owned());
        }
    }

    not_found()
}

fn serve_asset(path: &str, data: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CACHE_CONTROL, "public, max-age=0, must-revalidate")
        .body(Body::from(data))
        .unwrap()
}

fn not_found() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::from("404 Not Found"))
        .unwrap()
}
