use axum::response::IntoResponse;

// axum handler for /
pub async fn root() -> impl IntoResponse {
    format!("Hello from {}", env!("CARGO_PKG_NAME"))
}
