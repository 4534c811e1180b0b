use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::models::AppState;

/// Largest accepted request body; uploads are buffered whole.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

// Embed the default stylesheet in the binary
pub const DEFAULT_STYLESHEET: &str = include_str!("../static/styles.css");

pub fn build_router(state: AppState) -> Router {
    // Always serve styles.css - use custom if provided, otherwise use embedded default
    let stylesheet_content = state.custom_css.clone().unwrap_or_else(|| DEFAULT_STYLESHEET.to_string());

    let assets = Router::new()
        .route(
            "/static/styles.css",
            get(move || {
                let css = stylesheet_content.clone();
                async move { ([(CONTENT_TYPE, "text/css")], css) }
            }),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        ));

    Router::new()
        .route("/", get(handlers::hosts::index))
        .route("/add-ip", post(handlers::hosts::add_ip))
        .route("/upload-csv", get(handlers::accounts::upload_csv_get))
        .route("/upload-excel", get(handlers::accounts::upload_excel_get))
        .route("/delete-csv", get(handlers::accounts::delete_csv_get))
        .route("/delete-excel", get(handlers::accounts::delete_excel_get))
        .route("/create-users", post(handlers::accounts::create_users))
        .route("/create-users-excel", post(handlers::accounts::create_users_excel))
        .route("/delete-users", post(handlers::accounts::delete_users))
        .route("/delete-users-excel", post(handlers::accounts::delete_users_excel))
        .route("/delete-user", post(handlers::accounts::delete_user))
        .route("/delete-selected", post(handlers::accounts::delete_selected))
        .route("/delete-all", post(handlers::accounts::delete_all))
        .route("/download-users", get(handlers::downloads::download_users))
        .route("/download-all-users", get(handlers::downloads::download_all_users))
        .route("/software", get(handlers::software::software_get))
        .route("/install-software", post(handlers::software::install_software))
        .merge(assets)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
