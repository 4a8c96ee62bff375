// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod download;
pub mod health;
pub mod transfers;
pub mod upload;
pub mod users;

/// Extra multipart headroom on top of the configured file-size ceiling.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = (state.policy.max_upload_bytes + MULTIPART_OVERHEAD) as usize;

    let api_routes = Router::new()
        .route("/upload", post(upload::upload))
        .route("/upload/{transfer_id}", post(upload::complete_upload))
        .route(
            "/download/{transfer_id}",
            get(download::download).delete(download::delete),
        )
        .route(
            "/transfers",
            get(transfers::list_transfers).post(transfers::create_transfer),
        )
        .route("/auth/signup", post(users::signup))
        .route("/auth/signin", post(users::signin))
        .route("/auth/oauth", post(users::oauth_bridge))
        .route("/users/me", get(users::me))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        upload::upload,
        upload::complete_upload,
        download::download,
        download::delete,
        transfers::list_transfers,
        transfers::create_transfer,
        users::signup,
        users::signin,
        users::oauth_bridge,
        users::me,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            upload::UploadResponse,
            download::DeleteResponse,
            transfers::TransferSummary,
            transfers::Pagination,
            transfers::TransferStats,
            transfers::ListTransfersResponse,
            transfers::CreateTransferRequest,
            transfers::CreateTransferResponse,
            users::SignupRequest,
            users::SignupResponse,
            users::SigninRequest,
            users::SessionResponse,
            users::OauthBridgeRequest,
            users::MeResponse,
            users::UserView,
            health::ReadyResponse,
            health::HealthResponse,
            crate::storage::TransferStatus
        )
    ),
    tags(
        (name = "Upload", description = "File upload and two-phase completion"),
        (name = "Download", description = "Decrypted download and deletion"),
        (name = "Transfers", description = "Listing, stats, and pre-registration"),
        (name = "Auth", description = "Accounts and sessions"),
        (name = "Health", description = "Probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
