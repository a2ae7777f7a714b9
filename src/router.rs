use axum::Router;
use tower_http::trace::TraceLayer;

use crate::admission::create_admission_router;
use crate::api::AppState;
use crate::document::create_document_router;
use crate::financial_aid::create_financial_aid_router;
use crate::holds::create_holds_router;

/// Prefix every OnBase route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// All OnBase routes, nested under [`API_PREFIX`] and traced.
pub fn create_router(state: AppState) -> Router {
    let onbase = Router::new()
        .merge(create_admission_router(state.clone()))
        .merge(create_financial_aid_router(state.clone()))
        .merge(create_holds_router(state.clone()))
        .merge(create_document_router(state));
    Router::new()
        .nest(API_PREFIX, onbase)
        .layer(TraceLayer::new_for_http())
}
