use axum::Router;
use utoipa::openapi::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;

/// Serves the UI at `/swagger-ui` and the document at `/api-docs/openapi.json`.
pub fn create_swagger_ui(openapi: OpenApi) -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
}
