pub mod chat;
pub mod health;
pub mod session;

use crate::utils::error::ApiError;

/// JSON 404 for every unmatched route
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

/// JSON 405 for a known path called with the wrong method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed".to_string())
}
