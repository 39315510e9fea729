//! Current-user lookup.

use crate::error::ApiError;
use crate::models::UserSummary;
use crate::transport::{Transport, get_json};

/// Fetch the authenticated user (`GET /me`).
pub async fn current_user(transport: &dyn Transport) -> Result<UserSummary, ApiError> {
    get_json(transport, "/me").await
}
