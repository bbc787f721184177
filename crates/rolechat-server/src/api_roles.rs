//! Role lookup handlers.

use crate::AppState;
use axum::extract::{Extension, Json, Query};
use rolechat_persona::RoleSummary;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Keyword matched against title, remark and tags. Absent means all.
    #[serde(default)]
    pub q: String,
}

/// Handler for `GET /api/roles/search`.
pub async fn search_roles_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<RoleSummary>> {
    let roles: Vec<RoleSummary> = state
        .catalog
        .search(&query.q)
        .into_iter()
        .map(RoleSummary::from)
        .collect();
    tracing::debug!(keyword = %query.q, count = roles.len(), "role search");
    Json(roles)
}
