use std::sync::Arc;

use axum::{extract::State, response::Json, Extension};
use tracing::debug;

use shared_models::{
    auth::{Role, User},
    error::AppError,
};
use shared_utils::extractor::require_role;

use crate::{QueueStats, TaskWorker};

#[axum::debug_handler]
pub async fn queue_stats(
    State(worker): State<Arc<TaskWorker>>,
    Extension(user): Extension<User>,
) -> Result<Json<QueueStats>, AppError> {
    require_role(&user, &[Role::Admin])?;
    debug!("Queue stats requested by {}", user.id);

    Ok(Json(worker.stats().await?))
}
