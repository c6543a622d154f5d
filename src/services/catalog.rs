use {
    crate::domain::{
        error::BookingError,
        fee::{FeeCategory, FeeOption, FeeOptionSpec},
    },
    crate::infra::postgres::{event_repo, option_repo},
    sqlx::PgPool,
    uuid::Uuid,
};

/// Replace an event's fee options wholesale. One entry per category at most;
/// categories absent from the payload are deactivated, never deleted.
/// Returns the resulting active option set.
pub async fn replace_options(
    pool: &PgPool,
    event_id: Uuid,
    specs: Vec<FeeOptionSpec>,
) -> Result<Vec<FeeOption>, BookingError> {
    let mut seen: Vec<FeeCategory> = Vec::with_capacity(specs.len());
    for spec in &specs {
        if seen.contains(&spec.category) {
            return Err(BookingError::Validation(format!(
                "duplicate category in payload: {}",
                spec.category
            )));
        }
        seen.push(spec.category);
    }

    let mut tx = pool.begin().await?;

    if event_repo::find(&mut *tx, event_id).await?.is_none() {
        return Err(BookingError::NotFound(format!("event {event_id}")));
    }

    for spec in &specs {
        option_repo::upsert(&mut tx, event_id, spec).await?;
    }
    option_repo::deactivate_absent(&mut tx, event_id, &seen).await?;

    tx.commit().await?;

    option_repo::list_active(pool, event_id).await
}

/// Active options for display, ordered by sort key.
pub async fn active_options(
    pool: &PgPool,
    event_id: Uuid,
) -> Result<Vec<FeeOption>, BookingError> {
    if event_repo::find(pool, event_id).await?.is_none() {
        return Err(BookingError::NotFound(format!("event {event_id}")));
    }
    option_repo::list_active(pool, event_id).await
}
