use {
    crate::domain::{error::BookingError, money::Currency},
    chrono::{DateTime, Utc},
    sqlx::PgExecutor,
    uuid::Uuid,
};

/// The slice of an event this subsystem reads. Event CRUD itself lives with
/// an external collaborator.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub currency: Currency,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    start_time: DateTime<Utc>,
    max_participants: Option<i32>,
    currency: String,
}

impl TryFrom<EventRow> for EventRecord {
    type Error = BookingError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(EventRecord {
            id: row.id,
            title: row.title,
            start_time: row.start_time,
            max_participants: row.max_participants,
            currency: Currency::try_from(row.currency.as_str())?,
        })
    }
}

pub async fn find<'e>(
    ex: impl PgExecutor<'e>,
    event_id: Uuid,
) -> Result<Option<EventRecord>, BookingError> {
    let row = sqlx::query_as::<_, EventRow>(
        "SELECT id, title, start_time, max_participants, currency FROM events WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(ex)
    .await?;

    row.map(EventRecord::try_from).transpose()
}
