use {
    crate::domain::{
        booking::{Booking, BookingStatus, ChargedOption},
        error::BookingError,
        fee::{FeeCategory, FeeOption},
        id::IntentId,
        money::{Currency, MoneyAmount},
    },
    chrono::{DateTime, Utc},
    sqlx::{PgExecutor, Postgres, Transaction},
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    event_id: Uuid,
    status: String,
    intent_id: Option<String>,
    amount_paid: Option<i64>,
    currency: String,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            event_id: row.event_id,
            status: BookingStatus::try_from(row.status.as_str())?,
            intent_id: row.intent_id.map(IntentId::new).transpose()?,
            amount_paid: row.amount_paid.map(MoneyAmount::new).transpose()?,
            currency: Currency::try_from(row.currency.as_str())?,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

const SELECT_BOOKING: &str = "SELECT id, user_id, event_id, status, intent_id, amount_paid, \
     currency, paid_at, created_at FROM bookings";

// ── Locks ──────────────────────────────────────────────────────────────────

/// Bound every lock wait so a stuck peer cannot wedge a request forever.
pub async fn set_lock_timeout(tx: &mut Transaction<'_, Postgres>) -> Result<(), BookingError> {
    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Serialize all processing for one logical key. Advisory locks work even
/// when the row does not exist yet, so there is no insert race to retry.
pub async fn acquire_key_lock(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
) -> Result<(), BookingError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Lock key for the (user, event) booking slot.
pub fn slot_key(user_id: &str, event_id: Uuid) -> String {
    format!("booking:{user_id}:{event_id}")
}

/// Lock key for capacity-sensitive transitions of one event.
pub fn event_key(event_id: Uuid) -> String {
    format!("event:{event_id}")
}

// ── Reads ──────────────────────────────────────────────────────────────────

pub async fn find_by_user_event<'e>(
    ex: impl PgExecutor<'e>,
    user_id: &str,
    event_id: Uuid,
) -> Result<Option<Booking>, BookingError> {
    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "{SELECT_BOOKING} WHERE user_id = $1 AND event_id = $2"
    ))
    .bind(user_id)
    .bind(event_id)
    .fetch_optional(ex)
    .await?;

    row.map(Booking::try_from).transpose()
}

pub async fn find_by_id<'e>(
    ex: impl PgExecutor<'e>,
    booking_id: Uuid,
) -> Result<Option<Booking>, BookingError> {
    let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = $1"))
        .bind(booking_id)
        .fetch_optional(ex)
        .await?;

    row.map(Booking::try_from).transpose()
}

pub async fn find_by_intent<'e>(
    ex: impl PgExecutor<'e>,
    intent_id: &IntentId,
) -> Result<Option<Booking>, BookingError> {
    let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE intent_id = $1"))
        .bind(intent_id.as_str())
        .fetch_optional(ex)
        .await?;

    row.map(Booking::try_from).transpose()
}

/// Confirmed registrations for one event. Only PAID rows hold a slot.
pub async fn count_paid<'e>(
    ex: impl PgExecutor<'e>,
    event_id: Uuid,
) -> Result<i64, BookingError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings WHERE event_id = $1 AND status = 'paid'",
    )
    .bind(event_id)
    .fetch_one(ex)
    .await?;
    Ok(count)
}

// ── Writes ─────────────────────────────────────────────────────────────────

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    booking: &Booking,
) -> Result<(), BookingError> {
    sqlx::query(
        "INSERT INTO bookings (id, user_id, event_id, status, intent_id, amount_paid, currency, paid_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(booking.id)
    .bind(&booking.user_id)
    .bind(booking.event_id)
    .bind(booking.status.as_str())
    .bind(booking.intent_id.as_ref().map(|i| i.as_str().to_string()))
    .bind(booking.amount_paid.map(|a| a.cents()))
    .bind(booking.currency.as_str())
    .bind(booking.paid_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Reopen a non-PAID booking for a new attempt: back to PENDING with every
/// payment field cleared. The old intent id is returned to the caller for
/// best-effort gateway cleanup after commit.
pub async fn reset_to_pending(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
    currency: Currency,
) -> Result<(), BookingError> {
    sqlx::query(
        "UPDATE bookings SET status = 'pending', intent_id = NULL, amount_paid = NULL, \
         paid_at = NULL, currency = $2, updated_at = now() WHERE id = $1",
    )
    .bind(booking_id)
    .bind(currency.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Attach the freshly created gateway intent. Guarded on PENDING so a
/// webhook that raced ahead is never clobbered.
pub async fn set_intent<'e>(
    ex: impl PgExecutor<'e>,
    booking_id: Uuid,
    intent_id: &IntentId,
) -> Result<(), BookingError> {
    sqlx::query(
        "UPDATE bookings SET intent_id = $2, updated_at = now() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(booking_id)
    .bind(intent_id.as_str())
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn mark_paid(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
    amount: MoneyAmount,
    currency: Currency,
    paid_at: DateTime<Utc>,
) -> Result<(), BookingError> {
    sqlx::query(
        "UPDATE bookings SET status = 'paid', amount_paid = $2, currency = $3, paid_at = $4, \
         updated_at = now() WHERE id = $1",
    )
    .bind(booking_id)
    .bind(amount.cents())
    .bind(currency.as_str())
    .bind(paid_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn mark_failed(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
) -> Result<(), BookingError> {
    sqlx::query("UPDATE bookings SET status = 'failed', updated_at = now() WHERE id = $1")
        .bind(booking_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn mark_canceled(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
) -> Result<(), BookingError> {
    sqlx::query(
        "UPDATE bookings SET status = 'canceled', intent_id = NULL, amount_paid = NULL, \
         paid_at = NULL, updated_at = now() WHERE id = $1",
    )
    .bind(booking_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn mark_refunded(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
) -> Result<(), BookingError> {
    sqlx::query("UPDATE bookings SET status = 'refunded', updated_at = now() WHERE id = $1")
        .bind(booking_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ── Charged-option snapshots ───────────────────────────────────────────────

/// Replace a booking's snapshot wholesale. Old rows are discarded, never
/// mutated; the price stored is the price at this moment.
pub async fn replace_charged_options(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
    charged: &[FeeOption],
) -> Result<(), BookingError> {
    delete_charged_options(tx, booking_id).await?;
    for option in charged {
        sqlx::query(
            "INSERT INTO booking_options (id, booking_id, fee_option_id, price_cents) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::now_v7())
        .bind(booking_id)
        .bind(option.id)
        .bind(option.price.cents())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn delete_charged_options(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
) -> Result<(), BookingError> {
    sqlx::query("DELETE FROM booking_options WHERE booking_id = $1")
        .bind(booking_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ChargedOptionRow {
    fee_option_id: Uuid,
    category: String,
    label: String,
    price_cents: i64,
}

pub async fn charged_options<'e>(
    ex: impl PgExecutor<'e>,
    booking_id: Uuid,
) -> Result<Vec<ChargedOption>, BookingError> {
    let rows = sqlx::query_as::<_, ChargedOptionRow>(
        "SELECT bo.fee_option_id, fo.category, fo.label, bo.price_cents \
         FROM booking_options bo \
         JOIN fee_options fo ON fo.id = bo.fee_option_id \
         WHERE bo.booking_id = $1 \
         ORDER BY fo.sort_order, fo.id",
    )
    .bind(booking_id)
    .fetch_all(ex)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(ChargedOption {
                fee_option_id: row.fee_option_id,
                category: FeeCategory::try_from(row.category.as_str())?,
                label: row.label,
                price: MoneyAmount::new(row.price_cents)?,
            })
        })
        .collect()
}

// ── Gateway-event ledger ───────────────────────────────────────────────────

/// Record a webhook delivery. Returns false when the event id was already
/// processed (duplicate delivery).
pub async fn record_gateway_event(
    tx: &mut Transaction<'_, Postgres>,
    event_id: &str,
    intent_id: Option<&str>,
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<bool, BookingError> {
    let inserted = sqlx::query_scalar::<_, bool>(
        "INSERT INTO gateway_events (event_id, intent_id, event_type, payload) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (event_id) DO NOTHING \
         RETURNING true",
    )
    .bind(event_id)
    .bind(intent_id)
    .bind(event_type)
    .bind(payload)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(inserted.is_some())
}
