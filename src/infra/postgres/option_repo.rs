use {
    crate::domain::{
        error::BookingError,
        fee::{FeeCategory, FeeOption, FeeOptionSpec},
        money::MoneyAmount,
    },
    sqlx::{PgExecutor, Postgres, Transaction},
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct FeeOptionRow {
    id: Uuid,
    event_id: Uuid,
    category: String,
    label: String,
    price_cents: i64,
    required: bool,
    selectable: bool,
    active: bool,
    sort_order: i32,
}

impl TryFrom<FeeOptionRow> for FeeOption {
    type Error = BookingError;

    fn try_from(row: FeeOptionRow) -> Result<Self, Self::Error> {
        Ok(FeeOption {
            id: row.id,
            event_id: row.event_id,
            category: FeeCategory::try_from(row.category.as_str())?,
            label: row.label,
            price: MoneyAmount::new(row.price_cents)?,
            required: row.required,
            selectable: row.selectable,
            active: row.active,
            sort_order: row.sort_order,
        })
    }
}

const SELECT_OPTION: &str = "SELECT id, event_id, category, label, price_cents, required, \
     selectable, active, sort_order FROM fee_options";

pub async fn list_active<'e>(
    ex: impl PgExecutor<'e>,
    event_id: Uuid,
) -> Result<Vec<FeeOption>, BookingError> {
    let rows = sqlx::query_as::<_, FeeOptionRow>(&format!(
        "{SELECT_OPTION} WHERE event_id = $1 AND active ORDER BY sort_order, id"
    ))
    .bind(event_id)
    .fetch_all(ex)
    .await?;

    rows.into_iter().map(FeeOption::try_from).collect()
}

/// Insert or update the single option for (event, category). An existing
/// row keeps its sort position unless it never had one.
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    spec: &FeeOptionSpec,
) -> Result<(), BookingError> {
    sqlx::query(
        "INSERT INTO fee_options \
             (id, event_id, category, label, price_cents, required, selectable, active, sort_order) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (event_id, category) DO UPDATE SET \
             label = EXCLUDED.label, \
             price_cents = EXCLUDED.price_cents, \
             required = EXCLUDED.required, \
             selectable = EXCLUDED.selectable, \
             active = EXCLUDED.active, \
             sort_order = CASE WHEN fee_options.sort_order = 0 \
                 THEN EXCLUDED.sort_order ELSE fee_options.sort_order END",
    )
    .bind(Uuid::now_v7())
    .bind(event_id)
    .bind(spec.category.as_str())
    .bind(&spec.label)
    .bind(spec.price.cents())
    .bind(spec.flags.required)
    .bind(spec.flags.selectable)
    .bind(spec.flags.active)
    .bind(spec.category.default_sort_order())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Soft-disable options whose category is absent from a replace payload.
/// Never a hard delete: charged-option snapshots may still reference them.
pub async fn deactivate_absent(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    present: &[FeeCategory],
) -> Result<(), BookingError> {
    let present: Vec<String> = present.iter().map(|c| c.as_str().to_string()).collect();
    sqlx::query(
        "UPDATE fee_options SET active = false WHERE event_id = $1 AND category <> ALL($2)",
    )
    .bind(event_id)
    .bind(&present)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
