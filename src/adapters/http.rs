use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            booking::ChargedOption,
            error::BookingError,
            fee::{FeeCategory, FeeOption, FeeOptionSpec},
            money::MoneyAmount,
        },
        services::{booking_flow, cancellation, catalog},
    },
    axum::{
        Json,
        extract::{FromRequestParts, Path, State},
        http::{StatusCode, request::Parts},
    },
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Opaque caller identity set by the upstream auth layer. Token
/// verification itself is not this service's job.
pub struct CallerIdentity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| CallerIdentity(s.to_string()))
            .ok_or_else(|| ApiError(BookingError::Validation("missing x-user-id header".into())))
    }
}

// ── Booking ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BookRequestBody {
    #[serde(default)]
    pub selected_option_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChargedOptionBody {
    pub id: Uuid,
    pub category: FeeCategory,
    pub label: String,
    pub price_cents: i64,
}

impl From<ChargedOption> for ChargedOptionBody {
    fn from(o: ChargedOption) -> Self {
        Self {
            id: o.fee_option_id,
            category: o.category,
            label: o.label,
            price_cents: o.price.cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookResponseBody {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub amount_to_pay_cents: i64,
    pub currency: String,
    pub gateway_intent_id: String,
    pub gateway_client_secret: String,
    pub charged_options: Vec<ChargedOptionBody>,
}

pub async fn book(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    caller: CallerIdentity,
    Json(body): Json<BookRequestBody>,
) -> Result<(StatusCode, Json<BookResponseBody>), ApiError> {
    let confirmation = booking_flow::book(
        &state.pool,
        state.gateway.as_ref(),
        booking_flow::BookingRequest {
            user_id: caller.0,
            event_id,
            selected_option_ids: body.selected_option_ids,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponseBody {
            booking_id: confirmation.booking_id,
            event_id,
            amount_to_pay_cents: confirmation.amount_due.cents(),
            currency: confirmation.currency.as_str().to_string(),
            gateway_intent_id: confirmation.intent_id.into_inner(),
            gateway_client_secret: confirmation.client_secret,
            charged_options: confirmation
                .charged_options
                .into_iter()
                .map(ChargedOptionBody::from)
                .collect(),
        }),
    ))
}

// ── Cancellation ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CancelRequestBody {
    pub event_id: Uuid,
    pub cancellation_fee_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponseBody {
    pub event_id: Uuid,
    pub status: String,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_fee_cents: Option<i64>,
}

pub async fn cancel(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<CancelRequestBody>,
) -> Result<Json<CancelResponseBody>, ApiError> {
    let outcome = cancellation::cancel(
        &state.pool,
        state.gateway.as_ref(),
        cancellation::CancelRequest {
            user_id: caller.0,
            event_id: body.event_id,
            cancellation_fee_cents: body.cancellation_fee_cents,
        },
    )
    .await?;

    Ok(Json(CancelResponseBody {
        event_id: body.event_id,
        status: outcome.status.as_str().to_string(),
        currency: outcome.currency.as_str().to_string(),
        refund_amount_cents: outcome.refund.map(|r| r.cents()),
        cancellation_fee_cents: outcome.fee.map(|f| f.cents()),
    }))
}

// ── Fee options ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OptionEntryBody {
    pub category: String,
    pub label: Option<String>,
    pub price_cents: i64,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ReplaceOptionsBody {
    pub options: Vec<OptionEntryBody>,
}

#[derive(Debug, Serialize)]
pub struct OptionBody {
    pub id: Uuid,
    pub category: FeeCategory,
    pub label: String,
    pub price_cents: i64,
    pub required: bool,
    pub selectable: bool,
    pub active: bool,
}

impl From<FeeOption> for OptionBody {
    fn from(o: FeeOption) -> Self {
        Self {
            id: o.id,
            category: o.category,
            label: o.label,
            price_cents: o.price.cents(),
            required: o.required,
            selectable: o.selectable,
            active: o.active,
        }
    }
}

pub async fn replace_options(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(body): Json<ReplaceOptionsBody>,
) -> Result<Json<Vec<OptionBody>>, ApiError> {
    let mut specs = Vec::with_capacity(body.options.len());
    for entry in body.options {
        let category = FeeCategory::try_from(entry.category.as_str())?;
        let price = MoneyAmount::new(entry.price_cents)?;
        specs.push(FeeOptionSpec::new(category, entry.label, price, entry.active));
    }

    let options = catalog::replace_options(&state.pool, event_id, specs).await?;
    Ok(Json(options.into_iter().map(OptionBody::from).collect()))
}

pub async fn list_options(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<OptionBody>>, ApiError> {
    let options = catalog::active_options(&state.pool, event_id).await?;
    Ok(Json(options.into_iter().map(OptionBody::from).collect()))
}
