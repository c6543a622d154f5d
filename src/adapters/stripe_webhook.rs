use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        adapters::stripe_gateway::convert_currency,
        domain::{
            error::BookingError,
            gateway::{GatewayNotice, NoticeKind},
            id::{GatewayEventId, IntentId},
            money::{Money, MoneyAmount},
        },
        services::reconciler::{self, ReconcileOutcome},
    },
    axum::{Json, extract::State, http::HeaderMap},
    uuid::Uuid,
};

fn settled_money(pi: &stripe::PaymentIntent) -> Result<Money, BookingError> {
    let amount = MoneyAmount::new(pi.amount)?;
    let currency = convert_currency(pi.currency)?;
    Ok(Money::new(amount, currency))
}

fn expandable_intent_id(e: &stripe::Expandable<stripe::PaymentIntent>) -> Result<IntentId, BookingError> {
    IntentId::new(match e {
        stripe::Expandable::Id(id) => id.to_string(),
        stripe::Expandable::Object(pi) => pi.id.to_string(),
    })
}

/// Unauthenticated by design; the payload signature is the trust boundary.
/// Structurally valid, signature-verified input is always acknowledged with
/// 200 so the gateway does not retry indefinitely.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn stripe_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sig = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BookingError::WebhookSignature("missing Stripe-Signature header".into()))?;

    let event = stripe::Webhook::construct_event(&body, sig, &state.stripe_webhook_secret)
        .map_err(|e| BookingError::WebhookSignature(e.to_string()))?;

    let event_id = event.id.to_string();
    let raw: serde_json::Value = serde_json::from_str(&body).map_err(BookingError::from)?;
    let event_type = raw
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    // Event context on the span so subsequent logs are correlated.
    tracing::Span::current()
        .record("event_id", tracing::field::display(&event_id))
        .record("event_type", tracing::field::display(&event_type));

    let notice = match event.data.object {
        stripe::EventObject::PaymentIntent(ref pi) => {
            let kind = match event_type.as_str() {
                "payment_intent.succeeded" => match settled_money(pi) {
                    Ok(settled) => NoticeKind::PaymentSucceeded { settled },
                    Err(BookingError::Validation(msg)) => {
                        tracing::warn!("skipping invalid intent data: {msg}");
                        return Ok(Json(serde_json::json!({"status": "ignored_invalid_data"})));
                    }
                    Err(e) => return Err(e.into()),
                },
                "payment_intent.payment_failed" => NoticeKind::PaymentFailed,
                _ => {
                    tracing::info!("unsupported intent event, acknowledged");
                    return Ok(Json(serde_json::json!({"status": "ignored"})));
                }
            };

            let booking_ref = pi
                .metadata
                .get("booking_id")
                .and_then(|s| Uuid::parse_str(s).ok());

            GatewayNotice {
                event_id: GatewayEventId::new(event_id.as_str())?,
                event_type: event_type.clone(),
                kind,
                booking_ref,
                intent_id: Some(IntentId::new(pi.id.to_string())?),
                raw,
            }
        }
        stripe::EventObject::Charge(ref charge) if event_type == "charge.refunded" => {
            // Refund notices carry no correlation metadata; the stored
            // intent id is the lookup key.
            let intent_id = match charge.payment_intent.as_ref() {
                Some(e) => match expandable_intent_id(e) {
                    Ok(id) => Some(id),
                    Err(BookingError::Validation(msg)) => {
                        tracing::warn!("skipping invalid charge data: {msg}");
                        return Ok(Json(serde_json::json!({"status": "ignored_invalid_data"})));
                    }
                    Err(e) => return Err(e.into()),
                },
                None => None,
            };

            GatewayNotice {
                event_id: GatewayEventId::new(event_id.as_str())?,
                event_type: event_type.clone(),
                kind: NoticeKind::ChargeRefunded,
                booking_ref: None,
                intent_id,
                raw,
            }
        }
        _ => {
            tracing::info!("unsupported event, acknowledged");
            return Ok(Json(serde_json::json!({"status": "ignored"})));
        }
    };

    let status = match reconciler::apply(&state.pool, state.gateway.as_ref(), notice).await? {
        ReconcileOutcome::Applied { booking_id, status } => {
            tracing::info!(booking_id = %booking_id, status = %status, "notice applied");
            "applied"
        }
        ReconcileOutcome::OverCapacity { booking_id } => {
            tracing::warn!(booking_id = %booking_id, "settlement over capacity");
            "over_capacity"
        }
        ReconcileOutcome::Duplicate => {
            tracing::info!("duplicate event, already processed");
            "duplicate"
        }
        ReconcileOutcome::Ignored { reason } => {
            tracing::info!(reason, "notice ignored");
            "ignored"
        }
        ReconcileOutcome::Unmatched => "unmatched",
    };

    Ok(Json(serde_json::json!({"status": status})))
}
