use {
    crate::domain::{
        booking::{self, BookingStatus, CancelDecision},
        error::BookingError,
        gateway::PaymentGateway,
        money::{Currency, Money, MoneyAmount},
    },
    crate::infra::postgres::{booking_repo, event_repo},
    crate::services::booking_flow::cancel_if_cancelable,
    chrono::Utc,
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub user_id: String,
    pub event_id: Uuid,
    pub cancellation_fee_cents: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub status: BookingStatus,
    pub currency: Currency,
    pub refund: Option<MoneyAmount>,
    pub fee: Option<MoneyAmount>,
}

/// Cancel the caller's booking for an event.
///
/// PENDING: the local CANCELED transition commits first and is
/// authoritative; the gateway-side intent cancel runs afterwards,
/// best-effort. PAID: the refund is issued first, and REFUNDED only commits
/// once the gateway accepted it.
pub async fn cancel(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    req: CancelRequest,
) -> Result<CancelOutcome, BookingError> {
    let event = event_repo::find(pool, req.event_id)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("event {}", req.event_id)))?;

    let booking = booking_repo::find_by_user_event(pool, &req.user_id, req.event_id)
        .await?
        .ok_or_else(|| BookingError::NotFound("no booking for this event".into()))?;

    let decision = booking::decide_cancellation(
        &booking,
        req.cancellation_fee_cents,
        event.start_time,
        Utc::now(),
    )?;

    match decision {
        CancelDecision::ReleasePending => {
            let stale_intent = booking.intent_id.clone();

            let mut tx = pool.begin().await?;
            booking_repo::set_lock_timeout(&mut tx).await?;
            booking_repo::acquire_key_lock(
                &mut tx,
                &booking_repo::slot_key(&req.user_id, req.event_id),
            )
            .await?;
            booking_repo::mark_canceled(&mut tx, booking.id).await?;
            booking_repo::delete_charged_options(&mut tx, booking.id).await?;
            tx.commit().await?;

            tracing::info!(booking_id = %booking.id, "booking canceled");

            if let Some(intent) = stale_intent {
                cancel_if_cancelable(gateway, &intent).await;
            }

            Ok(CancelOutcome {
                status: BookingStatus::Canceled,
                currency: booking.currency,
                refund: None,
                fee: None,
            })
        }
        CancelDecision::RefundPaid { fee, refund } => {
            // Money moves before the status does. A gateway failure here
            // surfaces to the caller with local state untouched.
            if !refund.is_zero() {
                let intent = booking.intent_id.as_ref().ok_or_else(|| {
                    BookingError::Validation("paid booking has no gateway intent".into())
                })?;
                gateway
                    .refund(intent, Money::new(refund, booking.currency))
                    .await?;
            }

            let mut tx = pool.begin().await?;
            booking_repo::set_lock_timeout(&mut tx).await?;
            booking_repo::acquire_key_lock(
                &mut tx,
                &booking_repo::slot_key(&req.user_id, req.event_id),
            )
            .await?;
            booking_repo::mark_refunded(&mut tx, booking.id).await?;
            booking_repo::delete_charged_options(&mut tx, booking.id).await?;
            tx.commit().await?;

            tracing::info!(
                booking_id = %booking.id,
                refund = %refund,
                fee = %fee,
                "booking refunded"
            );

            Ok(CancelOutcome {
                status: BookingStatus::Refunded,
                currency: booking.currency,
                refund: Some(refund),
                fee: Some(fee),
            })
        }
    }
}
