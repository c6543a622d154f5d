use {
    crate::domain::{
        booking::{settlement_action, Booking, BookingStatus, SettlementAction},
        error::BookingError,
        gateway::{GatewayNotice, NoticeKind, PaymentGateway},
    },
    crate::infra::postgres::{booking_repo, event_repo},
    chrono::Utc,
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The notice moved the booking to a new status.
    Applied {
        booking_id: Uuid,
        status: BookingStatus,
    },
    /// Settlement arrived for an already-full event: the booking was marked
    /// FAILED and the settled amount refunded.
    OverCapacity { booking_id: Uuid },
    /// Event id already processed (duplicate delivery).
    Duplicate,
    /// Guard no-op: the booking is already past this notice.
    Ignored { reason: &'static str },
    /// No booking matches the notice. Acknowledged so the gateway stops
    /// retrying.
    Unmatched,
}

/// Apply one verified gateway notice idempotently.
///
/// Processing for an intent is serialized by an advisory lock; duplicate
/// deliveries are dropped by the gateway_events ledger; everything else is
/// decided by the state machine's guards, so replays and out-of-order
/// notices cannot double-apply effects.
pub async fn apply(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    notice: GatewayNotice,
) -> Result<ReconcileOutcome, BookingError> {
    let lock_key = match (&notice.intent_id, &notice.booking_ref) {
        (Some(intent), _) => format!("intent:{intent}"),
        (None, Some(booking_ref)) => format!("booking:{booking_ref}"),
        (None, None) => {
            // Nothing to correlate on; nothing we could ever match.
            tracing::warn!(event_id = %notice.event_id, "notice carries no correlation keys");
            return Ok(ReconcileOutcome::Unmatched);
        }
    };

    let mut tx = pool.begin().await?;
    booking_repo::set_lock_timeout(&mut tx).await?;
    booking_repo::acquire_key_lock(&mut tx, &lock_key).await?;

    let is_new = booking_repo::record_gateway_event(
        &mut tx,
        notice.event_id.as_str(),
        notice.intent_id.as_ref().map(|i| i.as_str()),
        &notice.event_type,
        &notice.raw,
    )
    .await?;
    if !is_new {
        tx.commit().await?;
        return Ok(ReconcileOutcome::Duplicate);
    }

    // Correlation id from intent metadata first, stored intent id second.
    let booking = match notice.booking_ref {
        Some(booking_ref) => booking_repo::find_by_id(&mut *tx, booking_ref).await?,
        None => None,
    };
    let booking = match (booking, &notice.intent_id) {
        (Some(b), _) => Some(b),
        (None, Some(intent)) => booking_repo::find_by_intent(&mut *tx, intent).await?,
        (None, None) => None,
    };

    let Some(booking) = booking else {
        tx.commit().await?;
        tracing::info!(
            event_id = %notice.event_id,
            event_type = %notice.event_type,
            "no booking matches notice, acknowledged"
        );
        return Ok(ReconcileOutcome::Unmatched);
    };

    match settlement_action(booking.status, &notice.kind) {
        SettlementAction::Ignore(reason) => {
            tx.commit().await?;
            tracing::info!(
                booking_id = %booking.id,
                status = %booking.status,
                event_type = %notice.event_type,
                reason,
                "notice ignored by state guard"
            );
            Ok(ReconcileOutcome::Ignored { reason })
        }
        SettlementAction::MarkFailed => {
            booking_repo::mark_failed(&mut tx, booking.id).await?;
            booking_repo::delete_charged_options(&mut tx, booking.id).await?;
            tx.commit().await?;
            tracing::info!(booking_id = %booking.id, "payment failed");
            Ok(ReconcileOutcome::Applied {
                booking_id: booking.id,
                status: BookingStatus::Failed,
            })
        }
        SettlementAction::MarkRefunded => {
            booking_repo::mark_refunded(&mut tx, booking.id).await?;
            booking_repo::delete_charged_options(&mut tx, booking.id).await?;
            tx.commit().await?;
            tracing::info!(booking_id = %booking.id, "refund recorded");
            Ok(ReconcileOutcome::Applied {
                booking_id: booking.id,
                status: BookingStatus::Refunded,
            })
        }
        SettlementAction::MarkPaid => mark_paid_guarded(gateway, tx, &booking, &notice).await,
    }
}

/// The strict half of capacity enforcement: the weak creation-path check can
/// let several PENDING bookings race, so the PAID transition re-checks under
/// an advisory lock keyed by the event. Overflow settlements are refused and
/// refunded in full.
async fn mark_paid_guarded(
    gateway: &dyn PaymentGateway,
    mut tx: sqlx::Transaction<'_, sqlx::Postgres>,
    booking: &Booking,
    notice: &GatewayNotice,
) -> Result<ReconcileOutcome, BookingError> {
    let NoticeKind::PaymentSucceeded { settled } = &notice.kind else {
        unreachable!("MarkPaid only follows a success notice");
    };

    booking_repo::acquire_key_lock(&mut tx, &booking_repo::event_key(booking.event_id)).await?;

    let full = match event_repo::find(&mut *tx, booking.event_id).await? {
        Some(event) => match event.max_participants {
            Some(max) => booking_repo::count_paid(&mut *tx, booking.event_id).await? >= i64::from(max),
            None => false,
        },
        None => false,
    };

    if full {
        booking_repo::mark_failed(&mut tx, booking.id).await?;
        booking_repo::delete_charged_options(&mut tx, booking.id).await?;
        tx.commit().await?;

        tracing::warn!(
            booking_id = %booking.id,
            event_id = %booking.event_id,
            "settlement exceeds capacity, refunding in full"
        );

        // Full refund, no cancellation fee: the seat was refused, not given
        // up. Failure here is logged for operator retry; the local FAILED
        // state stands either way.
        let intent = notice.intent_id.clone().or_else(|| booking.intent_id.clone());
        match intent {
            Some(intent) => {
                if let Err(e) = gateway.refund(&intent, *settled).await {
                    tracing::error!(
                        booking_id = %booking.id,
                        intent_id = %intent,
                        error = %e,
                        "overflow refund failed, needs operator attention"
                    );
                }
            }
            None => {
                tracing::error!(booking_id = %booking.id, "overflow booking has no intent to refund");
            }
        }

        return Ok(ReconcileOutcome::OverCapacity {
            booking_id: booking.id,
        });
    }

    booking_repo::mark_paid(
        &mut tx,
        booking.id,
        settled.amount(),
        settled.currency(),
        Utc::now(),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        amount = %settled.amount(),
        "payment settled"
    );
    Ok(ReconcileOutcome::Applied {
        booking_id: booking.id,
        status: BookingStatus::Paid,
    })
}
