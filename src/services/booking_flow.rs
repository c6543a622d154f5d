use {
    crate::domain::{
        booking::{Booking, BookingStatus, ChargedOption},
        error::BookingError,
        gateway::{IntentCorrelation, PaymentGateway},
        id::IntentId,
        money::{Currency, Money, MoneyAmount},
    },
    crate::infra::postgres::{booking_repo, event_repo, option_repo},
    crate::services::pricing,
    chrono::Utc,
    sqlx::PgPool,
    std::collections::HashSet,
    uuid::Uuid,
};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user_id: String,
    pub event_id: Uuid,
    pub selected_option_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub booking_id: Uuid,
    pub amount_due: MoneyAmount,
    pub currency: Currency,
    pub intent_id: IntentId,
    pub client_secret: String,
    pub charged_options: Vec<ChargedOption>,
}

/// Create a booking, or reopen the caller's non-PAID booking for the same
/// event. The local transition commits under an advisory lock on the
/// (user, event) slot; gateway calls happen strictly after the lock is
/// released.
///
/// A gateway failure after the local commit leaves the booking PENDING
/// without an intent id; the client's re-book is the recovery path.
pub async fn book(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    req: BookingRequest,
) -> Result<BookingConfirmation, BookingError> {
    let event = event_repo::find(pool, req.event_id)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("event {}", req.event_id)))?;

    let options = option_repo::list_active(pool, event.id).await?;
    if options.is_empty() {
        return Err(BookingError::Validation(
            "no fee options configured for this event".into(),
        ));
    }
    if !options.iter().any(|o| o.required) {
        return Err(BookingError::Validation(
            "event has no required fee configured".into(),
        ));
    }

    let selected: HashSet<Uuid> = req.selected_option_ids.iter().copied().collect();
    let known: HashSet<Uuid> = options.iter().map(|o| o.id).collect();
    let mut invalid: Vec<Uuid> = selected.difference(&known).copied().collect();
    if !invalid.is_empty() {
        invalid.sort();
        return Err(BookingError::Validation(format!(
            "unknown selected option ids for this event: {invalid:?}"
        )));
    }

    // Weak capacity guard: only PAID bookings hold a slot, and concurrent
    // requests may both pass. The reconciler re-checks at settlement.
    if let Some(max) = event.max_participants {
        if booking_repo::count_paid(pool, event.id).await? >= i64::from(max) {
            return Err(BookingError::Validation("event is already full".into()));
        }
    }

    let (total, charged) = pricing::price(&options, &selected);
    if total.is_zero() {
        return Err(BookingError::Validation(
            "computed total is zero; event options are misconfigured".into(),
        ));
    }

    // Local transition, serialized per (user, event) slot. No gateway I/O
    // inside this transaction.
    let mut tx = pool.begin().await?;
    booking_repo::set_lock_timeout(&mut tx).await?;
    booking_repo::acquire_key_lock(&mut tx, &booking_repo::slot_key(&req.user_id, event.id))
        .await?;

    let existing = booking_repo::find_by_user_event(&mut *tx, &req.user_id, event.id).await?;

    let (booking_id, stale_intent) = match existing {
        Some(b) if b.status == BookingStatus::Paid => {
            return Err(BookingError::Conflict(
                "event already booked and paid".into(),
            ));
        }
        Some(b) => {
            booking_repo::reset_to_pending(&mut tx, b.id, event.currency).await?;
            booking_repo::replace_charged_options(&mut tx, b.id, &charged).await?;
            (b.id, b.intent_id)
        }
        None => {
            let booking = Booking {
                id: Uuid::now_v7(),
                user_id: req.user_id.clone(),
                event_id: event.id,
                status: BookingStatus::Pending,
                intent_id: None,
                amount_paid: None,
                currency: event.currency,
                paid_at: None,
                created_at: Utc::now(),
            };
            booking_repo::insert(&mut tx, &booking).await?;
            booking_repo::replace_charged_options(&mut tx, booking.id, &charged).await?;
            (booking.id, None)
        }
    };

    tx.commit().await?;

    // Gateway cleanup of a superseded intent is best-effort; the local
    // PENDING state is already authoritative.
    if let Some(old_intent) = stale_intent {
        cancel_if_cancelable(gateway, &old_intent).await;
    }

    let created = match gateway
        .create_intent(
            Money::new(total, event.currency),
            IntentCorrelation {
                booking_id,
                event_id: event.id,
                user_id: req.user_id.clone(),
            },
        )
        .await
    {
        Ok(created) => created,
        Err(e) => {
            tracing::warn!(
                booking_id = %booking_id,
                error = %e,
                "intent creation failed, booking left pending for client retry"
            );
            return Err(e);
        }
    };

    if let Err(e) = booking_repo::set_intent(pool, booking_id, &created.intent_id).await {
        // The intent exists on the gateway but could not be recorded.
        // Surface the failure; the orphaned intent id is in the log for
        // operator cleanup, and a re-book cancels it.
        tracing::error!(
            booking_id = %booking_id,
            intent_id = %created.intent_id,
            error = %e,
            "failed to persist intent id on booking"
        );
        return Err(e);
    }

    tracing::info!(
        booking_id = %booking_id,
        intent_id = %created.intent_id,
        amount = %total,
        "booking pending, intent created"
    );

    Ok(BookingConfirmation {
        booking_id,
        amount_due: total,
        currency: event.currency,
        intent_id: created.intent_id,
        client_secret: created.client_secret,
        charged_options: charged
            .into_iter()
            .map(|o| ChargedOption {
                fee_option_id: o.id,
                category: o.category,
                label: o.label,
                price: o.price,
            })
            .collect(),
    })
}

/// Cancel a gateway intent if it is still in a cancelable state. Failures
/// are logged and swallowed: the gateway reconciles its own side, and the
/// local record no longer references this intent.
pub(crate) async fn cancel_if_cancelable(gateway: &dyn PaymentGateway, intent: &IntentId) {
    match gateway.retrieve_status(intent).await {
        Ok(status) if status.is_cancelable() => {
            if let Err(e) = gateway.cancel_intent(intent).await {
                tracing::warn!(intent_id = %intent, error = %e, "could not cancel stale intent");
            } else {
                tracing::info!(intent_id = %intent, "stale intent canceled");
            }
        }
        Ok(status) => {
            tracing::debug!(intent_id = %intent, ?status, "stale intent not cancelable");
        }
        Err(e) => {
            tracing::warn!(intent_id = %intent, error = %e, "could not retrieve stale intent");
        }
    }
}
