mod common;

use common::*;
use event_pay::domain::booking::BookingStatus;
use event_pay::domain::error::BookingError;
use event_pay::infra::postgres::booking_repo;
use event_pay::services::booking_flow::{self, BookingRequest};
use event_pay::services::cancellation::{self, CancelRequest};

fn request(user: &str, event_id: uuid::Uuid, selected: Vec<uuid::Uuid>) -> BookingRequest {
    BookingRequest {
        user_id: user.into(),
        event_id,
        selected_option_ids: selected,
    }
}

// ── 1. booking_with_travel_charges_all_three ───────────────────────────────

#[tokio::test]
async fn booking_with_travel_charges_all_three() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    let (_, travel, _) = seed_standard_options(&pool, event).await;

    let confirmation = booking_flow::book(&pool, &gateway, request("user_a", event, vec![travel]))
        .await
        .unwrap();

    assert_eq!(confirmation.amount_due.cents(), 8000);
    assert_eq!(confirmation.charged_options.len(), 3);
    assert!(confirmation.intent_id.as_str().starts_with("pi_mock_"));

    let row = get_booking(&pool, "user_a", event).await.unwrap();
    assert_eq!(row.status, "pending");
    assert_eq!(row.intent_id.as_deref(), Some(confirmation.intent_id.as_str()));
    assert_eq!(row.amount_paid, None);

    // Snapshot rows carry the price as charged.
    let snapshot = booking_repo::charged_options(&pool, row.id).await.unwrap();
    let mut prices: Vec<i64> = snapshot.iter().map(|o| o.price.cents()).collect();
    prices.sort();
    assert_eq!(prices, vec![1000, 2000, 5000]);
}

// ── 2. empty_selection_charges_required_only ───────────────────────────────

#[tokio::test]
async fn empty_selection_charges_required_only() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;

    let confirmation = booking_flow::book(&pool, &gateway, request("user_b", event, vec![]))
        .await
        .unwrap();

    assert_eq!(confirmation.amount_due.cents(), 6000);
    assert_eq!(confirmation.charged_options.len(), 2);
}

// ── 3. unknown_option_id_rejected ──────────────────────────────────────────

#[tokio::test]
async fn unknown_option_id_rejected() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;

    let bogus = uuid::Uuid::now_v7();
    let err = booking_flow::book(&pool, &gateway, request("user_c", event, vec![bogus]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Validation(_)));
    assert!(get_booking(&pool, "user_c", event).await.is_none());
    assert!(gateway.created.lock().unwrap().is_empty());
}

// ── 4. event_without_required_fee_rejected ─────────────────────────────────

#[tokio::test]
async fn event_without_required_fee_rejected() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    insert_option(&pool, event, "TRAVEL", 2000, false, true).await;

    let err = booking_flow::book(&pool, &gateway, request("user_d", event, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

// ── 5. unknown_event_rejected ──────────────────────────────────────────────

#[tokio::test]
async fn unknown_event_rejected() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();

    let err = booking_flow::book(
        &pool,
        &gateway,
        request("user_e", uuid::Uuid::now_v7(), vec![]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

// ── 6. paid_booking_conflicts ──────────────────────────────────────────────

#[tokio::test]
async fn paid_booking_conflicts() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;

    booking_flow::book(&pool, &gateway, request("user_f", event, vec![]))
        .await
        .unwrap();
    let row = get_booking(&pool, "user_f", event).await.unwrap();
    force_status(&pool, row.id, BookingStatus::Paid, Some(6000)).await;

    let err = booking_flow::book(&pool, &gateway, request("user_f", event, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict(_)));

    // Untouched: still one booking, still paid.
    let row = get_booking(&pool, "user_f", event).await.unwrap();
    assert_eq!(row.status, "paid");
    assert_eq!(row.amount_paid, Some(6000));
}

// ── 7. rebook_canceled_reuses_booking ──────────────────────────────────────

#[tokio::test]
async fn rebook_canceled_reuses_booking() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    let (_, travel, _) = seed_standard_options(&pool, event).await;

    let first = booking_flow::book(&pool, &gateway, request("user_g", event, vec![]))
        .await
        .unwrap();
    force_status(&pool, first.booking_id, BookingStatus::Canceled, None).await;

    let second = booking_flow::book(&pool, &gateway, request("user_g", event, vec![travel]))
        .await
        .unwrap();

    // Same row, new snapshot, new intent, cleared payment fields.
    assert_eq!(second.booking_id, first.booking_id);
    assert_ne!(second.intent_id, first.intent_id);
    assert_eq!(second.amount_due.cents(), 8000);
    assert_eq!(count_bookings(&pool, event).await, 1);
    assert_eq!(count_charged_options(&pool, first.booking_id).await, 3);

    let row = get_booking(&pool, "user_g", event).await.unwrap();
    assert_eq!(row.status, "pending");
    assert_eq!(row.amount_paid, None);
    assert!(row.paid_at.is_none());
}

// ── 8. rebook_cancels_stale_cancelable_intent ──────────────────────────────

#[tokio::test]
async fn rebook_cancels_stale_cancelable_intent() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;

    let first = booking_flow::book(&pool, &gateway, request("user_h", event, vec![]))
        .await
        .unwrap();
    booking_flow::book(&pool, &gateway, request("user_h", event, vec![]))
        .await
        .unwrap();

    let canceled = gateway.canceled.lock().unwrap().clone();
    assert_eq!(canceled, vec![first.intent_id.as_str().to_string()]);
}

// ── 9. gateway_failure_leaves_pending_without_intent ───────────────────────

#[tokio::test]
async fn gateway_failure_leaves_pending_without_intent() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;

    gateway
        .fail_create
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let err = booking_flow::book(&pool, &gateway, request("user_i", event, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Gateway { .. }));

    // Local record survives without an intent id; re-booking recovers.
    let row = get_booking(&pool, "user_i", event).await.unwrap();
    assert_eq!(row.status, "pending");
    assert_eq!(row.intent_id, None);

    gateway
        .fail_create
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let confirmation = booking_flow::book(&pool, &gateway, request("user_i", event, vec![]))
        .await
        .unwrap();
    assert_eq!(confirmation.booking_id, row.id);

    let row = get_booking(&pool, "user_i", event).await.unwrap();
    assert_eq!(row.intent_id.as_deref(), Some(confirmation.intent_id.as_str()));
}

// ── 10. full_event_rejects_new_booking ─────────────────────────────────────

#[tokio::test]
async fn full_event_rejects_new_booking() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, Some(1)).await;
    seed_standard_options(&pool, event).await;
    insert_paid_booking(&pool, "user_j1", event, 6000, "pi_full_1").await;

    let err = booking_flow::book(&pool, &gateway, request("user_j2", event, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

// ── 11. pending_bookings_reserve_no_slot ───────────────────────────────────

#[tokio::test]
async fn pending_bookings_reserve_no_slot() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, Some(1)).await;
    seed_standard_options(&pool, event).await;

    booking_flow::book(&pool, &gateway, request("user_k1", event, vec![]))
        .await
        .unwrap();
    // A pending booking does not consume capacity.
    booking_flow::book(&pool, &gateway, request("user_k2", event, vec![]))
        .await
        .unwrap();
    assert_eq!(count_bookings(&pool, event).await, 2);
}

// ── 12. cancel_pending_releases_booking ────────────────────────────────────

#[tokio::test]
async fn cancel_pending_releases_booking() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;

    let confirmation = booking_flow::book(&pool, &gateway, request("user_l", event, vec![]))
        .await
        .unwrap();

    let outcome = cancellation::cancel(
        &pool,
        &gateway,
        CancelRequest {
            user_id: "user_l".into(),
            event_id: event,
            cancellation_fee_cents: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.status, BookingStatus::Canceled);
    assert_eq!(outcome.refund, None);

    let row = get_booking(&pool, "user_l", event).await.unwrap();
    assert_eq!(row.status, "canceled");
    assert_eq!(row.intent_id, None);
    assert_eq!(count_charged_options(&pool, row.id).await, 0);

    let canceled = gateway.canceled.lock().unwrap().clone();
    assert_eq!(canceled, vec![confirmation.intent_id.as_str().to_string()]);
}

// ── 13. cancel_paid_refunds_with_default_fee ───────────────────────────────

#[tokio::test]
async fn cancel_paid_refunds_with_default_fee() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;
    insert_paid_booking(&pool, "user_m", event, 8000, "pi_paid_m").await;

    let outcome = cancellation::cancel(
        &pool,
        &gateway,
        CancelRequest {
            user_id: "user_m".into(),
            event_id: event,
            cancellation_fee_cents: None,
        },
    )
    .await
    .unwrap();

    // Default fee is 10%: refund 7200 of 8000.
    assert_eq!(outcome.status, BookingStatus::Refunded);
    assert_eq!(outcome.fee.unwrap().cents(), 800);
    assert_eq!(outcome.refund.unwrap().cents(), 7200);

    let refunds = gateway.refunded.lock().unwrap().clone();
    assert_eq!(refunds, vec![("pi_paid_m".to_string(), 7200)]);

    let row = get_booking(&pool, "user_m", event).await.unwrap();
    assert_eq!(row.status, "refunded");
}

// ── 14. cancel_fee_out_of_range_rejected ───────────────────────────────────

#[tokio::test]
async fn cancel_fee_out_of_range_rejected() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;
    insert_paid_booking(&pool, "user_n", event, 8000, "pi_paid_n").await;

    for fee in [-1, 8001] {
        let err = cancellation::cancel(
            &pool,
            &gateway,
            CancelRequest {
                user_id: "user_n".into(),
                event_id: event,
                cancellation_fee_cents: Some(fee),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)), "fee {fee}");
    }

    // Nothing moved.
    assert!(gateway.refunded.lock().unwrap().is_empty());
    let row = get_booking(&pool, "user_n", event).await.unwrap();
    assert_eq!(row.status, "paid");
}

// ── 15. cancel_full_fee_skips_gateway_refund ───────────────────────────────

#[tokio::test]
async fn cancel_full_fee_skips_gateway_refund() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;
    insert_paid_booking(&pool, "user_o", event, 8000, "pi_paid_o").await;

    let outcome = cancellation::cancel(
        &pool,
        &gateway,
        CancelRequest {
            user_id: "user_o".into(),
            event_id: event,
            cancellation_fee_cents: Some(8000),
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.status, BookingStatus::Refunded);
    assert_eq!(outcome.refund.unwrap().cents(), 0);
    assert!(gateway.refunded.lock().unwrap().is_empty());
}

// ── 16. refund_failure_keeps_booking_paid ──────────────────────────────────

#[tokio::test]
async fn refund_failure_keeps_booking_paid() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;
    insert_paid_booking(&pool, "user_p", event, 8000, "pi_paid_p").await;

    gateway
        .fail_refund
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let err = cancellation::cancel(
        &pool,
        &gateway,
        CancelRequest {
            user_id: "user_p".into(),
            event_id: event,
            cancellation_fee_cents: None,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, BookingError::Gateway { .. }));
    let row = get_booking(&pool, "user_p", event).await.unwrap();
    assert_eq!(row.status, "paid");
}

// ── 17. cancel_after_event_start_rejected ──────────────────────────────────

#[tokio::test]
async fn cancel_after_event_start_rejected() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, -1, None).await;
    seed_standard_options(&pool, event).await;
    insert_paid_booking(&pool, "user_q", event, 8000, "pi_paid_q").await;

    let err = cancellation::cancel(
        &pool,
        &gateway,
        CancelRequest {
            user_id: "user_q".into(),
            event_id: event,
            cancellation_fee_cents: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

// ── 18. cancel_without_booking_is_not_found ────────────────────────────────

#[tokio::test]
async fn cancel_without_booking_is_not_found() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;

    let err = cancellation::cancel(
        &pool,
        &gateway,
        CancelRequest {
            user_id: "user_r".into(),
            event_id: event,
            cancellation_fee_cents: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

// ── 19. cancel_terminal_status_rejected ────────────────────────────────────

#[tokio::test]
async fn cancel_terminal_status_rejected() {
    let pool = setup_pool("event_pay_test_booking").await;
    let gateway = MockGateway::new();
    let event = insert_event(&pool, 48, None).await;
    seed_standard_options(&pool, event).await;

    let confirmation = booking_flow::book(&pool, &gateway, request("user_s", event, vec![]))
        .await
        .unwrap();
    force_status(&pool, confirmation.booking_id, BookingStatus::Failed, None).await;

    let err = cancellation::cancel(
        &pool,
        &gateway,
        CancelRequest {
            user_id: "user_s".into(),
            event_id: event,
            cancellation_fee_cents: None,
        },
    )
    .await
    .unwrap_err();

    match err {
        BookingError::Validation(msg) => assert!(msg.contains("failed"), "{msg}"),
        other => panic!("expected validation error, got {other:?}"),
    }
}
