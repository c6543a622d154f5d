use event_pay::domain::booking::{
    Booking, BookingStatus, CancelDecision, SettlementAction, decide_cancellation,
    settlement_action,
};
use event_pay::domain::fee::{FeeCategory, FeeOption};
use event_pay::domain::gateway::NoticeKind;
use event_pay::domain::money::{Currency, Money, MoneyAmount};
use event_pay::services::pricing::price;
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

fn arb_status() -> impl Strategy<Value = BookingStatus> {
    prop_oneof![
        Just(BookingStatus::Pending),
        Just(BookingStatus::Paid),
        Just(BookingStatus::Canceled),
        Just(BookingStatus::Refunded),
        Just(BookingStatus::Failed),
    ]
}

fn arb_notice() -> impl Strategy<Value = NoticeKind> {
    prop_oneof![
        (0i64..1_000_000).prop_map(|cents| NoticeKind::PaymentSucceeded {
            settled: Money::new(MoneyAmount::new(cents).unwrap(), Currency::Chf),
        }),
        Just(NoticeKind::PaymentFailed),
        Just(NoticeKind::ChargeRefunded),
    ]
}

/// (price, required, selectable, active, selected)
fn arb_option_specs() -> impl Strategy<Value = Vec<(i64, bool, bool, bool, bool)>> {
    prop::collection::vec(
        (0i64..100_000, any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()),
        0..12,
    )
}

fn build_options(specs: &[(i64, bool, bool, bool, bool)]) -> (Vec<FeeOption>, HashSet<Uuid>) {
    let mut options = Vec::with_capacity(specs.len());
    let mut selected = HashSet::new();
    for (price_cents, required, selectable, active, pick) in specs {
        let id = Uuid::now_v7();
        options.push(FeeOption {
            id,
            event_id: Uuid::nil(),
            category: FeeCategory::Travel,
            label: "option".into(),
            price: MoneyAmount::new(*price_cents).unwrap(),
            required: *required,
            selectable: *selectable,
            active: *active,
            sort_order: 0,
        });
        if *pick {
            selected.insert(id);
        }
    }
    (options, selected)
}

fn paid_booking(amount_cents: i64) -> Booking {
    Booking {
        id: Uuid::now_v7(),
        user_id: "user".into(),
        event_id: Uuid::now_v7(),
        status: BookingStatus::Paid,
        intent_id: None,
        amount_paid: Some(MoneyAmount::new(amount_cents).unwrap()),
        currency: Currency::Chf,
        paid_at: None,
        created_at: chrono::Utc::now(),
    }
}

proptest! {
    /// Terminal states accept no gateway-driven transition except
    /// Paid -> Refunded.
    #[test]
    fn terminal_states_reject_transitions(target in arb_status()) {
        use BookingStatus::*;
        for terminal in [Canceled, Refunded, Failed] {
            prop_assert!(!terminal.can_transition_to(&target));
        }
        prop_assert_eq!(Paid.can_transition_to(&target), target == Refunded);
    }

    /// as_str -> try_from roundtrip is identity.
    #[test]
    fn status_roundtrip(status in arb_status()) {
        let roundtripped = BookingStatus::try_from(status.as_str()).unwrap();
        prop_assert_eq!(roundtripped, status);
    }

    /// Any notice sequence settles at most once, and once PAID only a
    /// refund notice moves the booking.
    #[test]
    fn notice_walk_settles_at_most_once(
        notices in prop::collection::vec(arb_notice(), 1..30)
    ) {
        let mut status = BookingStatus::Pending;
        let mut settlements = 0u32;
        for notice in &notices {
            match settlement_action(status, notice) {
                SettlementAction::MarkPaid => {
                    prop_assert_eq!(status, BookingStatus::Pending);
                    status = BookingStatus::Paid;
                    settlements += 1;
                }
                SettlementAction::MarkFailed => {
                    prop_assert_eq!(status, BookingStatus::Pending);
                    status = BookingStatus::Failed;
                }
                SettlementAction::MarkRefunded => {
                    prop_assert_eq!(status, BookingStatus::Paid);
                    status = BookingStatus::Refunded;
                }
                SettlementAction::Ignore(_) => {}
            }
        }
        prop_assert!(settlements <= 1, "settled {settlements} times: {notices:?}");
    }

    /// Required options are always charged; optional ones only when
    /// selectable, active and selected; the total is exactly the sum.
    #[test]
    fn pricing_includes_exactly_the_right_options(specs in arb_option_specs()) {
        let (options, selected) = build_options(&specs);
        let (total, charged) = price(&options, &selected);

        let charged_ids: HashSet<Uuid> = charged.iter().map(|o| o.id).collect();
        let mut expected_sum = 0i64;
        for option in &options {
            let should_charge = option.required
                || (option.selectable && option.active && selected.contains(&option.id));
            prop_assert_eq!(charged_ids.contains(&option.id), should_charge);
            if should_charge {
                expected_sum += option.price.cents();
            }
        }
        prop_assert_eq!(total.cents(), expected_sum);

        // Deterministic on identical input.
        prop_assert_eq!(price(&options, &selected), (total, charged));
    }

    /// A fee override is accepted iff it lies in [0, amount_paid], and the
    /// refund is always the exact remainder.
    #[test]
    fn cancellation_fee_is_bounded(
        amount in 1i64..1_000_000,
        fee in -10_000i64..2_000_000,
    ) {
        let booking = paid_booking(amount);
        let start = chrono::Utc::now() + chrono::TimeDelta::days(1);
        let result = decide_cancellation(&booking, Some(fee), start, chrono::Utc::now());

        if (0..=amount).contains(&fee) {
            let decision = result.unwrap();
            prop_assert_eq!(
                decision,
                CancelDecision::RefundPaid {
                    fee: MoneyAmount::new(fee).unwrap(),
                    refund: MoneyAmount::new(amount - fee).unwrap(),
                }
            );
        } else {
            prop_assert!(result.is_err());
        }
    }
}
