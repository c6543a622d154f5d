use {
    super::error::BookingError,
    super::gateway::NoticeKind,
    super::id::IntentId,
    super::money::{Currency, MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Paid,
    Canceled,
    Refunded,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }

    /// Gateway-driven transition table. Everything outside it is a guard
    /// no-op, which is what makes webhook replay and out-of-order delivery
    /// safe.
    pub fn can_transition_to(&self, next: &BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid)
                | (Self::Pending, Self::Failed)
                | (Self::Pending, Self::Canceled)
                | (Self::Paid, Self::Refunded)
        )
    }

    /// A booking slot can be reused by a new booking attempt unless money
    /// already settled on it.
    pub fn can_rebook(&self) -> bool {
        !matches!(self, Self::Paid)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for BookingStatus {
    type Error = BookingError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "canceled" => Ok(Self::Canceled),
            "refunded" => Ok(Self::Refunded),
            "failed" => Ok(Self::Failed),
            other => Err(BookingError::Validation(format!(
                "unknown booking status: {other}"
            ))),
        }
    }
}

/// One user's registration+payment attempt for one event. Unique per
/// (user, event).
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub event_id: Uuid,
    pub status: BookingStatus,
    pub intent_id: Option<IntentId>,
    pub amount_paid: Option<MoneyAmount>,
    pub currency: Currency,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Immutable price snapshot linking a booking to a fee option at the moment
/// of charging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargedOption {
    pub fee_option_id: Uuid,
    pub category: super::fee::FeeCategory,
    pub label: String,
    pub price: MoneyAmount,
}

// ── Cancellation ───────────────────────────────────────────────────────────

/// Cancellation fee when the caller does not override: 10% of the amount
/// paid, rounded down.
pub fn default_cancellation_fee(amount_paid: MoneyAmount) -> MoneyAmount {
    MoneyAmount::new(amount_paid.cents() / 10).expect("tenth of a non-negative amount")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelDecision {
    /// PENDING booking: no money moved. Cancel the gateway intent if it is
    /// still in a cancelable state, locally transition to CANCELED.
    ReleasePending,
    /// PAID booking: refund amount minus fee, transition to REFUNDED.
    RefundPaid {
        fee: MoneyAmount,
        refund: MoneyAmount,
    },
}

/// Pure cancellation rule. Rejections: event already started, fee outside
/// [0, amount_paid], status not cancelable.
pub fn decide_cancellation(
    booking: &Booking,
    fee_override_cents: Option<i64>,
    event_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<CancelDecision, BookingError> {
    if event_start <= now {
        return Err(BookingError::Validation(
            "event already started or in the past".into(),
        ));
    }

    match (booking.status, booking.amount_paid) {
        (BookingStatus::Pending, _) => Ok(CancelDecision::ReleasePending),
        (BookingStatus::Paid, Some(amount_paid)) => {
            let fee = match fee_override_cents {
                Some(cents) => {
                    if cents < 0 || cents > amount_paid.cents() {
                        return Err(BookingError::Validation(format!(
                            "cancellation fee {cents} outside [0, {}]",
                            amount_paid.cents()
                        )));
                    }
                    MoneyAmount::new(cents)?
                }
                None => default_cancellation_fee(amount_paid),
            };
            Ok(CancelDecision::RefundPaid {
                fee,
                refund: amount_paid - fee,
            })
        }
        // A PAID row without an amount would violate the state machine's own
        // bookkeeping; refuse rather than refund an unknown sum.
        (BookingStatus::Paid, None) => Err(BookingError::Validation(
            "paid booking has no recorded amount".into(),
        )),
        (status, _) => Err(BookingError::Validation(format!(
            "cannot cancel booking in status {status}"
        ))),
    }
}

// ── Webhook settlement ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementAction {
    MarkPaid,
    MarkFailed,
    MarkRefunded,
    /// Guard no-op: duplicate delivery or an event that arrived after a
    /// conflicting terminal state. Reason is for the log line only.
    Ignore(&'static str),
}

/// Pure reconciliation rule: what a gateway notice does to a booking in the
/// given status. Replays and out-of-order deliveries land in `Ignore`.
pub fn settlement_action(current: BookingStatus, notice: &NoticeKind) -> SettlementAction {
    use {BookingStatus::*, NoticeKind::*};

    match (current, notice) {
        (Pending, PaymentSucceeded { .. }) => SettlementAction::MarkPaid,
        (Paid, PaymentSucceeded { .. }) => SettlementAction::Ignore("already paid"),
        (Canceled | Refunded | Failed, PaymentSucceeded { .. }) => {
            SettlementAction::Ignore("success notice on settled booking")
        }

        (Pending, PaymentFailed) => SettlementAction::MarkFailed,
        // Failure after success is out-of-order delivery, not a regression.
        (Paid, PaymentFailed) => SettlementAction::Ignore("failure notice after payment"),
        (Canceled | Refunded | Failed, PaymentFailed) => {
            SettlementAction::Ignore("failure notice on settled booking")
        }

        (Paid, ChargeRefunded) => SettlementAction::MarkRefunded,
        (Refunded, ChargeRefunded) => SettlementAction::Ignore("already refunded"),
        (Pending | Canceled | Failed, ChargeRefunded) => {
            SettlementAction::Ignore("refund notice on unpaid booking")
        }
    }
}
