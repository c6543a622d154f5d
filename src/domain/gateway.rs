use {
    super::error::BookingError,
    super::id::{GatewayEventId, IntentId},
    super::money::Money,
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

/// Correlation metadata attached to every created intent, so the reconciler
/// can locate the booking without relying solely on the gateway's intent id.
#[derive(Debug, Clone)]
pub struct IntentCorrelation {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct CreatedIntent {
    pub intent_id: IntentId,
    pub client_secret: String,
}

/// The gateway's own view of an intent. Only the cancelable subset matters
/// to this system; everything else is lumped for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    /// States in which the gateway still accepts a cancel call.
    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            Self::RequiresPaymentMethod
                | Self::RequiresConfirmation
                | Self::RequiresAction
                | Self::Processing
        )
    }
}

/// External payment gateway, injected into the booking flow and reconciler.
/// Boxed futures keep the trait object-safe without an async_trait macro.
pub trait PaymentGateway: Send + Sync {
    fn create_intent(
        &self,
        amount: Money,
        correlation: IntentCorrelation,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedIntent, BookingError>> + Send + '_>>;

    fn retrieve_status(
        &self,
        id: &IntentId,
    ) -> Pin<Box<dyn Future<Output = Result<IntentStatus, BookingError>> + Send + '_>>;

    fn cancel_intent(
        &self,
        id: &IntentId,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>>;

    fn refund(
        &self,
        id: &IntentId,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>>;
}

// ── Webhook notices ────────────────────────────────────────────────────────

/// What a gateway notification means for a booking, stripped of transport
/// detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    PaymentSucceeded { settled: Money },
    PaymentFailed,
    ChargeRefunded,
}

/// A verified, parsed webhook notification ready for reconciliation.
#[derive(Debug, Clone)]
pub struct GatewayNotice {
    pub event_id: GatewayEventId,
    pub event_type: String,
    pub kind: NoticeKind,
    /// Correlation id from intent metadata; preferred booking lookup key.
    pub booking_ref: Option<Uuid>,
    /// Gateway intent id; fallback lookup key (refund notices carry no
    /// metadata).
    pub intent_id: Option<IntentId>,
    pub raw: serde_json::Value,
}
