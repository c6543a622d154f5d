use {
    crate::domain::{
        error::BookingError,
        gateway::{CreatedIntent, IntentCorrelation, IntentStatus, PaymentGateway},
        id::IntentId,
        money::{Currency, Money},
    },
    std::collections::HashMap,
    std::{future::Future, pin::Pin},
};

pub struct StripeGateway {
    client: stripe::Client,
}

impl StripeGateway {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }
}

impl PaymentGateway for StripeGateway {
    fn create_intent(
        &self,
        amount: Money,
        correlation: IntentCorrelation,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedIntent, BookingError>> + Send + '_>> {
        Box::pin(async move { self.create_intent_inner(amount, correlation).await })
    }

    fn retrieve_status(
        &self,
        id: &IntentId,
    ) -> Pin<Box<dyn Future<Output = Result<IntentStatus, BookingError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.retrieve_status_inner(&id).await })
    }

    fn cancel_intent(
        &self,
        id: &IntentId,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.cancel_intent_inner(&id).await })
    }

    fn refund(
        &self,
        id: &IntentId,
        amount: Money,
    ) -> Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.refund_inner(&id, amount).await })
    }
}

impl StripeGateway {
    async fn create_intent_inner(
        &self,
        amount: Money,
        correlation: IntentCorrelation,
    ) -> Result<CreatedIntent, BookingError> {
        let mut params = stripe::CreatePaymentIntent::new(
            amount.amount().cents(),
            to_stripe_currency(amount.currency()),
        );
        params.automatic_payment_methods =
            Some(stripe::CreatePaymentIntentAutomaticPaymentMethods {
                enabled: true,
                allow_redirects: None,
            });
        // Double-keyed correlation: the reconciler prefers booking_id from
        // metadata and falls back to the intent id.
        params.metadata = Some(HashMap::from([
            ("booking_id".to_string(), correlation.booking_id.to_string()),
            ("event_id".to_string(), correlation.event_id.to_string()),
            ("user_id".to_string(), correlation.user_id),
        ]));

        let pi = stripe::PaymentIntent::create(&self.client, params)
            .await
            .map_err(gateway_error)?;

        let client_secret = pi.client_secret.ok_or_else(|| BookingError::Gateway {
            kind: "api_error".into(),
            message: "intent created without a client secret".into(),
        })?;

        Ok(CreatedIntent {
            intent_id: IntentId::new(pi.id.to_string())?,
            client_secret,
        })
    }

    async fn retrieve_status_inner(&self, id: &IntentId) -> Result<IntentStatus, BookingError> {
        let pi_id = parse_intent_id(id)?;
        let pi = stripe::PaymentIntent::retrieve(&self.client, &pi_id, &[])
            .await
            .map_err(gateway_error)?;
        Ok(convert_intent_status(pi.status))
    }

    async fn cancel_intent_inner(&self, id: &IntentId) -> Result<(), BookingError> {
        let pi_id = parse_intent_id(id)?;
        stripe::PaymentIntent::cancel(&self.client, &pi_id, Default::default())
            .await
            .map_err(gateway_error)?;
        Ok(())
    }

    async fn refund_inner(&self, id: &IntentId, amount: Money) -> Result<(), BookingError> {
        let pi_id = parse_intent_id(id)?;
        let mut params = stripe::CreateRefund::new();
        params.payment_intent = Some(pi_id);
        params.amount = Some(amount.amount().cents());
        stripe::Refund::create(&self.client, params)
            .await
            .map_err(gateway_error)?;
        Ok(())
    }
}

// ── Conversions ────────────────────────────────────────────────────────────

fn parse_intent_id(id: &IntentId) -> Result<stripe::PaymentIntentId, BookingError> {
    id.as_str()
        .parse::<stripe::PaymentIntentId>()
        .map_err(|e| BookingError::Gateway {
            kind: "invalid_id".into(),
            message: format!("invalid PaymentIntent id: {e}"),
        })
}

fn to_stripe_currency(c: Currency) -> stripe::Currency {
    match c {
        Currency::Chf => stripe::Currency::CHF,
        Currency::Eur => stripe::Currency::EUR,
        Currency::Usd => stripe::Currency::USD,
    }
}

pub fn convert_currency(c: stripe::Currency) -> Result<Currency, BookingError> {
    match c {
        stripe::Currency::CHF => Ok(Currency::Chf),
        stripe::Currency::EUR => Ok(Currency::Eur),
        stripe::Currency::USD => Ok(Currency::Usd),
        other => Err(BookingError::Validation(format!(
            "unsupported currency: {other:?}"
        ))),
    }
}

fn convert_intent_status(status: stripe::PaymentIntentStatus) -> IntentStatus {
    #[allow(unreachable_patterns)]
    match status {
        stripe::PaymentIntentStatus::RequiresPaymentMethod => IntentStatus::RequiresPaymentMethod,
        stripe::PaymentIntentStatus::RequiresConfirmation => IntentStatus::RequiresConfirmation,
        stripe::PaymentIntentStatus::RequiresAction => IntentStatus::RequiresAction,
        stripe::PaymentIntentStatus::Processing => IntentStatus::Processing,
        stripe::PaymentIntentStatus::RequiresCapture => IntentStatus::RequiresCapture,
        stripe::PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
        stripe::PaymentIntentStatus::Canceled => IntentStatus::Canceled,
        other => {
            tracing::warn!("unknown PaymentIntentStatus: {other:?}, treating as not cancelable");
            IntentStatus::RequiresCapture
        }
    }
}

fn gateway_error(e: stripe::StripeError) -> BookingError {
    let kind = match &e {
        stripe::StripeError::Stripe(req) => format!("{:?}", req.error_type),
        _ => "request_error".to_string(),
    };
    BookingError::Gateway {
        kind,
        message: e.to_string(),
    }
}
