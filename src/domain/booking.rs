use crate::domain::reservation::{SeatReservation, SeatReservationStatus};
use crate::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Initiated, seats held, payment not started.
    Pending,
    /// Payment handed to the gateway.
    PaymentPending,
    /// Paid; seat holds are permanent.
    Confirmed,
    Cancelled,
    Expired,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    DigitalWallet,
    BankTransfer,
    Cash,
    GiftCard,
}

/// Deterministic monetary breakdown: fee on the base only, tax on base plus
/// fee, both rounded half-away-from-zero to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_amount: Decimal,
    pub service_fee: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

impl PriceBreakdown {
    pub fn compute(base_amount: Decimal, fee_rate: Decimal, tax_rate: Decimal) -> Self {
        let service_fee = round_money(base_amount * fee_rate);
        let tax_amount = round_money((base_amount + service_fee) * tax_rate);
        Self {
            base_amount,
            service_fee,
            tax_amount,
            grand_total: base_amount + service_fee + tax_amount,
        }
    }
}

pub(crate) fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The purchasable unit: one or more seat reservations plus the payment and
/// cancellation state machine wrapped around them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    /// Human-readable reference, `BTS-<date>-<time>-<4 digits>`.
    pub reference: String,
    pub status: BookingStatus,
    pub reservations: Vec<SeatReservation>,
    pub pricing: PriceBreakdown,
    pub payment_method: Option<PaymentMethod>,
    pub payment_transaction_id: Option<String>,
    pub payment_completed_at: Option<DateTime<Utc>>,
    pub customer_email: String,
    pub customer_phone: String,
    pub special_requests: Option<String>,
    pub cancellation_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        event_id: Uuid,
        customer_email: &str,
        customer_phone: &str,
        reservations: Vec<SeatReservation>,
        fee_rate: Decimal,
        tax_rate: Decimal,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if customer_email.trim().is_empty() {
            return Err(BookingError::Validation(
                "Customer email is required".to_string(),
            ));
        }
        if reservations.is_empty() {
            return Err(BookingError::Validation(
                "At least one seat reservation is required".to_string(),
            ));
        }
        if reservations
            .iter()
            .any(|r| r.event_id != event_id || r.user_id != user_id)
        {
            return Err(BookingError::Validation(
                "All seat reservations must belong to the same event and user".to_string(),
            ));
        }

        let base_amount: Decimal = reservations.iter().map(|r| r.price).sum();
        let pricing = PriceBreakdown::compute(base_amount, fee_rate, tax_rate);

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            reference: generate_reference(now),
            status: BookingStatus::Pending,
            reservations,
            pricing,
            payment_method: None,
            payment_transaction_id: None,
            payment_completed_at: None,
            customer_email: customer_email.trim().to_string(),
            customer_phone: customer_phone.trim().to_string(),
            special_requests: None,
            cancellation_reason: None,
            expires_at: now + ttl,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
            && matches!(
                self.status,
                BookingStatus::Pending | BookingStatus::PaymentPending
            )
    }

    pub fn seat_count(&self) -> usize {
        self.reservations.len()
    }

    /// Grand total recomputed from the current reservation set; callers
    /// compare it against `pricing.grand_total` rather than trusting a
    /// stored figure.
    pub fn recomputed_total(&self, fee_rate: Decimal, tax_rate: Decimal) -> Decimal {
        let base: Decimal = self.reservations.iter().map(|r| r.price).sum();
        PriceBreakdown::compute(base, fee_rate, tax_rate).grand_total
    }

    pub fn process_payment(
        &mut self,
        method: PaymentMethod,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::PaymentPending
        ) {
            return Err(BookingError::InvalidState(format!(
                "Can only process payment for pending bookings, not {:?}",
                self.status
            )));
        }
        if self.is_expired(now) {
            return Err(BookingError::Expired(format!(
                "Booking {} expired at {}",
                self.reference, self.expires_at
            )));
        }
        self.status = BookingStatus::PaymentPending;
        self.payment_method = Some(method);
        self.payment_transaction_id = Some(transaction_id.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Confirms payment and cascades into still-Reserved children. Children
    /// already in a terminal state are skipped, not treated as errors.
    pub fn confirm_payment(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != BookingStatus::PaymentPending {
            return Err(BookingError::InvalidState(format!(
                "Can only confirm payment for payment-pending bookings, not {:?}",
                self.status
            )));
        }
        // Check every child before touching anything so a failure leaves the
        // booking fully unmodified.
        for reservation in &self.reservations {
            if reservation.status == SeatReservationStatus::Reserved
                && reservation.is_expired(now)
            {
                return Err(BookingError::Expired(format!(
                    "Reservation {} expired at {}",
                    reservation.id, reservation.expires_at
                )));
            }
        }

        self.status = BookingStatus::Confirmed;
        self.payment_completed_at = Some(now);
        self.updated_at = now;

        let booking_id = self.id;
        for reservation in &mut self.reservations {
            if reservation.status == SeatReservationStatus::Reserved {
                reservation.confirm(booking_id, now)?;
            }
        }
        Ok(())
    }

    /// Whether cancellation is allowed: unconfirmed bookings always, a
    /// confirmed booking only up to the cancellation window before doors.
    pub fn can_be_cancelled(
        &self,
        event_start: DateTime<Utc>,
        window: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        if self.status != BookingStatus::Confirmed {
            return true;
        }
        now < event_start - window
    }

    /// Cancels the booking, cancelling Reserved children. Confirmed children
    /// are left untouched; undoing those is the refund pipeline's job.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            BookingStatus::Confirmed
            | BookingStatus::Pending
            | BookingStatus::PaymentPending => {
                self.status = BookingStatus::Cancelled;
            }
            other => {
                return Err(BookingError::InvalidState(format!(
                    "Cannot cancel booking with status {:?}",
                    other
                )));
            }
        }
        self.cancellation_reason = Some(reason.to_string());
        self.updated_at = now;

        // Settled children stay put; Reserved and Confirmed both cancel.
        for reservation in &mut self.reservations {
            reservation.cancel(Some(reason.to_string()), now);
        }
        Ok(())
    }

    /// Expires the booking when past its deadline, cascading expiry to
    /// Reserved children. Idempotent: a second call is a no-op.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_expired(now) {
            return false;
        }
        self.status = BookingStatus::Expired;
        self.updated_at = now;
        for reservation in &mut self.reservations {
            if reservation.status == SeatReservationStatus::Reserved {
                reservation.status = SeatReservationStatus::Expired;
                reservation.updated_at = now;
            }
        }
        true
    }

    pub fn extend(&mut self, additional: Duration, now: DateTime<Utc>) -> Result<()> {
        if !matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::PaymentPending
        ) {
            return Err(BookingError::InvalidState(
                "Can only extend pending bookings".to_string(),
            ));
        }
        if self.is_expired(now) {
            return Err(BookingError::Expired(format!(
                "Booking {} expired at {}",
                self.reference, self.expires_at
            )));
        }
        if additional <= Duration::zero() {
            return Err(BookingError::Validation(
                "Extension must push the deadline out".to_string(),
            ));
        }
        self.expires_at = self.expires_at + additional;
        // Seat holds line up with the booking's new deadline so none of
        // them can lapse while the booking is still payable.
        for reservation in &mut self.reservations {
            if reservation.status == SeatReservationStatus::Reserved {
                reservation.extend_until(self.expires_at, now)?;
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn add_special_requests(&mut self, requests: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status != BookingStatus::Pending {
            return Err(BookingError::InvalidState(
                "Can only add special requests to pending bookings".to_string(),
            ));
        }
        self.special_requests = Some(requests.to_string());
        self.updated_at = now;
        Ok(())
    }
}

fn generate_reference(now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y%m%d-%H%M%S");
    let suffix: u32 = rand::thread_rng().gen_range(1000..=9999);
    format!("BTS-{}-{}", timestamp, suffix)
}

/// One ticket code per seat. The random suffix is cosmetic; reference plus
/// seat code already make the ticket unique.
pub fn generate_ticket_code(booking_reference: &str, seat_code: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..=9999);
    format!("TICKET-{}-{}-{}", booking_reference, seat_code, suffix)
}
