//! Stock reservation record and its state machine.

use chrono::{DateTime, Utc};
use common::{OrderId, ReservationId, UserId, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Status of a stock hold.
///
/// State transitions:
/// ```text
/// Reserved ──┬──► Committed
///            └──► Released
/// ```
/// Both `Committed` and `Released` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Stock is held for the order but not yet sold.
    #[default]
    Reserved,

    /// Payment confirmed; raw stock was decremented.
    Committed,

    /// Hold lifted without touching raw stock.
    Released,
}

impl ReservationStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Committed | ReservationStatus::Released
        )
    }

    /// Returns true if the hold may move from this status to `next`.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(self, ReservationStatus::Reserved) && next.is_terminal()
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Committed => "committed",
            ReservationStatus::Released => "released",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(ReservationStatus::Reserved),
            "committed" => Ok(ReservationStatus::Committed),
            "released" => Ok(ReservationStatus::Released),
            other => Err(DomainError::UnknownValue {
                kind: "reservation status",
                value: other.to_string(),
            }),
        }
    }
}

/// A time-bounded claim on a variant's stock for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates a new hold in `Reserved` status expiring at `expires_at`.
    pub fn hold(
        order_id: OrderId,
        user_id: UserId,
        variant_id: VariantId,
        quantity: u32,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            order_id,
            user_id,
            variant_id,
            quantity,
            status: ReservationStatus::Reserved,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the hold still counts against availability at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && self.expires_at > now
    }

    /// Returns true if the hold is still `Reserved` but its TTL has passed.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && self.expires_at <= now
    }

    /// Moves the hold to a terminal status.
    pub fn transition(
        &mut self,
        next: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidReservationTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hold_expiring_in(secs: i64) -> (Reservation, DateTime<Utc>) {
        let now = Utc::now();
        let r = Reservation::hold(
            OrderId::new(),
            UserId::new(),
            VariantId::new(),
            2,
            now,
            now + Duration::seconds(secs),
        );
        (r, now)
    }

    #[test]
    fn test_only_reserved_can_transition() {
        assert!(ReservationStatus::Reserved.can_transition_to(ReservationStatus::Committed));
        assert!(ReservationStatus::Reserved.can_transition_to(ReservationStatus::Released));
        assert!(!ReservationStatus::Reserved.can_transition_to(ReservationStatus::Reserved));
        assert!(!ReservationStatus::Committed.can_transition_to(ReservationStatus::Released));
        assert!(!ReservationStatus::Released.can_transition_to(ReservationStatus::Committed));
    }

    #[test]
    fn test_active_until_expiry() {
        let (r, now) = hold_expiring_in(900);
        assert!(r.is_active(now));
        assert!(!r.is_lapsed(now));
        assert!(!r.is_active(now + Duration::seconds(900)));
        assert!(r.is_lapsed(now + Duration::seconds(900)));
    }

    #[test]
    fn test_terminal_hold_is_never_active() {
        let (mut r, now) = hold_expiring_in(900);
        r.transition(ReservationStatus::Released, now).unwrap();
        assert!(!r.is_active(now));
        assert!(!r.is_lapsed(now + Duration::seconds(1000)));
    }

    #[test]
    fn test_terminal_hold_cannot_revert() {
        let (mut r, now) = hold_expiring_in(900);
        r.transition(ReservationStatus::Committed, now).unwrap();
        let err = r.transition(ReservationStatus::Released, now).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidReservationTransition {
                from: ReservationStatus::Committed,
                to: ReservationStatus::Released,
            }
        );
        assert_eq!(r.status, ReservationStatus::Committed);
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            ReservationStatus::Reserved,
            ReservationStatus::Committed,
            ReservationStatus::Released,
        ] {
            assert_eq!(s.as_str().parse::<ReservationStatus>().unwrap(), s);
        }
    }
}
