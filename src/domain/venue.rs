use crate::{BookingError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueType {
    ConcertHall,
    Stadium,
    Theater,
    ConventionCenter,
    Outdoor,
    Arena,
    Club,
    ExhibitionHall,
    Auditorium,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatType {
    Regular,
    Vip,
    Accessible,
    Standing,
    Box,
    Balcony,
    Orchestra,
    Mezzanine,
}

/// One physical seat. Immutable after construction except for deactivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub section_code: String,
    pub row_code: String,
    pub seat_number: u32,
    pub seat_type: SeatType,
    /// Multiplier applied to the event's base price.
    pub pricing_tier: Decimal,
    pub is_active: bool,
    pub notes: Option<String>,
}

impl Seat {
    pub fn new(
        venue_id: Uuid,
        section_code: &str,
        row_code: &str,
        seat_number: u32,
        seat_type: SeatType,
        pricing_tier: Decimal,
    ) -> Result<Self> {
        if section_code.trim().is_empty() {
            return Err(BookingError::Validation(
                "Section code is required".to_string(),
            ));
        }
        if seat_number == 0 {
            return Err(BookingError::Validation(
                "Seat number must be positive".to_string(),
            ));
        }
        if pricing_tier <= Decimal::ZERO {
            return Err(BookingError::Validation(
                "Pricing tier must be positive".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            venue_id,
            section_code: section_code.trim().to_uppercase(),
            row_code: row_code.trim().to_uppercase(),
            seat_number,
            seat_type,
            pricing_tier,
            is_active: true,
            notes: None,
        })
    }

    /// Printable code, e.g. `VIP-AA-15` or `GA-3` when the row is empty.
    pub fn seat_code(&self) -> String {
        if self.row_code.is_empty() {
            format!("{}-{}", self.section_code, self.seat_number)
        } else {
            format!("{}-{}-{}", self.section_code, self.row_code, self.seat_number)
        }
    }

    pub fn deactivate(&mut self, reason: Option<String>) {
        self.is_active = false;
        self.notes = reason;
    }
}

/// A venue owns its seats; seats never outlive the venue record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub venue_type: VenueType,
    pub seats: Vec<Seat>,
    pub total_capacity: usize,
    pub is_active: bool,
}

impl Venue {
    pub fn new(name: &str, city: &str, venue_type: VenueType) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(BookingError::Validation(
                "Venue name is required".to_string(),
            ));
        }
        if city.trim().is_empty() {
            return Err(BookingError::Validation("City is required".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            city: city.trim().to_string(),
            venue_type,
            seats: Vec::new(),
            total_capacity: 0,
            is_active: true,
        })
    }

    /// Adds a seat, enforcing (section, row, number) uniqueness.
    pub fn add_seat(&mut self, seat: Seat) -> Result<()> {
        if seat.venue_id != self.id {
            return Err(BookingError::Validation(
                "Seat belongs to a different venue".to_string(),
            ));
        }
        let duplicate = self.seats.iter().any(|s| {
            s.section_code == seat.section_code
                && s.row_code == seat.row_code
                && s.seat_number == seat.seat_number
        });
        if duplicate {
            return Err(BookingError::Validation(format!(
                "Seat {} already exists in venue {}",
                seat.seat_code(),
                self.name
            )));
        }

        self.seats.push(seat);
        self.total_capacity = self.seats.len();
        Ok(())
    }

    pub fn seat(&self, seat_id: Uuid) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == seat_id)
    }

    pub fn active_seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.iter().filter(|s| s.is_active)
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
