// Canonical domain types produced by the normalization layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque vendor interval token identifying one bookable trip leg.
///
/// The vendor encodes routing internals into this string; it must be
/// round-tripped unmodified and is never parsed or rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalId(String);

impl IntervalId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IntervalId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// A seat number in canonical form.
///
/// Vendors pad and case seat labels inconsistently ("007", " 7", "a12" vs
/// "A12"). Two labels compare equal iff they denote the same physical seat:
/// whitespace is stripped, letters are uppercased, and leading zeros are
/// trimmed from each digit run while letter/digit ordering is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatLabel(String);

impl SeatLabel {
    pub fn new(raw: &str) -> Self {
        Self(canonical_seat_label(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeatLabel {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

fn canonical_seat_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().filter(|c| !c.is_whitespace()).peekable();

    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            let mut run = String::new();
            while let Some(&d) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                run.push(d);
                chars.next();
            }
            let trimmed = run.trim_start_matches('0');
            // an all-zero run still denotes seat "0"
            if trimmed.is_empty() {
                out.push('0');
            } else {
                out.push_str(trimmed);
            }
        } else {
            out.extend(c.to_uppercase());
            chars.next();
        }
    }

    out
}

/// Vehicle kind announced by the vendor for a trip leg. Values outside the
/// known set are preserved so callers can decide to hide or warn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleType {
    Bus,
    Train,
    Unknown(String),
}

impl VehicleType {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "bus" => VehicleType::Bus,
            "train" => VehicleType::Train,
            _ => VehicleType::Unknown(raw.to_string()),
        }
    }
}

/// One bookable trip leg as returned by the schedule query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSchedule {
    pub interval_id: IntervalId,
    pub route_name: String,
    pub from_id: String,
    pub to_id: String,
    /// Vendor-formatted local departure/arrival stamps, passed through.
    pub departure: String,
    pub arrival: String,
    pub currency: String,
    pub price: f64,
    pub free_seats: u32,
    pub vehicle: VehicleType,
    /// Number of physical segments (1 = direct, >1 = transfer).
    pub segments: usize,
    pub request_get_free_seats: bool,
    pub request_get_discount: bool,
    pub request_get_baggage: bool,
    pub need_order_data: bool,
    pub need_birth: bool,
}

/// A single seat within a vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeSeat {
    pub number: SeatLabel,
    pub free: bool,
    pub price: f64,
    pub currency: String,
}

/// Seat grouping for vehicles with sub-structure (train wagons, double-deck
/// buses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wagon {
    pub id: String,
    pub class: String,
    pub seats: Vec<FreeSeat>,
}

/// Normalized seat availability for one trip leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SeatPlan {
    Flat(Vec<FreeSeat>),
    Wagons(Vec<Wagon>),
}

impl SeatPlan {
    /// All seats in order, flattening wagon structure.
    pub fn seats(&self) -> Vec<&FreeSeat> {
        match self {
            SeatPlan::Flat(seats) => seats.iter().collect(),
            SeatPlan::Wagons(wagons) => wagons.iter().flat_map(|w| w.seats.iter()).collect(),
        }
    }

    pub fn free_count(&self) -> u32 {
        self.seats().iter().filter(|s| s.free).count() as u32
    }

    pub fn find(&self, label: &SeatLabel) -> Option<&FreeSeat> {
        self.seats().into_iter().find(|s| &s.number == label)
    }
}

/// Fare-reduction option scoped to a trip leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountItem {
    pub id: String,
    pub name: String,
    /// Discounted amount per passenger.
    pub price: f64,
    pub currency: String,
    /// Vendor cap on the per-passenger reduction, when announced.
    pub max_price: Option<f64>,
    pub note: Option<String>,
}

/// Extra-baggage option scoped to a trip leg. Price zero marks the free
/// allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggageItem {
    pub id: String,
    pub title: String,
    pub length_cm: Option<u32>,
    pub width_cm: Option<u32>,
    pub height_cm: Option<u32>,
    pub kg: Option<u32>,
    pub price: f64,
    pub currency: String,
    pub max_per_person: Option<u32>,
    pub max_in_bus: Option<u32>,
}

/// Order state reported by the vendor after submission, as tagged variants so
/// downstream code pattern-matches instead of probing optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BookingStatus {
    Reserved {
        order_id: u64,
        security: String,
        /// End of the vendor reservation window, when announced.
        reservation_until: Option<DateTime<Utc>>,
        price_total: f64,
        currency: String,
    },
    Paid {
        order_id: u64,
        price_total: f64,
        currency: String,
    },
    Failed {
        code: String,
    },
    Expired {
        order_id: u64,
    },
    /// Status token outside the known set, preserved verbatim.
    Unknown {
        status: String,
    },
}
