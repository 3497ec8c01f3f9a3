// New-order payload construction and validation.
//
// The vendor's multi-trip order schema is built around parallel arrays: one
// entry per trip leg in `date`, `interval_id`, and `seat`, where each `seat`
// entry holds one seat string per passenger (comma-joined across physical
// segments). Every structural violation is a distinct, named error carrying
// the leg and passenger index; nothing is silently coerced.

use crate::client::Credentials;
use crate::types::IntervalId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("order has no {0}")]
    EmptyInput(&'static str),

    #[error("{field}: expected {expected} entries, found {found}")]
    ArrayLengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("leg {leg}, passenger {passenger}: seat string has {found} segment parts, route has {expected}")]
    SegmentCountMismatch {
        leg: usize,
        passenger: usize,
        expected: usize,
        found: usize,
    },

    #[error("passenger {passenger} is missing a name or surname")]
    MissingPassengerData { passenger: usize },

    #[error("a contact phone number is required for this order")]
    MissingContactPhone,

    #[error("passenger {passenger} is missing a birth date")]
    MissingBirthDate { passenger: usize },
}

/// Passenger personal data collected by the booking form.
#[derive(Debug, Clone, Default)]
pub struct OrderPassenger {
    pub name: String,
    pub surname: String,
    pub birth_date: Option<NaiveDate>,
}

/// Final per-leg input to the builder: the leg's metadata flags plus the
/// selections made for it.
#[derive(Debug, Clone)]
pub struct TripOrder {
    pub interval_id: IntervalId,
    pub date: NaiveDate,
    /// Physical segments in the leg; each passenger's seat string must carry
    /// one comma-separated part per segment.
    pub segments: usize,
    /// One seat string per passenger, in passenger order.
    pub seats: Vec<String>,
    /// Discount id per zero-based passenger index.
    pub discounts: HashMap<usize, String>,
    /// Paid-baggage ids per zero-based passenger index.
    pub baggage: HashMap<usize, Vec<String>>,
    pub need_order_data: bool,
    pub need_birth: bool,
}

impl TripOrder {
    pub fn new(interval_id: IntervalId, date: NaiveDate, seats: Vec<String>) -> Self {
        Self {
            interval_id,
            date,
            segments: 1,
            seats,
            discounts: HashMap::new(),
            baggage: HashMap::new(),
            need_order_data: false,
            need_birth: false,
        }
    }
}

/// Everything the builder needs for one submission.
#[derive(Debug, Clone)]
pub struct NewOrderArgs<'a> {
    pub credentials: &'a Credentials,
    pub passengers: &'a [OrderPassenger],
    pub trips: &'a [TripOrder],
    pub phone: Option<String>,
    pub email: Option<String>,
    pub promocode: Option<String>,
    pub currency: String,
    pub lang: String,
}

/// The assembled vendor order request. Optional keys are omitted entirely
/// when empty; the vendor treats an explicit empty field differently from an
/// absent one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrderPayload {
    pub login: String,
    pub password: String,
    pub date: Vec<String>,
    pub interval_id: Vec<IntervalId>,
    pub seat: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<Vec<String>>,
    /// Per-leg discount map keyed by leg index, then zero-based passenger
    /// index, both as strings (the vendor's XML-derived convention).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_id: Option<BTreeMap<String, BTreeMap<String, String>>>,
    /// Per-leg baggage arrays aligned to passenger index; empty string where
    /// a passenger carries none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baggage: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promocode: Option<String>,
    pub currency: String,
    pub lang: String,
}

/// Assemble a validated order payload, or fail with the first structural or
/// missing-data violation.
pub fn build_new_order(args: &NewOrderArgs<'_>) -> Result<NewOrderPayload, OrderError> {
    if args.trips.is_empty() {
        return Err(OrderError::EmptyInput("trip legs"));
    }
    if args.passengers.is_empty() {
        return Err(OrderError::EmptyInput("passengers"));
    }
    let passengers = args.passengers.len();

    for (leg, trip) in args.trips.iter().enumerate() {
        if trip.seats.len() != passengers {
            return Err(OrderError::ArrayLengthMismatch {
                field: "seat",
                expected: passengers,
                found: trip.seats.len(),
            });
        }
        let segments = trip.segments.max(1);
        for (passenger, seat) in trip.seats.iter().enumerate() {
            let parts = seat.split(',').count();
            if parts != segments {
                return Err(OrderError::SegmentCountMismatch {
                    leg,
                    passenger,
                    expected: segments,
                    found: parts,
                });
            }
        }
    }

    let discount_id = build_discount_map(args.trips);
    let baggage = build_baggage_map(args.trips, passengers);

    let need_order_data = args.trips.iter().any(|t| t.need_order_data);
    let need_birth = args.trips.iter().any(|t| t.need_birth);

    let (name, surname) = if need_order_data {
        for (idx, p) in args.passengers.iter().enumerate() {
            if p.name.trim().is_empty() || p.surname.trim().is_empty() {
                return Err(OrderError::MissingPassengerData { passenger: idx });
            }
        }
        if args.phone.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(OrderError::MissingContactPhone);
        }
        (
            Some(args.passengers.iter().map(|p| p.name.clone()).collect()),
            Some(args.passengers.iter().map(|p| p.surname.clone()).collect()),
        )
    } else {
        (None, None)
    };

    let birth_date = if need_birth {
        let mut dates = Vec::with_capacity(passengers);
        for (idx, p) in args.passengers.iter().enumerate() {
            match p.birth_date {
                Some(d) => dates.push(d.format("%Y-%m-%d").to_string()),
                None => return Err(OrderError::MissingBirthDate { passenger: idx }),
            }
        }
        Some(dates)
    } else {
        None
    };

    let payload = NewOrderPayload {
        login: args.credentials.login.clone(),
        password: args.credentials.password.clone(),
        date: args
            .trips
            .iter()
            .map(|t| t.date.format("%Y-%m-%d").to_string())
            .collect(),
        interval_id: args.trips.iter().map(|t| t.interval_id.clone()).collect(),
        seat: args.trips.iter().map(|t| t.seats.clone()).collect(),
        name,
        surname,
        birth_date,
        discount_id,
        baggage,
        phone: args.phone.clone().filter(|p| !p.trim().is_empty()),
        email: args.email.clone().filter(|e| !e.trim().is_empty()),
        promocode: args.promocode.clone().filter(|p| !p.trim().is_empty()),
        currency: args.currency.clone(),
        lang: args.lang.clone(),
    };

    // Independent re-check before handing the payload back; catches builder
    // regressions before they reach the vendor.
    validate_new_order_payload(&payload)?;
    Ok(payload)
}

/// Discount map only covers legs with at least one passenger-level discount;
/// the field is omitted entirely when no leg has any.
fn build_discount_map(
    trips: &[TripOrder],
) -> Option<BTreeMap<String, BTreeMap<String, String>>> {
    let mut map = BTreeMap::new();
    for (leg, trip) in trips.iter().enumerate() {
        if trip.discounts.is_empty() {
            continue;
        }
        let per_passenger: BTreeMap<String, String> = trip
            .discounts
            .iter()
            .map(|(idx, id)| (idx.to_string(), id.clone()))
            .collect();
        map.insert(leg.to_string(), per_passenger);
    }
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Baggage arrays stay aligned to passenger index: missing entries are padded
/// with an empty string, never skipped.
fn build_baggage_map(trips: &[TripOrder], passengers: usize) -> Option<BTreeMap<String, Vec<String>>> {
    let mut map = BTreeMap::new();
    for (leg, trip) in trips.iter().enumerate() {
        if trip.baggage.values().all(|ids| ids.is_empty()) {
            continue;
        }
        let entries: Vec<String> = (0..passengers)
            .map(|idx| {
                trip.baggage
                    .get(&idx)
                    .map(|ids| ids.join(","))
                    .unwrap_or_default()
            })
            .collect();
        map.insert(leg.to_string(), entries);
    }
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Defense-in-depth structural check, run again right before submission.
pub fn validate_new_order_payload(payload: &NewOrderPayload) -> Result<(), OrderError> {
    let legs = payload.date.len();
    if legs == 0 {
        return Err(OrderError::EmptyInput("trip legs"));
    }
    if payload.interval_id.len() != legs {
        return Err(OrderError::ArrayLengthMismatch {
            field: "interval_id",
            expected: legs,
            found: payload.interval_id.len(),
        });
    }
    if payload.seat.len() != legs {
        return Err(OrderError::ArrayLengthMismatch {
            field: "seat",
            expected: legs,
            found: payload.seat.len(),
        });
    }

    let passengers = payload.seat.first().map(Vec::len).unwrap_or(0);
    if passengers == 0 {
        return Err(OrderError::EmptyInput("passengers"));
    }
    for entry in &payload.seat {
        if entry.len() != passengers {
            return Err(OrderError::ArrayLengthMismatch {
                field: "seat",
                expected: passengers,
                found: entry.len(),
            });
        }
    }

    for (field, value) in [
        ("name", &payload.name),
        ("surname", &payload.surname),
        ("birth_date", &payload.birth_date),
    ] {
        if let Some(v) = value {
            if v.len() != passengers {
                return Err(OrderError::ArrayLengthMismatch {
                    field,
                    expected: passengers,
                    found: v.len(),
                });
            }
        }
    }

    if let Some(baggage) = &payload.baggage {
        for entries in baggage.values() {
            if entries.len() != passengers {
                return Err(OrderError::ArrayLengthMismatch {
                    field: "baggage",
                    expected: passengers,
                    found: entries.len(),
                });
            }
        }
    }

    Ok(())
}
