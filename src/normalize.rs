// Normalization of raw vendor responses into canonical typed structures.
//
// Every normalizer accepts the raw response body and either returns the
// canonical shape or a typed error. Missing fields default to documented
// neutral values (0 for prices and counts, empty sequences for collections);
// a vendor-reported business condition surfaces as `VendorError` carrying the
// raw token so the UI layer can translate it.

use crate::types::{
    BaggageItem, BookingStatus, DiscountItem, FreeSeat, IntervalId, RouteSchedule, SeatLabel,
    SeatPlan, VehicleType, Wagon,
};
use crate::vendor::{
    extract_xml_error, RawBaggageResponse, RawDiscountsResponse, RawErrorEnvelope,
    RawOrderResponse, RawRouteItem, RawRoutesResponse, RawSeat, RawSeatsResponse, Scalar,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// Payload shape unrecognized; not retryable by this layer.
    #[error("malformed vendor response: {0}")]
    MalformedResponse(String),

    /// Vendor-reported business condition (inactive dealer, expired interval,
    /// sold-out seat). Carries the raw token for localized display upstream.
    #[error("vendor error: {code}")]
    VendorError { code: String },
}

/// Parse a raw body into the given wire shape, routing vendor business
/// errors (JSON envelope or XML fallback) to `VendorError`.
fn parse_raw<T: DeserializeOwned>(body: &str) -> Result<T, NormalizeError> {
    // Business errors take priority over shape mismatches: an error envelope
    // rarely carries the normal payload keys.
    if let Ok(envelope) = serde_json::from_str::<RawErrorEnvelope>(body) {
        if let Some(code) = envelope.error {
            return Err(NormalizeError::VendorError { code });
        }
    }

    match serde_json::from_str::<T>(body) {
        Ok(raw) => Ok(raw),
        Err(json_err) => {
            if let Some(code) = extract_xml_error(body) {
                return Err(NormalizeError::VendorError { code });
            }
            Err(NormalizeError::MalformedResponse(json_err.to_string()))
        }
    }
}

fn flag(s: &Option<Scalar>) -> bool {
    s.as_ref().map(Scalar::as_bool).unwrap_or(false)
}

fn price(s: &Option<Scalar>) -> f64 {
    s.as_ref().map(Scalar::as_f64).unwrap_or(0.0)
}

fn text(s: &Option<String>) -> String {
    s.clone().unwrap_or_default()
}

/// Normalize a full-schedule response into ordered route records.
pub fn normalize_routes(body: &str) -> Result<Vec<RouteSchedule>, NormalizeError> {
    let raw: RawRoutesResponse = parse_raw(body)?;

    let items = raw.item.into_vec();
    let routes = items.iter().filter_map(normalize_route_item).collect();
    Ok(routes)
}

fn normalize_route_item(item: &RawRouteItem) -> Option<RouteSchedule> {
    // A route without an interval id cannot be booked and is dropped.
    let interval_id = IntervalId::new(item.interval_id.as_deref()?);

    let segments = item
        .change_route
        .as_ref()
        .map(|c| c.clone().into_vec().len())
        .filter(|n| *n > 0)
        .unwrap_or(1);

    Some(RouteSchedule {
        interval_id,
        route_name: text(&item.route_name),
        from_id: item
            .point_from_id
            .as_ref()
            .map(|s| s.as_u64().to_string())
            .unwrap_or_default(),
        to_id: item
            .point_to_id
            .as_ref()
            .map(|s| s.as_u64().to_string())
            .unwrap_or_default(),
        departure: join_stamp(&item.date_from, &item.time_from),
        arrival: join_stamp(&item.date_to, &item.time_to),
        currency: text(&item.currency),
        price: price(&item.price),
        free_seats: item.free_seats.as_ref().map(|s| s.as_u64() as u32).unwrap_or(0),
        vehicle: item
            .trans
            .as_deref()
            .map(VehicleType::parse)
            .unwrap_or(VehicleType::Bus),
        segments,
        request_get_free_seats: flag(&item.request_get_free_seats),
        request_get_discount: flag(&item.request_get_discount),
        request_get_baggage: flag(&item.request_get_baggage),
        need_order_data: flag(&item.need_order_data),
        need_birth: flag(&item.need_birth),
    })
}

fn join_stamp(date: &Option<String>, time: &Option<String>) -> String {
    match (date.as_deref(), time.as_deref()) {
        (Some(d), Some(t)) => format!("{d} {t}"),
        (Some(d), None) => d.to_string(),
        (None, Some(t)) => t.to_string(),
        (None, None) => String::new(),
    }
}

/// Normalize a free-seats response. Bus trips carry a flat seat list; train
/// trips group seats into wagons. Seat numbers are canonicalized so they can
/// be compared and deduplicated.
pub fn normalize_free_seats(body: &str) -> Result<SeatPlan, NormalizeError> {
    let raw: RawSeatsResponse = parse_raw(body)?;

    let trips = raw.trips.into_vec();
    let trip = trips
        .into_iter()
        .next()
        .ok_or_else(|| NormalizeError::MalformedResponse("response carries no trips".into()))?;

    if let Some(wagons) = trip.vagon {
        let wagons = wagons
            .into_vec()
            .into_iter()
            .map(|w| Wagon {
                id: w
                    .vagon_id
                    .as_ref()
                    .map(|s| s.as_u64().to_string())
                    .unwrap_or_default(),
                class: text(&w.vagon_class),
                seats: normalize_seats(w.free_seat.into_vec()),
            })
            .collect();
        return Ok(SeatPlan::Wagons(wagons));
    }

    let seats = trip
        .free_seat
        .map(|s| normalize_seats(s.into_vec()))
        .unwrap_or_default();
    Ok(SeatPlan::Flat(seats))
}

fn normalize_seats(raw: Vec<RawSeat>) -> Vec<FreeSeat> {
    let mut seats: Vec<FreeSeat> = Vec::with_capacity(raw.len());
    for s in raw {
        let number = match &s.seat_num {
            Some(Scalar::Str(label)) => SeatLabel::new(label),
            Some(num) => SeatLabel::new(&num.as_u64().to_string()),
            None => continue,
        };
        // vendor responses occasionally repeat a seat under padded labels
        if seats.iter().any(|existing| existing.number == number) {
            continue;
        }
        seats.push(FreeSeat {
            number,
            free: flag(&s.seat_free),
            price: price(&s.seat_price),
            currency: text(&s.seat_curency),
        });
    }
    seats
}

/// Normalize a discounts response for one trip leg.
pub fn normalize_discounts(body: &str) -> Result<Vec<DiscountItem>, NormalizeError> {
    let raw: RawDiscountsResponse = parse_raw(body)?;

    let discounts = raw
        .discounts
        .into_vec()
        .into_iter()
        .filter_map(|d| {
            let id = match &d.discount_id {
                Some(Scalar::Str(s)) => s.clone(),
                Some(num) => num.as_u64().to_string(),
                None => return None,
            };
            Some(DiscountItem {
                id,
                name: text(&d.discount_name),
                price: price(&d.discount_price),
                currency: text(&d.discount_currency),
                max_price: d.discount_price_max.as_ref().map(Scalar::as_f64),
                note: d.discount_description.clone(),
            })
        })
        .collect();
    Ok(discounts)
}

/// Normalize a baggage response for one trip leg.
pub fn normalize_baggage(body: &str) -> Result<Vec<BaggageItem>, NormalizeError> {
    let raw: RawBaggageResponse = parse_raw(body)?;

    let items = raw
        .baggage
        .into_vec()
        .into_iter()
        .filter_map(|b| {
            let id = match &b.baggage_id {
                Some(Scalar::Str(s)) => s.clone(),
                Some(num) => num.as_u64().to_string(),
                None => return None,
            };
            let (length_cm, width_cm, height_cm) = b.dims();
            Some(BaggageItem {
                id,
                title: text(&b.baggage_title),
                length_cm,
                width_cm,
                height_cm,
                kg: b.kg_limit(),
                price: b.price_or_zero(),
                currency: text(&b.currency),
                max_per_person: b.person_limit(),
                max_in_bus: b.bus_limit(),
            })
        })
        .collect();
    Ok(items)
}

/// Normalize a new-order / order-status response into its tagged variant.
pub fn normalize_order_status(body: &str) -> Result<BookingStatus, NormalizeError> {
    let raw: RawOrderResponse = parse_raw(body)?;

    let status_token = raw
        .status
        .clone()
        .ok_or_else(|| NormalizeError::MalformedResponse("response carries no status".into()))?;
    let order_id = raw.order_id.as_ref().map(Scalar::as_u64).unwrap_or(0);

    let status = match status_token.to_ascii_lowercase().as_str() {
        "reserve" | "reserve_ok" | "reserved" => BookingStatus::Reserved {
            order_id,
            security: raw
                .security
                .as_ref()
                .map(|s| match s {
                    Scalar::Str(v) => v.clone(),
                    other => other.as_u64().to_string(),
                })
                .unwrap_or_default(),
            reservation_until: raw
                .reservation_until
                .as_deref()
                .and_then(parse_reservation_stamp),
            price_total: price(&raw.price_total),
            currency: text(&raw.currency),
        },
        "buy" | "buy_ok" | "paid" => BookingStatus::Paid {
            order_id,
            price_total: price(&raw.price_total),
            currency: text(&raw.currency),
        },
        "error" | "failed" => BookingStatus::Failed {
            code: raw.error.error.unwrap_or(status_token),
        },
        "expired" | "cancel_expired" => BookingStatus::Expired { order_id },
        _ => BookingStatus::Unknown {
            status: status_token,
        },
    };
    Ok(status)
}

fn parse_reservation_stamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .ok()
        })
}
