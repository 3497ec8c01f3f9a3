// Raw vendor wire shapes.
//
// The vendor's JSON is generated from XML, so any collection may arrive
// either as an array or as an object keyed by string indices, and numeric
// fields may arrive as strings. Both quirks are absorbed here so the rest of
// the crate only ever sees ordered sequences and real numbers.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Collection that deserializes from either an array or a string-indexed
/// object. `into_vec` always yields an ordered sequence; object keys are
/// ordered numerically where they parse as integers ("2" before "10").
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemSeq<T> {
    Seq(Vec<T>),
    Map(BTreeMap<String, T>),
    /// Single element emitted without a wrapper, another XML-derived shape.
    One(T),
}

impl<T> ItemSeq<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ItemSeq::Seq(v) => v,
            ItemSeq::Map(m) => {
                let mut entries: Vec<(String, T)> = m.into_iter().collect();
                entries.sort_by_key(|(k, _)| k.parse::<u64>().unwrap_or(u64::MAX));
                entries.into_iter().map(|(_, v)| v).collect()
            }
            ItemSeq::One(v) => vec![v],
        }
    }
}

impl<T> Default for ItemSeq<T> {
    fn default() -> Self {
        ItemSeq::Seq(Vec::new())
    }
}

/// Scalar that deserializes from a number, a numeric string, or a bare bool.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Scalar {
    /// Numeric value, or the documented neutral default when the field is
    /// empty or unparseable.
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Num(n) => *n,
            Scalar::Str(s) => s.trim().parse().unwrap_or(0.0),
            Scalar::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_u64(&self) -> u64 {
        self.as_f64().max(0.0) as u64
    }

    /// Vendor booleans arrive as 0/1, "0"/"1", or true/false.
    pub fn as_bool(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            _ => self.as_f64() != 0.0,
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Num(0.0)
    }
}

fn opt_scalar_f64(s: &Option<Scalar>) -> f64 {
    s.as_ref().map(Scalar::as_f64).unwrap_or(0.0)
}

fn opt_scalar_u32(s: &Option<Scalar>) -> Option<u32> {
    s.as_ref().map(|v| v.as_u64() as u32)
}

/// Business-error envelope the vendor attaches to any response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawErrorEnvelope {
    pub error: Option<String>,
    pub detal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRoutesResponse {
    pub item: ItemSeq<RawRouteItem>,
    #[serde(flatten)]
    pub error: RawErrorEnvelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRouteItem {
    pub interval_id: Option<String>,
    pub route_name: Option<String>,
    pub point_from_id: Option<Scalar>,
    pub point_to_id: Option<Scalar>,
    pub date_from: Option<String>,
    pub time_from: Option<String>,
    pub date_to: Option<String>,
    pub time_to: Option<String>,
    pub price: Option<Scalar>,
    pub currency: Option<String>,
    pub free_seats: Option<Scalar>,
    pub trans: Option<String>,
    pub change_route: Option<ItemSeq<serde_json::Value>>,
    pub request_get_free_seats: Option<Scalar>,
    pub request_get_discount: Option<Scalar>,
    pub request_get_baggage: Option<Scalar>,
    pub need_order_data: Option<Scalar>,
    pub need_birth: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSeatsResponse {
    pub trips: ItemSeq<RawTrip>,
    #[serde(flatten)]
    pub error: RawErrorEnvelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTrip {
    pub free_seat: Option<ItemSeq<RawSeat>>,
    pub vagon: Option<ItemSeq<RawWagon>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawWagon {
    pub vagon_id: Option<Scalar>,
    pub vagon_class: Option<String>,
    pub free_seat: ItemSeq<RawSeat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSeat {
    pub seat_num: Option<Scalar>,
    pub seat_free: Option<Scalar>,
    pub seat_price: Option<Scalar>,
    pub seat_curency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDiscountsResponse {
    pub discounts: ItemSeq<RawDiscount>,
    #[serde(flatten)]
    pub error: RawErrorEnvelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDiscount {
    pub discount_id: Option<Scalar>,
    pub discount_name: Option<String>,
    pub discount_price: Option<Scalar>,
    pub discount_price_max: Option<Scalar>,
    pub discount_currency: Option<String>,
    pub discount_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBaggageResponse {
    pub baggage: ItemSeq<RawBaggage>,
    #[serde(flatten)]
    pub error: RawErrorEnvelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBaggage {
    pub baggage_id: Option<Scalar>,
    pub baggage_title: Option<String>,
    pub length: Option<Scalar>,
    pub width: Option<Scalar>,
    pub height: Option<Scalar>,
    pub kg: Option<Scalar>,
    pub price: Option<Scalar>,
    pub currency: Option<String>,
    pub max_per_person: Option<Scalar>,
    pub max_in_bus: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOrderResponse {
    pub order_id: Option<Scalar>,
    pub status: Option<String>,
    pub security: Option<Scalar>,
    pub reservation_until: Option<String>,
    pub price_total: Option<Scalar>,
    pub currency: Option<String>,
    #[serde(flatten)]
    pub error: RawErrorEnvelope,
}

impl RawBaggage {
    pub fn price_or_zero(&self) -> f64 {
        opt_scalar_f64(&self.price)
    }

    pub fn dims(&self) -> (Option<u32>, Option<u32>, Option<u32>) {
        (
            opt_scalar_u32(&self.length),
            opt_scalar_u32(&self.width),
            opt_scalar_u32(&self.height),
        )
    }

    pub fn kg_limit(&self) -> Option<u32> {
        opt_scalar_u32(&self.kg)
    }

    pub fn person_limit(&self) -> Option<u32> {
        opt_scalar_u32(&self.max_per_person)
    }

    pub fn bus_limit(&self) -> Option<u32> {
        opt_scalar_u32(&self.max_in_bus)
    }
}

/// Some vendor failures come back as XML rather than JSON, shaped like
/// `<response><error>dealer_no_activ</error></response>`. Pull the error
/// token out of such a body, if present.
pub fn extract_xml_error(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"error" => {
                let txt = reader.read_text(e.name()).ok()?;
                let token = txt.trim().to_string();
                return if token.is_empty() { None } else { Some(token) };
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => (),
        }
    }
}
