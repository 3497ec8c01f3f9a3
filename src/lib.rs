// Booking payload pipeline for a bus-ticket reservation vendor: raw response
// normalization, client-side seat/discount/baggage selection state, order
// payload construction, and a TTL-backed lookup cache.

pub mod cache;
pub mod client;
pub mod normalize;
pub mod order;
pub mod selection;
pub mod session;
pub mod types;
pub mod vendor;

// Re-export key types for convenience
pub use cache::{CacheConfig, CacheStatsReport, TtlCache};
pub use client::{
    ApiError, ClientConfig, Credentials, LegQuery, RouteQuery, SeatsQuery, SessionGeneration,
    VendorClient, VendorGateway,
};
pub use normalize::{
    normalize_baggage, normalize_discounts, normalize_free_seats, normalize_order_status,
    normalize_routes, NormalizeError,
};
pub use order::{
    build_new_order, validate_new_order_payload, NewOrderArgs, NewOrderPayload, OrderError,
    OrderPassenger, TripOrder,
};
pub use selection::{BaggageError, BaggageSelection, DiscountSelection, SeatSelection};
pub use session::{BookingSession, SessionError};
pub use types::{
    BaggageItem, BookingStatus, DiscountItem, FreeSeat, IntervalId, RouteSchedule, SeatLabel,
    SeatPlan, VehicleType, Wagon,
};
