// Request-scope booking context.
//
// A session owns the cache, the generation counter, and the three selection
// managers for one booking attempt, so none of that state leaks across
// sessions. Fetch helpers go cache-first, normalize the vendor body, and
// commit results only when the generation token captured before the network
// call is still current.

use crate::cache::{CacheConfig, TtlCache};
use crate::client::{ApiError, LegQuery, RouteQuery, SeatsQuery, SessionGeneration, VendorGateway};
use crate::normalize::{
    normalize_baggage, normalize_discounts, normalize_free_seats, normalize_routes, NormalizeError,
};
use crate::selection::{BaggageSelection, DiscountSelection, SeatSelection};
use crate::types::{BaggageItem, DiscountItem, RouteSchedule, SeatPlan};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// The search was restarted while this request was in flight; the result
    /// must be discarded, not committed onto stale state.
    #[error("response discarded: search was restarted")]
    Stale,
}

pub struct BookingSession {
    pub seats: SeatSelection,
    pub discounts: DiscountSelection,
    pub baggage: BaggageSelection,
    seat_cache: TtlCache<SeatPlan>,
    route_cache: TtlCache<Vec<RouteSchedule>>,
    generation: SessionGeneration,
}

impl BookingSession {
    pub fn new(passengers: usize, base_price: f64) -> Self {
        Self::with_cache_config(passengers, base_price, CacheConfig::default())
    }

    pub fn with_cache_config(passengers: usize, base_price: f64, cache: CacheConfig) -> Self {
        Self {
            seats: SeatSelection::new(passengers),
            discounts: DiscountSelection::new(passengers, base_price),
            baggage: BaggageSelection::new(),
            seat_cache: TtlCache::new(cache.clone()),
            route_cache: TtlCache::new(cache),
            generation: SessionGeneration::new(),
        }
    }

    /// Drop all selections and cached lookups and invalidate every token
    /// still held by an in-flight request.
    pub fn restart_search(&mut self) {
        self.generation.bump();
        self.seats.clear();
        self.discounts.clear();
        self.baggage.clear();
        self.seat_cache.clear();
        self.route_cache.clear();
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStatsReport {
        self.seat_cache.stats()
    }

    /// Schedule search, cache-backed.
    pub async fn search_routes(
        &mut self,
        gateway: &dyn VendorGateway,
        query: &RouteQuery,
    ) -> Result<Vec<RouteSchedule>, SessionError> {
        let key = format!(
            "routes:{}:{}:{}:{}:{}",
            query.point_from_id, query.point_to_id, query.date, query.currency, query.lang
        );
        if let Some(routes) = self.route_cache.get(&key) {
            return Ok(routes);
        }

        let token = self.generation.token();
        let body = gateway.get_routes(query).await?;
        if !token.is_current() {
            return Err(SessionError::Stale);
        }

        let routes = normalize_routes(&body)?;
        self.route_cache.store(&key, routes.clone(), None);
        Ok(routes)
    }

    /// Seat availability for one leg, cache-backed with occupancy-scaled TTL.
    /// On success the leg's seat list is registered with the seat selection
    /// manager.
    pub async fn load_free_seats(
        &mut self,
        gateway: &dyn VendorGateway,
        query: &SeatsQuery,
    ) -> Result<SeatPlan, SessionError> {
        let key = query.cache_key();
        if let Some(plan) = self.seat_cache.get(&key) {
            self.register_plan(query, &plan);
            return Ok(plan);
        }

        let token = self.generation.token();
        let body = gateway.get_free_seats(query).await?;
        if !token.is_current() {
            return Err(SessionError::Stale);
        }

        let plan = normalize_free_seats(&body)?;
        self.seat_cache
            .store_with_occupancy(&key, plan.clone(), plan.free_count());
        self.register_plan(query, &plan);
        Ok(plan)
    }

    fn register_plan(&mut self, query: &SeatsQuery, plan: &SeatPlan) {
        let seats = plan.seats().into_iter().cloned().collect();
        self.seats.register_leg(query.interval_id.clone(), seats);
    }

    pub async fn load_discounts(
        &mut self,
        gateway: &dyn VendorGateway,
        query: &LegQuery,
    ) -> Result<Vec<DiscountItem>, SessionError> {
        let token = self.generation.token();
        let body = gateway.get_discounts(query).await?;
        if !token.is_current() {
            return Err(SessionError::Stale);
        }
        Ok(normalize_discounts(&body)?)
    }

    pub async fn load_baggage(
        &mut self,
        gateway: &dyn VendorGateway,
        query: &LegQuery,
    ) -> Result<Vec<BaggageItem>, SessionError> {
        let token = self.generation.token();
        let body = gateway.get_baggage(query).await?;
        if !token.is_current() {
            return Err(SessionError::Stale);
        }
        Ok(normalize_baggage(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::NewOrderPayload;
    use crate::types::{IntervalId, SeatLabel};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SEATS_BODY: &str = r#"{
        "trips": [{
            "free_seat": [
                {"seat_num": "1", "seat_free": "1", "seat_price": "10.0", "seat_curency": "EUR"},
                {"seat_num": "2", "seat_free": "1", "seat_price": "12.0", "seat_curency": "EUR"},
                {"seat_num": "3", "seat_free": "0", "seat_price": "12.0", "seat_curency": "EUR"}
            ]
        }]
    }"#;

    #[derive(Default)]
    struct MockGateway {
        responses: Mutex<HashMap<&'static str, String>>,
        calls: AtomicUsize,
        /// When set, the generation is bumped while the request is in
        /// flight, simulating a user restarting the search.
        bump_on_call: Mutex<Option<SessionGeneration>>,
    }

    impl MockGateway {
        fn with_response(op: &'static str, body: &str) -> Self {
            let mock = Self::default();
            mock.responses.lock().insert(op, body.to_string());
            mock
        }

        fn respond(&self, op: &'static str) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(generation) = self.bump_on_call.lock().as_ref() {
                generation.bump();
            }
            self.responses
                .lock()
                .get(op)
                .cloned()
                .ok_or(ApiError::Http { status: 404 })
        }
    }

    #[async_trait]
    impl VendorGateway for MockGateway {
        async fn get_routes(&self, _query: &RouteQuery) -> Result<String, ApiError> {
            self.respond("get_all_routes")
        }
        async fn get_free_seats(&self, _query: &SeatsQuery) -> Result<String, ApiError> {
            self.respond("get_free_seats")
        }
        async fn get_discounts(&self, _query: &LegQuery) -> Result<String, ApiError> {
            self.respond("get_discount")
        }
        async fn get_baggage(&self, _query: &LegQuery) -> Result<String, ApiError> {
            self.respond("get_baggage")
        }
        async fn submit_order(&self, _payload: &NewOrderPayload) -> Result<String, ApiError> {
            self.respond("new_order")
        }
    }

    fn seats_query() -> SeatsQuery {
        SeatsQuery {
            interval_id: IntervalId::new("X"),
            point_from_id: "3".to_string(),
            point_to_id: "7".to_string(),
            currency: "EUR".to_string(),
            lang: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn second_seat_lookup_served_from_cache() {
        let gateway = MockGateway::with_response("get_free_seats", SEATS_BODY);
        let mut session = BookingSession::new(2, 20.0);
        let query = seats_query();

        session.load_free_seats(&gateway, &query).await.unwrap();
        session.load_free_seats(&gateway, &query).await.unwrap();

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        let stats = session.cache_stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn loaded_seats_are_selectable() {
        let gateway = MockGateway::with_response("get_free_seats", SEATS_BODY);
        let mut session = BookingSession::new(2, 20.0);
        let query = seats_query();
        let leg = query.interval_id.clone();

        session.load_free_seats(&gateway, &query).await.unwrap();

        assert!(session.seats.can_select(&leg, &SeatLabel::new("1")));
        assert!(!session.seats.can_select(&leg, &SeatLabel::new("3")), "occupied");
        session.seats.select(&leg, SeatLabel::new("1"));
        session.seats.select(&leg, SeatLabel::new("2"));
        assert!(session.seats.summary().is_valid);
        assert_eq!(session.seats.leg_price(&leg), 22.0);
    }

    #[tokio::test]
    async fn restart_mid_flight_discards_the_response() {
        let gateway = MockGateway::with_response("get_free_seats", SEATS_BODY);
        let mut session = BookingSession::new(2, 20.0);
        *gateway.bump_on_call.lock() = Some(session.generation.clone());

        let err = session
            .load_free_seats(&gateway, &seats_query())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Stale));
        assert!(session.seats.selected(&IntervalId::new("X")).is_empty());
    }

    #[tokio::test]
    async fn restart_clears_state_and_cache() {
        let gateway = MockGateway::with_response("get_free_seats", SEATS_BODY);
        let mut session = BookingSession::new(2, 20.0);
        let query = seats_query();
        let leg = query.interval_id.clone();

        session.load_free_seats(&gateway, &query).await.unwrap();
        session.seats.select(&leg, SeatLabel::new("1"));

        session.restart_search();
        assert!(session.seats.selected(&leg).is_empty());

        // next lookup goes back to the vendor
        session.load_free_seats(&gateway, &query).await.unwrap();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn vendor_error_bubbles_as_normalize_error() {
        let gateway =
            MockGateway::with_response("get_discount", r#"{"error": "interval_no_activ"}"#);
        let mut session = BookingSession::new(1, 10.0);
        let query = LegQuery {
            interval_id: IntervalId::new("X"),
            currency: "EUR".to_string(),
            lang: "en".to_string(),
        };

        let err = session.load_discounts(&gateway, &query).await.unwrap_err();
        match err {
            SessionError::Normalize(NormalizeError::VendorError { code }) => {
                assert_eq!(code, "interval_no_activ");
            }
            other => panic!("expected vendor error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn routes_are_cached_per_search_parameters() {
        let body = r#"{"item": [{"interval_id": "X", "free_seats": "5"}]}"#;
        let gateway = MockGateway::with_response("get_all_routes", body);
        let mut session = BookingSession::new(1, 10.0);
        let query = RouteQuery {
            point_from_id: "3".to_string(),
            point_to_id: "7".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 1, 24).unwrap(),
            currency: "EUR".to_string(),
            lang: "en".to_string(),
        };

        let first = session.search_routes(&gateway, &query).await.unwrap();
        let second = session.search_routes(&gateway, &query).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }
}
