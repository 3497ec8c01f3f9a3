// Client-side selection state for seats, discounts, and baggage.
//
// Each manager is a pure in-memory state machine keyed by trip-leg interval
// id. Bookings are completed or abandoned within one vendor reservation
// window, so nothing here is persisted.

use crate::types::{BaggageItem, DiscountItem, FreeSeat, IntervalId, SeatLabel};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BaggageError {
    #[error("baggage {id}: quantity {requested} exceeds per-vehicle maximum {max}")]
    OverVehicleLimit {
        id: String,
        requested: u32,
        max: u32,
    },

    #[error("baggage {id}: {total} items for {passengers} passengers exceeds per-person maximum {max}")]
    OverPersonLimit {
        id: String,
        total: u32,
        passengers: u32,
        max: u32,
    },
}

#[derive(Debug, Clone, Default)]
struct LegSeats {
    /// Seat list for the leg, kept for price lookup and availability checks.
    available: Vec<FreeSeat>,
    /// Selected seats in selection order (index 0 is the oldest).
    selected: Vec<SeatLabel>,
    price: f64,
}

/// Per-leg seat choices with a fixed passenger capacity.
///
/// Selecting while at capacity evicts the oldest selection and appends the
/// new seat; the replace-oldest policy is deliberate and matches what the
/// booking UI does.
#[derive(Debug, Clone)]
pub struct SeatSelection {
    passengers: usize,
    legs: HashMap<IntervalId, LegSeats>,
}

/// Snapshot of one leg's seat state.
#[derive(Debug, Clone, PartialEq)]
pub struct LegSummary {
    pub leg: IntervalId,
    pub seats: Vec<SeatLabel>,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct SelectionSummary {
    pub legs: Vec<LegSummary>,
    /// True when every registered leg has exactly `passengers` seats.
    pub is_valid: bool,
}

impl SeatSelection {
    pub fn new(passengers: usize) -> Self {
        Self {
            passengers,
            legs: HashMap::new(),
        }
    }

    pub fn passengers(&self) -> usize {
        self.passengers
    }

    /// Register (or refresh) the seat list for a leg. Selected seats that no
    /// longer exist or are no longer free are dropped.
    pub fn register_leg(&mut self, leg: IntervalId, seats: Vec<FreeSeat>) {
        let entry = self.legs.entry(leg).or_default();
        entry.available = seats;
        let LegSeats {
            available,
            selected,
            price,
        } = entry;
        selected.retain(|label| available.iter().any(|s| &s.number == label && s.free));
        *price = recompute_price(available, selected);
    }

    pub fn can_select(&self, leg: &IntervalId, seat: &SeatLabel) -> bool {
        let Some(state) = self.legs.get(leg) else {
            return false;
        };
        if state.selected.contains(seat) {
            // already selected, so the action is a deselect
            return true;
        }
        state.available.iter().any(|s| &s.number == seat && s.free)
    }

    /// Select a seat. No-op when the seat is unknown or occupied; at capacity
    /// the oldest selection is evicted first.
    pub fn select(&mut self, leg: &IntervalId, seat: SeatLabel) {
        if !self.can_select(leg, &seat) {
            return;
        }
        let Some(state) = self.legs.get_mut(leg) else {
            return;
        };
        if state.selected.contains(&seat) {
            return;
        }
        if state.selected.len() >= self.passengers && !state.selected.is_empty() {
            state.selected.remove(0);
        }
        state.selected.push(seat);
        state.price = recompute_price(&state.available, &state.selected);
    }

    pub fn deselect(&mut self, leg: &IntervalId, seat: &SeatLabel) {
        if let Some(state) = self.legs.get_mut(leg) {
            state.selected.retain(|s| s != seat);
            state.price = recompute_price(&state.available, &state.selected);
        }
    }

    /// Toggle semantics the UI maps a seat tap to.
    pub fn toggle(&mut self, leg: &IntervalId, seat: SeatLabel) {
        let selected = self
            .legs
            .get(leg)
            .map(|s| s.selected.contains(&seat))
            .unwrap_or(false);
        if selected {
            self.deselect(leg, &seat);
        } else {
            self.select(leg, seat);
        }
    }

    pub fn selected(&self, leg: &IntervalId) -> &[SeatLabel] {
        self.legs.get(leg).map(|s| s.selected.as_slice()).unwrap_or(&[])
    }

    pub fn leg_price(&self, leg: &IntervalId) -> f64 {
        self.legs.get(leg).map(|s| s.price).unwrap_or(0.0)
    }

    pub fn summary(&self) -> SelectionSummary {
        let mut legs: Vec<LegSummary> = self
            .legs
            .iter()
            .map(|(leg, state)| LegSummary {
                leg: leg.clone(),
                seats: state.selected.clone(),
                price: state.price,
            })
            .collect();
        legs.sort_by(|a, b| a.leg.as_str().cmp(b.leg.as_str()));

        let is_valid = !self.legs.is_empty()
            && self
                .legs
                .values()
                .all(|state| state.selected.len() == self.passengers);
        SelectionSummary { legs, is_valid }
    }

    pub fn clear(&mut self) {
        self.legs.clear();
    }
}

fn recompute_price(available: &[FreeSeat], selected: &[SeatLabel]) -> f64 {
    selected
        .iter()
        .filter_map(|label| available.iter().find(|s| &s.number == label))
        .map(|s| s.price)
        .sum()
}

/// At most one discount per leg; it applies to every passenger on that leg.
#[derive(Debug, Clone)]
pub struct DiscountSelection {
    passengers: usize,
    base_price: f64,
    legs: HashMap<IntervalId, DiscountItem>,
}

impl DiscountSelection {
    pub fn new(passengers: usize, base_price: f64) -> Self {
        Self {
            passengers,
            base_price,
            legs: HashMap::new(),
        }
    }

    /// Select a discount for a leg, replacing any previous choice.
    pub fn select(&mut self, leg: IntervalId, discount: DiscountItem) {
        self.legs.insert(leg, discount);
    }

    pub fn deselect(&mut self, leg: &IntervalId) {
        self.legs.remove(leg);
    }

    pub fn selected(&self, leg: &IntervalId) -> Option<&DiscountItem> {
        self.legs.get(leg)
    }

    /// Total reduction across legs, honoring the vendor's per-passenger cap.
    pub fn total_discount(&self) -> f64 {
        self.legs
            .values()
            .map(|d| d.price.min(d.max_price.unwrap_or(d.price)) * self.passengers as f64)
            .sum()
    }

    /// Final price, clamped so an oversized discount never goes negative.
    pub fn final_price(&self) -> f64 {
        (self.base_price * self.passengers as f64 - self.total_discount()).max(0.0)
    }

    pub fn clear(&mut self) {
        self.legs.clear();
    }
}

/// Chosen extra-baggage quantities for one leg, aggregated across passengers.
#[derive(Debug, Clone, Default)]
pub struct BaggageSelection {
    items: HashMap<String, (BaggageItem, u32)>,
}

impl BaggageSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate quantity for an item, merging with any existing selection.
    /// Exceeding the per-vehicle maximum is rejected outright rather than
    /// deferred to the vendor's order-time validation.
    pub fn add(&mut self, item: &BaggageItem, qty: u32) -> Result<(), BaggageError> {
        if qty == 0 {
            return Ok(());
        }
        let current = self.items.get(&item.id).map(|(_, q)| *q).unwrap_or(0);
        self.set_quantity(item, current + qty)
    }

    pub fn remove(&mut self, item_id: &str) {
        self.items.remove(item_id);
    }

    /// Set the absolute quantity for an item; zero removes it.
    pub fn update_quantity(&mut self, item: &BaggageItem, qty: u32) -> Result<(), BaggageError> {
        if qty == 0 {
            self.remove(&item.id);
            return Ok(());
        }
        self.set_quantity(item, qty)
    }

    fn set_quantity(&mut self, item: &BaggageItem, qty: u32) -> Result<(), BaggageError> {
        if let Some(max) = item.max_in_bus {
            if qty > max {
                return Err(BaggageError::OverVehicleLimit {
                    id: item.id.clone(),
                    requested: qty,
                    max,
                });
            }
        }
        self.items.insert(item.id.clone(), (item.clone(), qty));
        Ok(())
    }

    pub fn quantity(&self, item_id: &str) -> u32 {
        self.items.get(item_id).map(|(_, q)| *q).unwrap_or(0)
    }

    pub fn total_price(&self) -> f64 {
        self.items
            .values()
            .map(|(item, qty)| item.price * *qty as f64)
            .sum()
    }

    pub fn total_items(&self) -> u32 {
        self.items.values().map(|(_, qty)| *qty).sum()
    }

    /// Per-person limit check; quantities are aggregated across passengers so
    /// it can only run once the passenger count is known.
    pub fn validate(&self, passengers: u32) -> Result<(), BaggageError> {
        for (item, qty) in self.items.values() {
            if let Some(max) = item.max_per_person {
                if passengers > 0 && *qty > max * passengers {
                    return Err(BaggageError::OverPersonLimit {
                        id: item.id.clone(),
                        total: *qty,
                        passengers,
                        max,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(num: &str, free: bool, price: f64) -> FreeSeat {
        FreeSeat {
            number: SeatLabel::new(num),
            free,
            price,
            currency: "EUR".to_string(),
        }
    }

    fn leg(id: &str) -> IntervalId {
        IntervalId::new(id)
    }

    fn two_passenger_leg() -> (SeatSelection, IntervalId) {
        let mut sel = SeatSelection::new(2);
        let l = leg("L1");
        sel.register_leg(
            l.clone(),
            vec![
                seat("1", true, 10.0),
                seat("2", true, 12.0),
                seat("3", true, 15.0),
                seat("4", false, 15.0),
            ],
        );
        (sel, l)
    }

    #[test]
    fn cannot_select_occupied_or_unknown_seat() {
        let (sel, l) = two_passenger_leg();
        assert!(sel.can_select(&l, &SeatLabel::new("1")));
        assert!(!sel.can_select(&l, &SeatLabel::new("4")), "occupied");
        assert!(!sel.can_select(&l, &SeatLabel::new("99")), "unknown");
        assert!(!sel.can_select(&leg("other"), &SeatLabel::new("1")));
    }

    #[test]
    fn capacity_never_exceeded_and_oldest_evicted() {
        let (mut sel, l) = two_passenger_leg();
        sel.select(&l, SeatLabel::new("1"));
        sel.select(&l, SeatLabel::new("2"));
        assert_eq!(sel.selected(&l), &[SeatLabel::new("1"), SeatLabel::new("2")]);

        // at capacity: seat 1 (oldest) is replaced
        sel.select(&l, SeatLabel::new("3"));
        assert_eq!(sel.selected(&l), &[SeatLabel::new("2"), SeatLabel::new("3")]);
        assert!(sel.selected(&l).len() <= 2);
    }

    #[test]
    fn price_tracks_selected_set_exactly() {
        let (mut sel, l) = two_passenger_leg();
        sel.select(&l, SeatLabel::new("1"));
        assert_eq!(sel.leg_price(&l), 10.0);
        sel.select(&l, SeatLabel::new("2"));
        assert_eq!(sel.leg_price(&l), 22.0);
        sel.select(&l, SeatLabel::new("3")); // evicts seat 1
        assert_eq!(sel.leg_price(&l), 27.0);
        sel.deselect(&l, &SeatLabel::new("2"));
        assert_eq!(sel.leg_price(&l), 15.0);
        sel.deselect(&l, &SeatLabel::new("3"));
        assert_eq!(sel.leg_price(&l), 0.0);
    }

    #[test]
    fn toggle_selects_then_deselects() {
        let (mut sel, l) = two_passenger_leg();
        sel.toggle(&l, SeatLabel::new("1"));
        assert_eq!(sel.selected(&l).len(), 1);
        sel.toggle(&l, SeatLabel::new("1"));
        assert!(sel.selected(&l).is_empty());
    }

    #[test]
    fn summary_valid_only_when_all_legs_complete() {
        let (mut sel, l1) = two_passenger_leg();
        let l2 = leg("L2");
        sel.register_leg(l2.clone(), vec![seat("5", true, 20.0), seat("6", true, 20.0)]);

        sel.select(&l1, SeatLabel::new("1"));
        sel.select(&l1, SeatLabel::new("2"));
        assert!(!sel.summary().is_valid, "return leg incomplete");

        sel.select(&l2, SeatLabel::new("5"));
        sel.select(&l2, SeatLabel::new("6"));
        let summary = sel.summary();
        assert!(summary.is_valid);
        assert_eq!(summary.legs.len(), 2);
        assert_eq!(summary.legs[0].price, 22.0);
        assert_eq!(summary.legs[1].price, 40.0);
    }

    #[test]
    fn refresh_drops_selections_that_became_occupied() {
        let (mut sel, l) = two_passenger_leg();
        sel.select(&l, SeatLabel::new("1"));
        sel.select(&l, SeatLabel::new("2"));

        sel.register_leg(
            l.clone(),
            vec![seat("1", false, 10.0), seat("2", true, 12.0)],
        );
        assert_eq!(sel.selected(&l), &[SeatLabel::new("2")]);
        assert_eq!(sel.leg_price(&l), 12.0);
    }

    fn discount(id: &str, price: f64, max_price: Option<f64>) -> DiscountItem {
        DiscountItem {
            id: id.to_string(),
            name: format!("discount {id}"),
            price,
            currency: "EUR".to_string(),
            max_price,
            note: None,
        }
    }

    #[test]
    fn discount_select_overwrites_previous_choice() {
        let mut sel = DiscountSelection::new(2, 30.0);
        let l = leg("L1");
        sel.select(l.clone(), discount("a", 5.0, None));
        sel.select(l.clone(), discount("b", 3.0, None));
        assert_eq!(sel.selected(&l).unwrap().id, "b");
        assert_eq!(sel.total_discount(), 6.0);
    }

    #[test]
    fn discount_honors_vendor_cap() {
        let mut sel = DiscountSelection::new(2, 30.0);
        sel.select(leg("L1"), discount("a", 8.0, Some(5.0)));
        assert_eq!(sel.total_discount(), 10.0);
    }

    #[test]
    fn final_price_never_negative() {
        let mut sel = DiscountSelection::new(3, 10.0);
        sel.select(leg("L1"), discount("a", 50.0, None));
        sel.select(leg("L2"), discount("b", 50.0, None));
        assert!(sel.total_discount() > 3.0 * 10.0);
        assert_eq!(sel.final_price(), 0.0);
    }

    #[test]
    fn final_price_subtracts_discounts() {
        let mut sel = DiscountSelection::new(2, 30.0);
        sel.select(leg("L1"), discount("a", 5.0, None));
        assert_eq!(sel.final_price(), 50.0);
        sel.deselect(&leg("L1"));
        assert_eq!(sel.final_price(), 60.0);
    }

    fn bag(id: &str, price: f64, per_person: Option<u32>, in_bus: Option<u32>) -> BaggageItem {
        BaggageItem {
            id: id.to_string(),
            title: format!("bag {id}"),
            length_cm: None,
            width_cm: None,
            height_cm: None,
            kg: None,
            price,
            currency: "EUR".to_string(),
            max_per_person: per_person,
            max_in_bus: in_bus,
        }
    }

    #[test]
    fn baggage_add_merges_quantities() {
        let mut sel = BaggageSelection::new();
        let b = bag("b1", 11.9, None, None);
        sel.add(&b, 1).unwrap();
        sel.add(&b, 2).unwrap();
        assert_eq!(sel.quantity("b1"), 3);
        assert_eq!(sel.total_items(), 3);
        assert!((sel.total_price() - 35.7).abs() < 1e-9);
    }

    #[test]
    fn baggage_zero_quantity_removes() {
        let mut sel = BaggageSelection::new();
        let b = bag("b1", 5.0, None, None);
        sel.add(&b, 2).unwrap();
        sel.update_quantity(&b, 0).unwrap();
        assert_eq!(sel.quantity("b1"), 0);
        assert_eq!(sel.total_price(), 0.0);
    }

    #[test]
    fn baggage_rejects_over_vehicle_limit() {
        let mut sel = BaggageSelection::new();
        let b = bag("b1", 5.0, None, Some(2));
        sel.add(&b, 2).unwrap();
        let err = sel.add(&b, 1).unwrap_err();
        assert_eq!(
            err,
            BaggageError::OverVehicleLimit {
                id: "b1".to_string(),
                requested: 3,
                max: 2
            }
        );
        // rejected add leaves state untouched
        assert_eq!(sel.quantity("b1"), 2);
    }

    #[test]
    fn baggage_validate_checks_per_person_limit() {
        let mut sel = BaggageSelection::new();
        let b = bag("b1", 5.0, Some(1), None);
        sel.add(&b, 3).unwrap();
        assert!(sel.validate(3).is_ok());
        assert!(matches!(
            sel.validate(2),
            Err(BaggageError::OverPersonLimit { .. })
        ));
    }
}
