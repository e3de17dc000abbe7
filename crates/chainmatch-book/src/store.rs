//! Arena of resting orders.
//!
//! The book's sides and price levels hold [`OrderId`]s only; every resting
//! [`Order`] lives here exactly once. Lookups during matching go through
//! the store, so an order mutated by a fill is observed everywhere without
//! shared pointers.

use std::collections::{BTreeSet, HashMap};

use chainmatch_types::{Order, OrderId, PartyId};

/// Owns every order resting on the book, keyed by id, with a per-party
/// index for deterministic party-scoped queries.
#[derive(Debug, Default, Clone)]
pub struct OrderStore {
    orders: HashMap<OrderId, Order>,
    by_party: HashMap<PartyId, BTreeSet<OrderId>>,
}

impl OrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order. Panics if the id is already present: duplicate ids
    /// reaching the store mean the caller's duplicate check is broken.
    pub fn insert(&mut self, order: Order) {
        let id = order.id.clone();
        let party = order.party.clone();
        if self.orders.insert(id.clone(), order).is_some() {
            panic!("order store already holds an order with id {id}");
        }
        self.by_party.entry(party).or_default().insert(id);
    }

    /// Remove an order, returning it if it was present.
    pub fn remove(&mut self, id: &OrderId) -> Option<Order> {
        let order = self.orders.remove(id)?;
        if let Some(ids) = self.by_party.get_mut(&order.party) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_party.remove(&order.party);
            }
        }
        Some(order)
    }

    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn get_mut(&mut self, id: &OrderId) -> Option<&mut Order> {
        self.orders.get_mut(id)
    }

    /// Lookup that treats a missing id as an internal bug. Levels only hold
    /// ids of orders they inserted into the store.
    #[must_use]
    pub fn expect(&self, id: &OrderId) -> &Order {
        self.orders
            .get(id)
            .unwrap_or_else(|| panic!("order {id} indexed but missing from the store"))
    }

    pub fn expect_mut(&mut self, id: &OrderId) -> &mut Order {
        self.orders
            .get_mut(id)
            .unwrap_or_else(|| panic!("order {id} indexed but missing from the store"))
    }

    #[must_use]
    pub fn contains(&self, id: &OrderId) -> bool {
        self.orders.contains_key(id)
    }

    /// Ids of all orders for a party, in id order.
    #[must_use]
    pub fn party_order_ids(&self, party: &PartyId) -> Vec<OrderId> {
        self.by_party
            .get(party)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All order ids, sorted. Used for teardown and the expiry sweep where
    /// iteration order must be replica-independent.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self.orders.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
        self.by_party.clear();
    }
}
