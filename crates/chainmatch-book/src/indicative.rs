//! Indicative price and volume bookkeeping for auctions.
//!
//! While a market is in auction the book keeps an incremental view of the
//! crossed region: one row per price carrying bid and ask volume, with
//! off-book volume tracked separately so the uncrossing knows how much of
//! the tradable amount the off-book source provides. Rows are kept in
//! descending price order.

use std::collections::BTreeMap;

use chainmatch_types::{Order, PartyId, Side};
use rust_decimal::Decimal;
use tracing::debug;

use crate::offbook::OffbookSource;
use crate::side::BookSide;

#[derive(Debug, Default, Clone)]
struct IpvVolumes {
    volume: u64,
    offbook_volume: u64,
}

#[derive(Debug, Clone)]
struct IpvPriceLevel {
    price: Decimal,
    buy: IpvVolumes,
    sell: IpvVolumes,
}

/// One row of the cumulative view, prices descending across the slice.
#[derive(Debug, Clone)]
pub struct CumulativeVolumeLevel {
    pub price: Decimal,
    pub bid_volume: u64,
    pub ask_volume: u64,
    pub bid_offbook_volume: u64,
    pub ask_offbook_volume: u64,
    /// Bid volume summed from the highest price down to this row.
    pub cumulative_bid_volume: u64,
    /// Ask volume summed from the lowest price up to this row.
    pub cumulative_ask_volume: u64,
    pub cumulative_bid_offbook: u64,
    pub cumulative_ask_offbook: u64,
    pub max_tradable_amount: u64,
}

#[derive(Debug, Default)]
pub struct IndicativePriceAndVolume {
    /// Rows in descending price order.
    levels: Vec<IpvPriceLevel>,
    /// (min, max) of the last cumulative computation.
    last_region: Option<(Decimal, Decimal)>,
    last_max_tradable: u64,
    last_cumulative_volumes: Option<Vec<CumulativeVolumeLevel>>,
    needs_update: bool,
    /// Off-book shape within the crossed region, grouped by party.
    buy_shape: BTreeMap<PartyId, Vec<Order>>,
    sell_shape: BTreeMap<PartyId, Vec<Order>>,
}

impl IndicativePriceAndVolume {
    /// Build the view from the resting book and the off-book shape. Every
    /// book level gets a row; the crossed-region slicing happens at query
    /// time. `best_bid` and `best_ask` are the merged bests (book and
    /// off-book) and bound the initial off-book shape query.
    pub fn new(
        buys: &BookSide,
        sells: &BookSide,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
        offbook: Option<&dyn OffbookSource>,
    ) -> Self {
        let mut ipv = Self {
            needs_update: true,
            ..Self::default()
        };
        for level in buys.levels() {
            ipv.add_volume_at_price(level.price(), level.volume(), Side::Buy, false);
        }
        for level in sells.levels() {
            ipv.add_volume_at_price(level.price(), level.volume(), Side::Sell, false);
        }
        if let (Some(bid), Some(ask)) = (best_bid, best_ask) {
            if ask <= bid {
                if let Some(src) = offbook {
                    ipv.rebuild_offbook_shape(src, ask, bid);
                }
            }
        }
        debug!(rows = ipv.levels.len(), "built indicative view");
        ipv
    }

    fn row_index(&self, price: Decimal) -> std::result::Result<usize, usize> {
        // descending order, so the comparator flips
        self.levels.binary_search_by(|l| price.cmp(&l.price))
    }

    fn mark_if_in_region(&mut self, price: Decimal) {
        match self.last_region {
            Some((min, max)) if price < min || price > max => {}
            _ => self.needs_update = true,
        }
    }

    /// Record volume arriving at a price, inserting the row if new.
    pub fn add_volume_at_price(&mut self, price: Decimal, volume: u64, side: Side, offbook: bool) {
        let idx = match self.row_index(price) {
            Ok(idx) => idx,
            Err(idx) => {
                self.levels.insert(
                    idx,
                    IpvPriceLevel {
                        price,
                        buy: IpvVolumes::default(),
                        sell: IpvVolumes::default(),
                    },
                );
                idx
            }
        };
        let volumes = match side {
            Side::Buy => &mut self.levels[idx].buy,
            Side::Sell => &mut self.levels[idx].sell,
        };
        volumes.volume += volume;
        if offbook {
            volumes.offbook_volume += volume;
        }
        self.mark_if_in_region(price);
    }

    /// Record volume leaving a price. The row must exist with enough
    /// volume; anything else means the book and this view diverged.
    pub fn remove_volume_at_price(
        &mut self,
        price: Decimal,
        volume: u64,
        side: Side,
        offbook: bool,
    ) {
        let Ok(idx) = self.row_index(price) else {
            panic!("removing indicative volume at unknown price {price}");
        };
        let volumes = match side {
            Side::Buy => &mut self.levels[idx].buy,
            Side::Sell => &mut self.levels[idx].sell,
        };
        volumes.volume = volumes
            .volume
            .checked_sub(volume)
            .unwrap_or_else(|| panic!("indicative volume underflow at price {price}"));
        if offbook {
            volumes.offbook_volume = volumes
                .offbook_volume
                .checked_sub(volume)
                .unwrap_or_else(|| panic!("indicative off-book volume underflow at price {price}"));
        }
        if self.levels[idx].buy.volume == 0 && self.levels[idx].sell.volume == 0 {
            self.levels.remove(idx);
        }
        self.mark_if_in_region(price);
    }

    /// Drop the cached off-book shape and re-query it for the region.
    fn rebuild_offbook_shape(&mut self, offbook: &dyn OffbookSource, min: Decimal, max: Decimal) {
        let buy_shape = std::mem::take(&mut self.buy_shape);
        let sell_shape = std::mem::take(&mut self.sell_shape);
        for order in buy_shape.into_values().flatten() {
            self.remove_volume_at_price(order.price, order.remaining, Side::Buy, true);
        }
        for order in sell_shape.into_values().flatten() {
            self.remove_volume_at_price(order.price, order.remaining, Side::Sell, true);
        }

        let (buys, sells) = offbook.orderbook_shape(min, max, None);
        for order in buys {
            self.add_volume_at_price(order.price, order.remaining, Side::Buy, true);
            self.buy_shape
                .entry(order.party.clone())
                .or_default()
                .push(order);
        }
        for order in sells {
            self.add_volume_at_price(order.price, order.remaining, Side::Sell, true);
            self.sell_shape
                .entry(order.party.clone())
                .or_default()
                .push(order);
        }
        self.needs_update = true;
    }

    /// Cumulative rows for the crossed region between `min_price` and
    /// `max_price`, and the largest tradable amount. Served from cache
    /// when nothing changed since the last call for the same region.
    pub fn get_cumulative_price_levels(
        &mut self,
        max_price: Decimal,
        min_price: Decimal,
        offbook: Option<&dyn OffbookSource>,
    ) -> (Vec<CumulativeVolumeLevel>, u64) {
        let region_changed = self.last_region != Some((min_price, max_price));
        if region_changed {
            if let Some(src) = offbook {
                self.rebuild_offbook_shape(src, min_price, max_price);
            }
        }
        if !self.needs_update && !region_changed {
            if let Some(cached) = &self.last_cumulative_volumes {
                return (cached.clone(), self.last_max_tradable);
            }
        }

        // the merged bests can come from off-book liquidity sitting outside
        // the rows, so the region bounds need not land on a row exactly
        let start = self.levels.partition_point(|l| l.price > max_price);
        let end = self.levels.partition_point(|l| l.price >= min_price);
        let slice = &self.levels[start..end];
        let mut rows: Vec<CumulativeVolumeLevel> = slice
            .iter()
            .map(|l| CumulativeVolumeLevel {
                price: l.price,
                bid_volume: l.buy.volume,
                ask_volume: l.sell.volume,
                bid_offbook_volume: l.buy.offbook_volume,
                ask_offbook_volume: l.sell.offbook_volume,
                cumulative_bid_volume: 0,
                cumulative_ask_volume: 0,
                cumulative_bid_offbook: 0,
                cumulative_ask_offbook: 0,
                max_tradable_amount: 0,
            })
            .collect();

        let mut cum_bid = 0u64;
        let mut cum_bid_offbook = 0u64;
        for row in &mut rows {
            cum_bid += row.bid_volume;
            cum_bid_offbook += row.bid_offbook_volume;
            row.cumulative_bid_volume = cum_bid;
            row.cumulative_bid_offbook = cum_bid_offbook;
        }
        let mut cum_ask = 0u64;
        let mut cum_ask_offbook = 0u64;
        let mut max_tradable = 0u64;
        for row in rows.iter_mut().rev() {
            cum_ask += row.ask_volume;
            cum_ask_offbook += row.ask_offbook_volume;
            row.cumulative_ask_volume = cum_ask;
            row.cumulative_ask_offbook = cum_ask_offbook;
            row.max_tradable_amount = row.cumulative_bid_volume.min(row.cumulative_ask_volume);
            max_tradable = max_tradable.max(row.max_tradable_amount);
        }

        self.last_region = Some((min_price, max_price));
        self.last_max_tradable = max_tradable;
        self.last_cumulative_volumes = Some(rows.clone());
        self.needs_update = false;
        (rows, max_tradable)
    }

    /// The region the last cumulative computation covered, as (min, max).
    #[must_use]
    pub fn get_crossed_region(&self) -> Option<(Decimal, Decimal)> {
        self.last_region
    }

    /// Re-query one party's off-book shape after its liquidity changed,
    /// keeping everyone else's cached shape in place.
    pub fn update_party_shape(&mut self, offbook: &dyn OffbookSource, party: &PartyId) {
        let Some((min, max)) = self.last_region else {
            return;
        };
        for order in self.buy_shape.remove(party).into_iter().flatten() {
            self.remove_volume_at_price(order.price, order.remaining, Side::Buy, true);
        }
        for order in self.sell_shape.remove(party).into_iter().flatten() {
            self.remove_volume_at_price(order.price, order.remaining, Side::Sell, true);
        }
        let (buys, sells) = offbook.orderbook_shape(min, max, Some(party));
        for order in buys {
            self.add_volume_at_price(order.price, order.remaining, Side::Buy, true);
            self.buy_shape
                .entry(order.party.clone())
                .or_default()
                .push(order);
        }
        for order in sells {
            self.add_volume_at_price(order.price, order.remaining, Side::Sell, true);
            self.sell_shape
                .entry(order.party.clone())
                .or_default()
                .push(order);
        }
        self.needs_update = true;
    }

    /// Pull `target` volume of off-book shape eligible at the uncross
    /// price, one combined order per party in party order. The last order
    /// is trimmed to land exactly on the target; falling short means the
    /// cumulative view lied about the off-book contribution.
    pub fn extract_offbook_orders(&self, price: Decimal, side: Side, target: u64) -> Vec<Order> {
        let shapes = match side {
            Side::Buy => &self.buy_shape,
            Side::Sell => &self.sell_shape,
        };
        let mut out = Vec::new();
        let mut total = 0u64;
        for orders in shapes.values() {
            if total >= target {
                break;
            }
            let mut combined: Option<Order> = None;
            for order in orders {
                let eligible = match side {
                    Side::Buy => order.price >= price,
                    Side::Sell => order.price <= price,
                };
                if !eligible {
                    continue;
                }
                match combined.as_mut() {
                    None => combined = Some(order.clone()),
                    Some(c) => {
                        c.size += order.size;
                        c.remaining += order.remaining;
                        c.price = match side {
                            Side::Buy => c.price.max(order.price),
                            Side::Sell => c.price.min(order.price),
                        };
                    }
                }
            }
            if let Some(mut combined) = combined {
                let take = combined.remaining.min(target - total);
                if take == 0 {
                    continue;
                }
                if take < combined.remaining {
                    combined.remaining = take;
                    combined.size = take;
                }
                total += take;
                out.push(combined);
            }
        }
        assert!(
            total == target,
            "off-book shape covers {total} of the {target} expected at {price}"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use chainmatch_types::OrderStatus;

    use crate::offbook::StubOffbookSource;
    use crate::store::OrderStore;

    use super::*;

    fn dec(v: u64) -> Decimal {
        Decimal::from(v)
    }

    fn crossed_book() -> (BookSide, BookSide) {
        let mut buys = BookSide::new(Side::Buy);
        let mut sells = BookSide::new(Side::Sell);
        let mut store = OrderStore::new();
        // crossed region 100..=102
        buys.add_order(&mut store, Order::dummy_limit("b1", "p1", Side::Buy, 102, 10));
        buys.add_order(&mut store, Order::dummy_limit("b2", "p2", Side::Buy, 100, 5));
        buys.add_order(&mut store, Order::dummy_limit("b3", "p3", Side::Buy, 95, 50));
        sells.add_order(&mut store, Order::dummy_limit("s1", "p4", Side::Sell, 100, 6));
        sells.add_order(&mut store, Order::dummy_limit("s2", "p5", Side::Sell, 102, 4));
        sells.add_order(&mut store, Order::dummy_limit("s3", "p6", Side::Sell, 110, 50));
        (buys, sells)
    }

    #[test]
    fn cumulative_rows_and_max_tradable() {
        let (buys, sells) = crossed_book();
        let mut ipv =
            IndicativePriceAndVolume::new(&buys, &sells, Some(dec(102)), Some(dec(100)), None);
        let (rows, max_tradable) = ipv.get_cumulative_price_levels(dec(102), dec(100), None);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, dec(102));
        assert_eq!(rows[0].cumulative_bid_volume, 10);
        assert_eq!(rows[0].cumulative_ask_volume, 10);
        assert_eq!(rows[1].price, dec(100));
        assert_eq!(rows[1].cumulative_bid_volume, 15);
        assert_eq!(rows[1].cumulative_ask_volume, 6);
        // 10 trades at 102, only 6 at 100
        assert_eq!(max_tradable, 10);
    }

    #[test]
    fn cache_survives_out_of_region_changes() {
        let (buys, sells) = crossed_book();
        let mut ipv =
            IndicativePriceAndVolume::new(&buys, &sells, Some(dec(102)), Some(dec(100)), None);
        let (first, _) = ipv.get_cumulative_price_levels(dec(102), dec(100), None);

        // a far-away change leaves the cached region valid
        ipv.add_volume_at_price(dec(90), 100, Side::Buy, false);
        let (second, _) = ipv.get_cumulative_price_levels(dec(102), dec(100), None);
        assert_eq!(first.len(), second.len());

        // an in-region change forces a recompute
        ipv.add_volume_at_price(dec(101), 3, Side::Sell, false);
        let (third, max_tradable) = ipv.get_cumulative_price_levels(dec(102), dec(100), None);
        assert_eq!(third.len(), 3);
        assert_eq!(max_tradable, 10);
    }

    #[test]
    fn region_bounds_need_not_match_a_row() {
        let (buys, sells) = crossed_book();
        let mut ipv =
            IndicativePriceAndVolume::new(&buys, &sells, Some(dec(105)), Some(dec(99)), None);
        // bounds between rows: the slice still covers 100..=102
        let (rows, max_tradable) = ipv.get_cumulative_price_levels(dec(105), dec(99), None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, dec(102));
        assert_eq!(rows[1].price, dec(100));
        assert_eq!(max_tradable, 10);

        // a region holding no rows at all is empty, not fatal
        let (rows, max_tradable) = ipv.get_cumulative_price_levels(dec(98), dec(97), None);
        assert!(rows.is_empty());
        assert_eq!(max_tradable, 0);
    }

    #[test]
    #[should_panic(expected = "unknown price")]
    fn removing_unknown_price_panics() {
        let (buys, sells) = crossed_book();
        let mut ipv =
            IndicativePriceAndVolume::new(&buys, &sells, Some(dec(102)), Some(dec(100)), None);
        ipv.remove_volume_at_price(dec(50), 1, Side::Buy, false);
    }

    #[test]
    fn offbook_shape_counted_separately() {
        let (buys, sells) = crossed_book();
        let mut offbook = StubOffbookSource::new();
        let mut shape = Order::dummy_limit("v1", "amm", Side::Sell, 101, 8);
        shape.generated_offbook = true;
        shape.status = OrderStatus::Active;
        offbook.shape = vec![shape];

        let mut ipv = IndicativePriceAndVolume::new(
            &buys,
            &sells,
            Some(dec(102)),
            Some(dec(100)),
            Some(&offbook),
        );
        let (rows, max_tradable) =
            ipv.get_cumulative_price_levels(dec(102), dec(100), Some(&offbook));
        let row_101 = rows.iter().find(|r| r.price == dec(101)).unwrap();
        assert_eq!(row_101.ask_volume, 8);
        assert_eq!(row_101.ask_offbook_volume, 8);
        assert_eq!(max_tradable, 10);

        let extracted = ipv.extract_offbook_orders(dec(101), Side::Sell, 8);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].remaining, 8);
    }

    #[test]
    fn extract_offbook_combines_per_party_and_trims() {
        let (buys, sells) = crossed_book();
        let mut offbook = StubOffbookSource::new();
        offbook.shape = vec![
            Order::dummy_limit("v1", "amm-a", Side::Buy, 102, 4),
            Order::dummy_limit("v2", "amm-a", Side::Buy, 101, 4),
            Order::dummy_limit("v3", "amm-b", Side::Buy, 102, 4),
        ];
        let mut ipv = IndicativePriceAndVolume::new(
            &buys,
            &sells,
            Some(dec(102)),
            Some(dec(100)),
            Some(&offbook),
        );
        ipv.get_cumulative_price_levels(dec(102), dec(100), Some(&offbook));

        let extracted = ipv.extract_offbook_orders(dec(101), Side::Buy, 10);
        assert_eq!(extracted.len(), 2);
        // amm-a's two orders combine at the better price
        assert_eq!(extracted[0].remaining, 8);
        assert_eq!(extracted[0].price, dec(102));
        // amm-b trimmed to hit the target exactly
        assert_eq!(extracted[1].remaining, 2);
    }

    #[test]
    #[should_panic(expected = "off-book shape covers")]
    fn extract_offbook_shortfall_panics() {
        let (buys, sells) = crossed_book();
        let ipv =
            IndicativePriceAndVolume::new(&buys, &sells, Some(dec(102)), Some(dec(100)), None);
        ipv.extract_offbook_orders(dec(100), Side::Buy, 5);
    }
}
