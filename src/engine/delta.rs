//! Delta engine: cycle-over-cycle accounting.
//!
//! Each monitored entity owns one cycle state: one per portfolio name and one
//! for the market feed. Applying a snapshot computes the annotations against
//! the previous cycle and then advances the state. There is no I/O here.
//!
//! A snapshot can be applied only once; re-applying it is reported as
//! [`DeltaError::AlreadyApplied`] and leaves the state untouched, so a retry
//! after a failed notification can never double-count.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::types::{
    AnnotatedCoin, AnnotatedMarket, AnnotatedPortfolio, Direction, MarketSnapshot,
    PortfolioSnapshot, PriceMove, Ticker,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    #[error("snapshot {0} was already applied")]
    AlreadyApplied(Uuid),
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioCycleState {
    previous_total: Option<Decimal>,
    cumulative: Decimal,
    last_applied: Option<Uuid>,
}

impl PortfolioCycleState {
    /// Fresh state whose running total starts at `cumulative`.
    pub fn with_cumulative(cumulative: Decimal) -> Self {
        Self {
            cumulative,
            ..Self::default()
        }
    }

    pub fn cumulative(&self) -> Decimal {
        self.cumulative
    }

    pub fn previous_total(&self) -> Option<Decimal> {
        self.previous_total
    }

    pub fn apply(&mut self, snapshot: PortfolioSnapshot) -> Result<AnnotatedPortfolio, DeltaError> {
        if self.last_applied == Some(snapshot.id) {
            return Err(DeltaError::AlreadyApplied(snapshot.id));
        }

        let value_delta = self.previous_total.map(|prev| snapshot.total_value - prev);
        if let Some(delta) = value_delta {
            self.cumulative += delta;
        }
        self.previous_total = Some(snapshot.total_value);
        self.last_applied = Some(snapshot.id);

        Ok(AnnotatedPortfolio {
            direction: Direction::of_decimal(snapshot.change_value_24h),
            value_delta,
            cumulative: self.cumulative,
            snapshot,
        })
    }
}

/// Cycle states of every portfolio, keyed by portfolio name.
#[derive(Debug, Clone, Default)]
pub struct PortfolioLedger {
    states: HashMap<String, PortfolioCycleState>,
}

impl PortfolioLedger {
    /// Seed running totals, e.g. from persisted state.
    pub fn with_accumulators<I>(accumulators: I) -> Self
    where
        I: IntoIterator<Item = (String, Decimal)>,
    {
        let states = accumulators
            .into_iter()
            .map(|(name, total)| (name, PortfolioCycleState::with_cumulative(total)))
            .collect();
        Self { states }
    }

    /// State for `name`, created from `initial_cumulative` on first use.
    pub fn state_mut(&mut self, name: &str, initial_cumulative: Decimal) -> &mut PortfolioCycleState {
        self.states
            .entry(name.to_string())
            .or_insert_with(|| PortfolioCycleState::with_cumulative(initial_cumulative))
    }

    /// Drop every portfolio whose name is not in `names`. Returns the
    /// dropped names.
    pub fn retain_names<'a, I>(&mut self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: HashSet<&str> = names.into_iter().collect();
        let dropped: Vec<String> = self
            .states
            .keys()
            .filter(|name| !keep.contains(name.as_str()))
            .cloned()
            .collect();
        for name in &dropped {
            self.states.remove(name);
        }
        dropped
    }

    pub fn get(&self, name: &str) -> Option<&PortfolioCycleState> {
        self.states.get(name)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn accumulators(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.states.iter().map(|(name, s)| (name.as_str(), s.cumulative))
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketCycleState {
    previous_prices: HashMap<Ticker, f64>,
    previous_btc_dominance: Option<f64>,
    last_applied: Option<Uuid>,
}

impl MarketCycleState {
    pub fn previous_price(&self, symbol: &Ticker) -> Option<f64> {
        self.previous_prices.get(symbol).copied()
    }

    pub fn previous_btc_dominance(&self) -> Option<f64> {
        self.previous_btc_dominance
    }

    pub fn apply(&mut self, snapshot: MarketSnapshot) -> Result<AnnotatedMarket, DeltaError> {
        if self.last_applied == Some(snapshot.id) {
            return Err(DeltaError::AlreadyApplied(snapshot.id));
        }

        let mut seen = HashSet::new();
        let coins = snapshot
            .coins
            .iter()
            .filter(|quote| seen.insert(quote.symbol.clone()))
            .map(|quote| {
                let price_move = quote.price.and_then(|price| {
                    let previous = self.previous_prices.insert(quote.symbol.clone(), price);
                    previous.map(|prev| {
                        let delta = price - prev;
                        PriceMove { direction: Direction::of_f64(delta), delta }
                    })
                });
                AnnotatedCoin { quote: quote.clone(), price_move }
            })
            .collect();

        let btc_dominance_delta = self
            .previous_btc_dominance
            .map(|prev| snapshot.btc_dominance - prev);
        self.previous_btc_dominance = Some(snapshot.btc_dominance);
        self.last_applied = Some(snapshot.id);

        Ok(AnnotatedMarket {
            snapshot,
            coins,
            btc_dominance_delta,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CoinQuote;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn portfolio(total: Decimal, change: Decimal) -> PortfolioSnapshot {
        PortfolioSnapshot::new("owner", total, dec!(0), change)
    }

    fn market(prices: &[(&str, Option<f64>)], btc: f64) -> MarketSnapshot {
        MarketSnapshot {
            id: Uuid::new_v4(),
            coins: prices
                .iter()
                .map(|(sym, price)| CoinQuote {
                    symbol: Ticker::new(sym).unwrap(),
                    name: sym.to_string(),
                    slug: None,
                    price: *price,
                    change_24h: None,
                })
                .collect(),
            top_gainer: None,
            top_loser: None,
            total_market_cap: 1.0e12,
            btc_dominance: btc,
            eth_dominance: 15.0,
            alt_dominance: 100.0 - btc - 15.0,
            captured_at: Utc::now(),
        }
    }

    // -- Portfolio --

    #[test]
    fn test_first_cycle_has_no_delta_but_sets_baseline() {
        let mut state = PortfolioCycleState::default();
        let out = state.apply(portfolio(dec!(1000), dec!(5))).unwrap();
        assert_eq!(out.value_delta, None);
        assert_eq!(out.cumulative, Decimal::ZERO);
        assert_eq!(state.previous_total(), Some(dec!(1000)));
    }

    #[test]
    fn test_accumulator_telescopes() {
        let values = [
            dec!(1000.00),
            dec!(1012.34),
            dec!(987.01),
            dec!(987.01),
            dec!(1500.99),
            dec!(0.01),
            dec!(42.42),
        ];
        let mut state = PortfolioCycleState::default();
        let mut last = None;
        for v in values {
            last = Some(state.apply(portfolio(v, dec!(0))).unwrap());
        }
        let expected = values[values.len() - 1] - values[0];
        assert_eq!(last.unwrap().cumulative, expected);
        assert_eq!(state.cumulative(), expected);
    }

    #[test]
    fn test_accumulator_starts_from_seed() {
        let mut state = PortfolioCycleState::with_cumulative(dec!(-50));
        state.apply(portfolio(dec!(100), dec!(0))).unwrap();
        let out = state.apply(portfolio(dec!(130), dec!(0))).unwrap();
        assert_eq!(out.value_delta, Some(dec!(30)));
        assert_eq!(out.cumulative, dec!(-20));
    }

    #[test]
    fn test_direction_follows_reported_change_not_delta() {
        let mut state = PortfolioCycleState::default();
        state.apply(portfolio(dec!(100), dec!(0))).unwrap();
        // value went up since last cycle but the page reports a 24h loss
        let out = state.apply(portfolio(dec!(110), dec!(-4.5))).unwrap();
        assert_eq!(out.value_delta, Some(dec!(10)));
        assert_eq!(out.direction, Direction::Down);
    }

    #[test]
    fn test_reapplying_snapshot_is_rejected() {
        let mut state = PortfolioCycleState::default();
        state.apply(portfolio(dec!(100), dec!(0))).unwrap();
        let snap = portfolio(dec!(150), dec!(0));
        state.apply(snap.clone()).unwrap();
        assert_eq!(state.cumulative(), dec!(50));

        let err = state.apply(snap.clone()).unwrap_err();
        assert_eq!(err, DeltaError::AlreadyApplied(snap.id));
        assert_eq!(state.cumulative(), dec!(50));
        assert_eq!(state.previous_total(), Some(dec!(150)));
    }

    #[test]
    fn test_ledger_one_state_per_name() {
        let mut ledger = PortfolioLedger::default();
        ledger.state_mut("a", dec!(5)).apply(portfolio(dec!(1), dec!(0))).unwrap();
        ledger.state_mut("a", dec!(999)).apply(portfolio(dec!(3), dec!(0))).unwrap();
        ledger.state_mut("b", Decimal::ZERO);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("a").unwrap().cumulative(), dec!(7));
    }

    #[test]
    fn test_ledger_seeded_accumulator_wins_over_config() {
        let mut ledger = PortfolioLedger::with_accumulators([("main".to_string(), dec!(12.5))]);
        let state = ledger.state_mut("main", dec!(0));
        assert_eq!(state.cumulative(), dec!(12.5));
        assert_eq!(state.previous_total(), None);
    }

    #[test]
    fn test_ledger_drops_removed_portfolios() {
        let mut ledger = PortfolioLedger::with_accumulators([
            ("kept".to_string(), dec!(1)),
            ("gone".to_string(), dec!(2)),
        ]);
        let dropped = ledger.retain_names(["kept", "new"]);
        assert_eq!(dropped, vec!["gone".to_string()]);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get("gone").is_none());
        assert_eq!(ledger.get("kept").unwrap().cumulative(), dec!(1));
    }

    // -- Market --

    #[test]
    fn test_price_indicator_sequences() {
        let cases = [
            (100.0, 100.0, Direction::Unchanged, 0.0),
            (100.0, 101.0, Direction::Up, 1.0),
            (100.0, 99.0, Direction::Down, -1.0),
        ];
        for (first, second, direction, delta) in cases {
            let mut state = MarketCycleState::default();
            let out = state.apply(market(&[("BTC", Some(first))], 50.0)).unwrap();
            assert_eq!(out.coins[0].price_move, None);

            let out = state.apply(market(&[("BTC", Some(second))], 50.0)).unwrap();
            let mv = out.coins[0].price_move.unwrap();
            assert_eq!(mv.direction, direction);
            assert_eq!(mv.delta, delta);
        }
    }

    #[test]
    fn test_new_symbol_mid_run_has_no_delta() {
        let mut state = MarketCycleState::default();
        state.apply(market(&[("BTC", Some(100.0))], 50.0)).unwrap();
        let out = state
            .apply(market(&[("BTC", Some(102.0)), ("ETH", Some(3000.0))], 50.0))
            .unwrap();
        assert!(out.coins[0].price_move.is_some());
        assert!(out.coins[1].price_move.is_none());
    }

    #[test]
    fn test_missing_price_keeps_previous() {
        let mut state = MarketCycleState::default();
        let btc = Ticker::new("BTC").unwrap();
        state.apply(market(&[("BTC", Some(100.0))], 50.0)).unwrap();
        let out = state.apply(market(&[("BTC", None)], 50.0)).unwrap();
        assert!(out.coins[0].price_move.is_none());
        assert_eq!(state.previous_price(&btc), Some(100.0));

        let out = state.apply(market(&[("BTC", Some(90.0))], 50.0)).unwrap();
        assert_eq!(out.coins[0].price_move.unwrap().delta, -10.0);
    }

    #[test]
    fn test_btc_dominance_delta() {
        let mut state = MarketCycleState::default();
        let out = state.apply(market(&[], 52.5)).unwrap();
        assert_eq!(out.btc_dominance_delta, None);
        let out = state.apply(market(&[], 52.0)).unwrap();
        assert_eq!(out.btc_dominance_delta, Some(-0.5));
        assert_eq!(state.previous_btc_dominance(), Some(52.0));
    }

    #[test]
    fn test_market_reapply_rejected() {
        let mut state = MarketCycleState::default();
        let snap = market(&[("BTC", Some(100.0))], 50.0);
        state.apply(snap.clone()).unwrap();
        assert!(matches!(state.apply(snap), Err(DeltaError::AlreadyApplied(_))));
    }
}
