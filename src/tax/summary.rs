//! Per-year aggregation over classified, FX-enriched events.

use crate::events::Events;
use crate::tax::ledger::{DisposalResult, LedgerError, LotLedger};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Tax summary for a single calendar year.
///
/// The lot inventory fields reflect the shared ledger at the time this year
/// finished processing, i.e. cumulative cross-year state, not a snapshot
/// limited to this year's acquisitions.
#[derive(Debug, Clone, Serialize)]
pub struct AnnualSummary {
    pub year: i32,
    pub total_cashback_events: usize,
    pub total_cashback_nexo: Decimal,
    pub total_cashback_eur: Decimal,
    pub total_cashback_reversal_events: usize,
    pub total_cashback_reversal_eur: Decimal,
    pub total_interest_events: usize,
    pub total_interest_by_asset: BTreeMap<String, Decimal>,
    pub total_interest_eur: Decimal,
    pub total_exchange_buy_events: usize,
    pub total_exchange_buy_by_asset: BTreeMap<String, Decimal>,
    pub total_exchange_buy_eur: Decimal,
    pub disposal_results: Vec<DisposalResult>,
    pub total_disposal_proceeds_eur: Decimal,
    pub total_disposal_cost_basis_eur: Decimal,
    pub total_disposal_gain_eur: Decimal,
    pub remaining_lots: usize,
    pub remaining_by_asset: BTreeMap<String, Decimal>,
}

impl AnnualSummary {
    /// Cashback income net of reversals; the base for cashback tax.
    pub fn net_cashback_eur(&self) -> Decimal {
        self.total_cashback_eur - self.total_cashback_reversal_eur
    }

    /// Total capital income for the year: net cashback plus interest.
    pub fn total_capital_income_eur(&self) -> Decimal {
        self.net_cashback_eur() + self.total_interest_eur
    }
}

/// Aggregate one year's events and run its disposals, in chronological
/// order, against the shared ledger. Years must be processed ascending so
/// partially consumed lots carry forward correctly.
pub fn summarize_year(
    year: i32,
    events: &Events,
    ledger: &mut LotLedger,
) -> Result<AnnualSummary, LedgerError> {
    let in_year = |date: chrono::NaiveDateTime| date.year() == year;

    let year_cashback: Vec<_> = events.cashback.iter().filter(|ev| in_year(ev.date)).collect();
    let year_reversals: Vec<_> = events
        .cashback_reversals
        .iter()
        .filter(|ev| in_year(ev.date))
        .collect();
    let year_interest: Vec<_> = events.interest.iter().filter(|ev| in_year(ev.date)).collect();
    let year_buys: Vec<_> = events
        .exchange_buys
        .iter()
        .filter(|ev| in_year(ev.date))
        .collect();

    let total_cashback_nexo = year_cashback.iter().map(|ev| ev.amount_nexo).sum();
    let total_cashback_eur = year_cashback.iter().map(|ev| ev.value_eur).sum();
    let total_cashback_reversal_eur = year_reversals.iter().map(|ev| ev.value_eur).sum();

    let mut total_interest_by_asset: BTreeMap<String, Decimal> = BTreeMap::new();
    for ev in &year_interest {
        *total_interest_by_asset
            .entry(ev.asset.clone())
            .or_insert(Decimal::ZERO) += ev.amount;
    }
    let total_interest_eur = year_interest.iter().map(|ev| ev.value_eur).sum();

    let mut total_exchange_buy_by_asset: BTreeMap<String, Decimal> = BTreeMap::new();
    for ev in &year_buys {
        *total_exchange_buy_by_asset
            .entry(ev.asset.clone())
            .or_insert(Decimal::ZERO) += ev.amount;
    }
    let total_exchange_buy_eur = year_buys.iter().map(|ev| ev.value_eur).sum();

    let mut disposal_results = Vec::new();
    for disposal in events.disposals.iter().filter(|ev| in_year(ev.date)) {
        disposal_results.push(ledger.consume(disposal)?);
    }

    let total_disposal_proceeds_eur = disposal_results
        .iter()
        .map(|r| r.disposal.proceeds_eur - r.disposal.fee_eur)
        .sum();
    let total_disposal_cost_basis_eur = disposal_results.iter().map(|r| r.cost_basis_eur).sum();
    let total_disposal_gain_eur = disposal_results.iter().map(|r| r.gain_eur).sum();

    Ok(AnnualSummary {
        year,
        total_cashback_events: year_cashback.len(),
        total_cashback_nexo,
        total_cashback_eur,
        total_cashback_reversal_events: year_reversals.len(),
        total_cashback_reversal_eur,
        total_interest_events: year_interest.len(),
        total_interest_by_asset,
        total_interest_eur,
        total_exchange_buy_events: year_buys.len(),
        total_exchange_buy_by_asset,
        total_exchange_buy_eur,
        disposal_results,
        total_disposal_proceeds_eur,
        total_disposal_cost_basis_eur,
        total_disposal_gain_eur,
        remaining_lots: ledger.remaining_lots().count(),
        remaining_by_asset: ledger.remaining_by_asset(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrencyConfig;
    use crate::events::{CashbackEvent, DisposalEvent, InterestEvent};
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn cashback(tx_id: &str, date: &str, qty: Decimal, eur: Decimal) -> CashbackEvent {
        CashbackEvent {
            tx_id: tx_id.to_string(),
            date: dt(date),
            amount_nexo: qty,
            value_usd: Decimal::ZERO,
            value_eur: eur,
            merchant: "shop".to_string(),
        }
    }

    fn interest(tx_id: &str, date: &str, asset: &str, qty: Decimal, eur: Decimal) -> InterestEvent {
        InterestEvent {
            tx_id: tx_id.to_string(),
            date: dt(date),
            asset: asset.to_string(),
            amount: qty,
            value_usd: Decimal::ZERO,
            value_eur: eur,
            source: "Interest".to_string(),
        }
    }

    fn disposal(date: &str, asset: &str, qty: Decimal, proceeds_eur: Decimal) -> DisposalEvent {
        DisposalEvent {
            tx_id: "sell".to_string(),
            date: dt(date),
            asset: asset.to_string(),
            quantity: qty,
            proceeds_usd: Decimal::ZERO,
            proceeds_eur,
            fee_eur: Decimal::ZERO,
            description: "sell".to_string(),
        }
    }

    fn build_ledger(events: &Events) -> LotLedger {
        LotLedger::build(
            &events.cashback,
            &events.interest,
            &events.exchange_buys,
            &CurrencyConfig::default(),
        )
    }

    #[test]
    fn sums_are_scoped_to_the_year() {
        let mut events = Events::default();
        events.cashback.push(cashback("c1", "2024-02-01 00:00:00", dec!(10), dec!(8)));
        events.cashback.push(cashback("c2", "2025-02-01 00:00:00", dec!(4), dec!(5)));
        events
            .interest
            .push(interest("i1", "2024-03-01 00:00:00", "DOT", dec!(2), dec!(12)));
        events.sort_by_date();

        let mut ledger = build_ledger(&events);
        let summary = summarize_year(2024, &events, &mut ledger).unwrap();

        assert_eq!(summary.total_cashback_events, 1);
        assert_eq!(summary.total_cashback_nexo, dec!(10));
        assert_eq!(summary.total_cashback_eur, dec!(8));
        assert_eq!(summary.total_interest_events, 1);
        assert_eq!(summary.total_interest_by_asset["DOT"], dec!(2));
        assert_eq!(summary.total_interest_eur, dec!(12));
        assert_eq!(summary.total_capital_income_eur(), dec!(20));

        // inventory spans all years: 2025's lot is already in the ledger
        assert_eq!(summary.remaining_lots, 3);
        assert_eq!(summary.remaining_by_asset["NEXO"], dec!(14));
    }

    #[test]
    fn reversals_reduce_net_cashback() {
        let mut events = Events::default();
        events.cashback.push(cashback("c1", "2024-02-01 00:00:00", dec!(10), dec!(8)));
        events
            .cashback_reversals
            .push(crate::events::CashbackReversalEvent {
                tx_id: "r1".to_string(),
                date: dt("2024-02-10 00:00:00"),
                value_usd: Decimal::ZERO,
                value_eur: dec!(3),
            });

        let mut ledger = build_ledger(&events);
        let summary = summarize_year(2024, &events, &mut ledger).unwrap();

        assert_eq!(summary.total_cashback_reversal_events, 1);
        assert_eq!(summary.net_cashback_eur(), dec!(5));
    }

    #[test]
    fn disposals_run_against_shared_ledger() {
        let mut events = Events::default();
        events.cashback.push(cashback("c1", "2024-01-01 00:00:00", dec!(10), dec!(8)));
        events
            .disposals
            .push(disposal("2024-06-01 00:00:00", "NEXO", dec!(4), dec!(6)));

        let mut ledger = build_ledger(&events);
        let summary = summarize_year(2024, &events, &mut ledger).unwrap();

        assert_eq!(summary.disposal_results.len(), 1);
        assert_eq!(summary.total_disposal_proceeds_eur, dec!(6));
        assert_eq!(summary.total_disposal_cost_basis_eur, dec!(3.2));
        assert_eq!(summary.total_disposal_gain_eur, dec!(2.8));
        assert_eq!(summary.remaining_by_asset["NEXO"], dec!(6));
    }

    #[test]
    fn partially_consumed_lot_carries_into_next_year() {
        let mut events = Events::default();
        events.cashback.push(cashback("c1", "2024-01-01 00:00:00", dec!(10), dec!(8)));
        events
            .disposals
            .push(disposal("2024-06-01 00:00:00", "NEXO", dec!(4), dec!(6)));
        events
            .disposals
            .push(disposal("2025-06-01 00:00:00", "NEXO", dec!(6), dec!(9)));

        let mut ledger = build_ledger(&events);
        let summary_2024 = summarize_year(2024, &events, &mut ledger).unwrap();
        assert_eq!(summary_2024.remaining_by_asset["NEXO"], dec!(6));

        let summary_2025 = summarize_year(2025, &events, &mut ledger).unwrap();
        // residual cost of the 2024 lot: 8 * 6/10
        assert_eq!(summary_2025.total_disposal_cost_basis_eur, dec!(4.8));
        assert_eq!(summary_2025.total_disposal_gain_eur, dec!(4.2));
        assert_eq!(summary_2025.remaining_lots, 0);
        assert!(summary_2025.remaining_by_asset.is_empty());
    }

    #[test]
    fn ledger_shortfall_propagates() {
        let mut events = Events::default();
        events.cashback.push(cashback("c1", "2024-01-01 00:00:00", dec!(5), dec!(4)));
        events
            .disposals
            .push(disposal("2024-06-01 00:00:00", "NEXO", dec!(10), dec!(20)));

        let mut ledger = build_ledger(&events);
        let err = summarize_year(2024, &events, &mut ledger).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientLots { shortfall, .. } if shortfall == dec!(5)));
    }

    #[test]
    fn empty_year_yields_zeroes() {
        let events = Events::default();
        let mut ledger = build_ledger(&events);
        let summary = summarize_year(2024, &events, &mut ledger).unwrap();
        assert_eq!(summary.total_cashback_events, 0);
        assert_eq!(summary.total_disposal_gain_eur, Decimal::ZERO);
        assert_eq!(summary.remaining_lots, 0);
    }
}
