//! Per-asset FIFO acquisition lots and disposal matching.
//!
//! Finnish capital gains use acquisition-order cost basis: the oldest
//! unconsumed lot is drawn down first, so which lot funds which disposal is
//! decided purely by acquisition date. The ledger is built once from the
//! whole multi-year history and mutated in place as years are processed,
//! which is how partially consumed lots carry forward between tax years.

use crate::config::CurrencyConfig;
use crate::events::{CashbackEvent, DisposalEvent, ExchangeBuyEvent, InterestEvent};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("not enough {asset} lots to cover disposal of {requested} {asset} (shortfall: {shortfall} {asset})")]
    InsufficientLots {
        asset: String,
        requested: Decimal,
        shortfall: Decimal,
    },
}

/// How a lot entered the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LotSource {
    Cashback,
    Interest,
    ExchangeBuy,
}

impl std::fmt::Display for LotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LotSource::Cashback => "cashback",
            LotSource::Interest => "interest",
            LotSource::ExchangeBuy => "exchange_buy",
        };
        write!(f, "{label}")
    }
}

/// One acquisition tranche. `remaining` is drawn down in place by disposals;
/// a lot leaves its queue only when remaining hits zero.
#[derive(Debug, Clone, Serialize)]
pub struct Lot {
    pub asset: String,
    pub acquired_date: NaiveDateTime,
    pub quantity: Decimal,
    pub cost_eur: Decimal,
    pub remaining: Decimal,
    pub tx_id: String,
    pub source: LotSource,
}

impl Lot {
    /// EUR cost still attributable to the unconsumed part of the lot.
    pub fn remaining_cost_eur(&self) -> Decimal {
        self.cost_eur * (self.remaining / self.quantity)
    }
}

/// One lot's contribution to a disposal.
#[derive(Debug, Clone, Serialize)]
pub struct LotConsumption {
    pub tx_id: String,
    pub quantity: Decimal,
    pub cost_eur: Decimal,
    pub acquired_date: NaiveDateTime,
}

/// Outcome of matching one disposal against the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct DisposalResult {
    pub disposal: DisposalEvent,
    pub cost_basis_eur: Decimal,
    pub gain_eur: Decimal,
    pub lots_consumed: Vec<LotConsumption>,
}

/// Per-asset FIFO queues of acquisition lots.
#[derive(Debug, Clone, Default)]
pub struct LotLedger {
    queues: HashMap<String, VecDeque<Lot>>,
}

impl LotLedger {
    /// Build the ledger from every acquisition event across all years.
    /// Cashback always lands on the reward-token asset. Each asset's lots
    /// are sorted by acquisition date before the queue is materialized.
    pub fn build(
        cashback: &[CashbackEvent],
        interest: &[InterestEvent],
        exchange_buys: &[ExchangeBuyEvent],
        config: &CurrencyConfig,
    ) -> Self {
        let mut lots_by_asset: HashMap<String, Vec<Lot>> = HashMap::new();

        for ev in cashback {
            lots_by_asset
                .entry(config.reward_token.clone())
                .or_default()
                .push(Lot {
                    asset: config.reward_token.clone(),
                    acquired_date: ev.date,
                    quantity: ev.amount_nexo,
                    cost_eur: ev.value_eur,
                    remaining: ev.amount_nexo,
                    tx_id: ev.tx_id.clone(),
                    source: LotSource::Cashback,
                });
        }

        for ev in interest {
            lots_by_asset.entry(ev.asset.clone()).or_default().push(Lot {
                asset: ev.asset.clone(),
                acquired_date: ev.date,
                quantity: ev.amount,
                cost_eur: ev.value_eur,
                remaining: ev.amount,
                tx_id: ev.tx_id.clone(),
                source: LotSource::Interest,
            });
        }

        for ev in exchange_buys {
            lots_by_asset.entry(ev.asset.clone()).or_default().push(Lot {
                asset: ev.asset.clone(),
                acquired_date: ev.date,
                quantity: ev.amount,
                cost_eur: ev.value_eur,
                remaining: ev.amount,
                tx_id: ev.tx_id.clone(),
                source: LotSource::ExchangeBuy,
            });
        }

        let mut queues = HashMap::new();
        for (asset, mut lots) in lots_by_asset {
            lots.sort_by_key(|lot| lot.acquired_date);
            queues.insert(asset, VecDeque::from(lots));
        }

        let total: usize = queues.values().map(|q| q.len()).sum();
        log::info!("built lot ledger: {} lots across {} assets", total, queues.len());
        LotLedger { queues }
    }

    /// Resolve a disposal against the asset's queue, oldest lot first.
    ///
    /// Availability is checked before any lot is touched: a shortfall leaves
    /// the ledger unchanged and reports the missing quantity. On success,
    /// each consumed lot contributes cost proportional to the share of its
    /// original quantity used, exhausted lots are popped, and
    /// gain = proceeds − fee − cost consumed.
    pub fn consume(&mut self, disposal: &DisposalEvent) -> Result<DisposalResult, LedgerError> {
        let queue = self.queues.entry(disposal.asset.clone()).or_default();

        let available: Decimal = queue.iter().map(|lot| lot.remaining).sum();
        if available < disposal.quantity {
            return Err(LedgerError::InsufficientLots {
                asset: disposal.asset.clone(),
                requested: disposal.quantity,
                shortfall: disposal.quantity - available,
            });
        }

        let mut qty_needed = disposal.quantity;
        let mut total_cost = Decimal::ZERO;
        let mut lots_consumed = Vec::new();

        while qty_needed > Decimal::ZERO {
            let lot = queue
                .front_mut()
                .expect("availability checked above; queue cannot run dry");
            let used = qty_needed.min(lot.remaining);
            let cost_from_lot = lot.cost_eur * (used / lot.quantity);
            lot.remaining -= used;
            qty_needed -= used;
            total_cost += cost_from_lot;
            lots_consumed.push(LotConsumption {
                tx_id: lot.tx_id.clone(),
                quantity: used,
                cost_eur: cost_from_lot,
                acquired_date: lot.acquired_date,
            });
            log::debug!(
                "lot {} {}: consumed {} for {} EUR, {} remaining",
                lot.tx_id,
                disposal.asset,
                used,
                cost_from_lot,
                lot.remaining
            );
            if lot.remaining.is_zero() {
                queue.pop_front();
            }
        }

        let gain = disposal.proceeds_eur - disposal.fee_eur - total_cost;
        Ok(DisposalResult {
            disposal: disposal.clone(),
            cost_basis_eur: total_cost,
            gain_eur: gain,
            lots_consumed,
        })
    }

    /// Lots with quantity left, across all assets.
    pub fn remaining_lots(&self) -> impl Iterator<Item = &Lot> {
        self.queues
            .values()
            .flat_map(|queue| queue.iter())
            .filter(|lot| lot.remaining > Decimal::ZERO)
    }

    /// Remaining quantity per asset, sorted by asset code.
    pub fn remaining_by_asset(&self) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for lot in self.remaining_lots() {
            *totals.entry(lot.asset.clone()).or_insert(Decimal::ZERO) += lot.remaining;
        }
        totals
    }

    #[cfg(test)]
    pub fn lots_for(&self, asset: &str) -> Vec<&Lot> {
        self.queues
            .get(asset)
            .map(|queue| queue.iter().collect())
            .unwrap_or_default()
    }
}
