use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

/// NEXO token reward from a card purchase.
#[derive(Debug, Clone, Serialize)]
pub struct CashbackEvent {
    pub tx_id: String,
    pub date: NaiveDateTime,
    pub amount_nexo: Decimal,
    pub value_usd: Decimal,
    /// Derived by FX enrichment; zero until `fx::apply_eur_values` runs.
    pub value_eur: Decimal,
    pub merchant: String,
}

/// Clawback of a previous cashback when a card purchase is refunded.
#[derive(Debug, Clone, Serialize)]
pub struct CashbackReversalEvent {
    pub tx_id: String,
    pub date: NaiveDateTime,
    pub value_usd: Decimal,
    pub value_eur: Decimal,
}

/// Crypto interest or yield payout.
#[derive(Debug, Clone, Serialize)]
pub struct InterestEvent {
    pub tx_id: String,
    pub date: NaiveDateTime,
    pub asset: String,
    pub amount: Decimal,
    pub value_usd: Decimal,
    pub value_eur: Decimal,
    /// Originating type label: "Interest", "Fixed Term Interest", "Exchange Cashback".
    pub source: String,
}

/// Crypto acquired via conversion (fiat to crypto or crypto to crypto).
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeBuyEvent {
    pub tx_id: String,
    pub date: NaiveDateTime,
    pub asset: String,
    pub amount: Decimal,
    pub spent_amount: Decimal,
    pub spent_currency: String,
    pub value_usd: Decimal,
    pub value_eur: Decimal,
}

/// Any event that gives up crypto: sale, swap-out, withdrawal.
#[derive(Debug, Clone, Serialize)]
pub struct DisposalEvent {
    pub tx_id: String,
    pub date: NaiveDateTime,
    pub asset: String,
    /// Always a non-negative magnitude, regardless of the sign in the export.
    pub quantity: Decimal,
    pub proceeds_usd: Decimal,
    pub proceeds_eur: Decimal,
    pub fee_eur: Decimal,
    pub description: String,
}

/// Point-of-sale card charge: USD-like currency debited, EUR credited.
#[derive(Debug, Clone, Serialize)]
pub struct CardPurchaseEvent {
    pub tx_id: String,
    pub date: NaiveDateTime,
    pub eur_amount: Decimal,
    pub usd_amount: Decimal,
    pub merchant: String,
}

/// Credit line repayment: EUR-like debited, USD-like credited.
#[derive(Debug, Clone, Serialize)]
pub struct RepaymentEvent {
    pub tx_id: String,
    pub date: NaiveDateTime,
    pub eur_amount: Decimal,
    pub usd_amount: Decimal,
}

/// Paired EUR/USD amounts sampled from a card purchase, used only to build
/// the daily FX rate table.
#[derive(Debug, Clone, Serialize)]
pub struct FxObservation {
    pub date: NaiveDateTime,
    pub eur_amount: Decimal,
    pub usd_amount: Decimal,
}

/// One classified event. A single row can fan out to two of these
/// (a crypto-to-crypto swap) or to none.
#[derive(Debug, Clone)]
pub enum Event {
    Cashback(CashbackEvent),
    CashbackReversal(CashbackReversalEvent),
    Interest(InterestEvent),
    ExchangeBuy(ExchangeBuyEvent),
    Disposal(DisposalEvent),
    CardPurchase(CardPurchaseEvent),
    Repayment(RepaymentEvent),
    FxObservation(FxObservation),
}

/// All classified events from one or more exports, grouped by kind.
///
/// Each vector is sorted by timestamp ascending; exports arrive in reverse
/// chronological order and merged files interleave, so `sort_by_date` is
/// re-applied after every append.
#[derive(Debug, Clone, Default)]
pub struct Events {
    pub cashback: Vec<CashbackEvent>,
    pub cashback_reversals: Vec<CashbackReversalEvent>,
    pub interest: Vec<InterestEvent>,
    pub exchange_buys: Vec<ExchangeBuyEvent>,
    pub disposals: Vec<DisposalEvent>,
    pub card_purchases: Vec<CardPurchaseEvent>,
    pub repayments: Vec<RepaymentEvent>,
    pub fx_observations: Vec<FxObservation>,
    /// Rows that matched no classification rule (or emitted no events).
    pub dropped_rows: usize,
}

impl Events {
    pub fn push(&mut self, event: Event) {
        match event {
            Event::Cashback(ev) => self.cashback.push(ev),
            Event::CashbackReversal(ev) => self.cashback_reversals.push(ev),
            Event::Interest(ev) => self.interest.push(ev),
            Event::ExchangeBuy(ev) => self.exchange_buys.push(ev),
            Event::Disposal(ev) => self.disposals.push(ev),
            Event::CardPurchase(ev) => self.card_purchases.push(ev),
            Event::Repayment(ev) => self.repayments.push(ev),
            Event::FxObservation(obs) => self.fx_observations.push(obs),
        }
    }

    /// Merge another parsed file into this one. The caller re-sorts.
    pub fn append(&mut self, mut other: Events) {
        self.cashback.append(&mut other.cashback);
        self.cashback_reversals.append(&mut other.cashback_reversals);
        self.interest.append(&mut other.interest);
        self.exchange_buys.append(&mut other.exchange_buys);
        self.disposals.append(&mut other.disposals);
        self.card_purchases.append(&mut other.card_purchases);
        self.repayments.append(&mut other.repayments);
        self.fx_observations.append(&mut other.fx_observations);
        self.dropped_rows += other.dropped_rows;
    }

    /// Sort every collection by timestamp ascending. Tie order among equal
    /// timestamps is unspecified.
    pub fn sort_by_date(&mut self) {
        self.cashback.sort_by_key(|ev| ev.date);
        self.cashback_reversals.sort_by_key(|ev| ev.date);
        self.interest.sort_by_key(|ev| ev.date);
        self.exchange_buys.sort_by_key(|ev| ev.date);
        self.disposals.sort_by_key(|ev| ev.date);
        self.card_purchases.sort_by_key(|ev| ev.date);
        self.repayments.sort_by_key(|ev| ev.date);
        self.fx_observations.sort_by_key(|obs| obs.date);
    }

    pub fn total_events(&self) -> usize {
        self.cashback.len()
            + self.cashback_reversals.len()
            + self.interest.len()
            + self.exchange_buys.len()
            + self.disposals.len()
            + self.card_purchases.len()
            + self.repayments.len()
    }
}
