use crate::config::CurrencyConfig;
use crate::events::{
    CardPurchaseEvent, CashbackEvent, CashbackReversalEvent, DisposalEvent, Event,
    ExchangeBuyEvent, FxObservation, InterestEvent, RepaymentEvent,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DETAIL_PREFIX: &str = "approved / ";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("input is empty or has no header row")]
    EmptyInput,
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("transaction {tx_id}: invalid {field} '{value}'")]
    InvalidNumber {
        tx_id: String,
        field: &'static str,
        value: String,
    },
    #[error("transaction {tx_id}: invalid timestamp '{value}'")]
    InvalidTimestamp { tx_id: String, value: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One row of the Nexo CSV export. Amount columns stay as raw strings so a
/// malformed value surfaces with the owning transaction id, not as an
/// anonymous deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Transaction")]
    pub tx_id: String,
    #[serde(rename = "Type")]
    pub tx_type: String,
    #[serde(rename = "Input Currency")]
    pub input_currency: String,
    #[serde(rename = "Input Amount")]
    pub input_amount: String,
    #[serde(rename = "Output Currency")]
    pub output_currency: String,
    #[serde(rename = "Output Amount")]
    pub output_amount: String,
    #[serde(rename = "USD Equivalent")]
    pub usd_equivalent: String,
    #[serde(rename = "Fee")]
    pub fee: String,
    #[serde(rename = "Fee Currency")]
    pub fee_currency: String,
    #[serde(rename = "Details")]
    pub details: String,
    #[serde(rename = "Date / Time (UTC)")]
    pub date_time: String,
}

/// Eagerly parsed fields shared by every rule. The output amount is parsed
/// lazily because most row kinds never read it and the export leaves it
/// blank for some of them.
struct ParsedRow {
    tx_id: String,
    tx_type: String,
    input_currency: String,
    input_amount: Decimal,
    output_currency: String,
    output_amount_raw: String,
    value_usd: Decimal,
    detail: String,
    date: NaiveDateTime,
}

impl ParsedRow {
    fn from_record(record: &RawRecord) -> Result<Self, ImportError> {
        let input_amount = parse_decimal(&record.tx_id, "input amount", &record.input_amount)?;
        let value_usd = parse_decimal(
            &record.tx_id,
            "USD equivalent",
            record.usd_equivalent.trim_start_matches('$'),
        )?;
        let date = NaiveDateTime::parse_from_str(&record.date_time, TIMESTAMP_FORMAT).map_err(
            |_| ImportError::InvalidTimestamp {
                tx_id: record.tx_id.clone(),
                value: record.date_time.clone(),
            },
        )?;

        Ok(ParsedRow {
            tx_id: record.tx_id.clone(),
            tx_type: record.tx_type.clone(),
            input_currency: record.input_currency.clone(),
            input_amount,
            output_currency: record.output_currency.clone(),
            output_amount_raw: record.output_amount.clone(),
            value_usd,
            detail: extract_detail(&record.details),
            date,
        })
    }

    fn output_amount(&self) -> Result<Decimal, ImportError> {
        parse_decimal(&self.tx_id, "output amount", &self.output_amount_raw)
    }
}

fn parse_decimal(tx_id: &str, field: &'static str, value: &str) -> Result<Decimal, ImportError> {
    value.trim().parse().map_err(|_| ImportError::InvalidNumber {
        tx_id: tx_id.to_string(),
        field,
        value: value.to_string(),
    })
}

/// Strip the card-authorization prefix to yield the merchant/description.
fn extract_detail(details: &str) -> String {
    details
        .strip_prefix(DETAIL_PREFIX)
        .unwrap_or(details)
        .to_string()
}

/// One entry of the classification rule table: a predicate over the row and
/// the currency classes, plus an emitter producing the row's events. Rules
/// are tried top to bottom; the first match wins.
struct Rule {
    name: &'static str,
    applies: fn(&ParsedRow, &CurrencyConfig) -> bool,
    emit: fn(&ParsedRow, &CurrencyConfig) -> Result<Vec<Event>, ImportError>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "cashback",
        applies: |row, config| row.tx_type == "Cashback" && row.input_currency == config.reward_token,
        emit: emit_cashback,
    },
    Rule {
        name: "interest",
        applies: |row, config| {
            config.is_interest_type(&row.tx_type)
                && row.input_amount > Decimal::ZERO
                && config.is_crypto(&row.input_currency)
        },
        emit: emit_interest,
    },
    Rule {
        name: "cashback-reversal",
        applies: |row, _| row.tx_type == "Nexo Card Cashback Reversal",
        emit: emit_cashback_reversal,
    },
    Rule {
        name: "exchange",
        applies: |row, _| row.tx_type == "Exchange" || row.tx_type == "Exchange Collateral",
        emit: emit_exchange,
    },
    Rule {
        name: "sell-or-withdraw",
        applies: |row, config| {
            (row.tx_type == "Manual Sell Order" || row.tx_type == "Withdrawal")
                && config.is_crypto(&row.input_currency)
        },
        emit: emit_disposal,
    },
    Rule {
        name: "top-up",
        applies: |row, config| {
            row.tx_type == "Top up Crypto" && config.is_crypto(&row.input_currency)
        },
        emit: emit_top_up,
    },
    Rule {
        name: "card-purchase",
        applies: |row, config| {
            row.tx_type == "Nexo Card Purchase"
                && config.is_usd_like(&row.input_currency)
                && row.output_currency == "EUR"
        },
        emit: emit_card_purchase,
    },
    Rule {
        name: "liquidation",
        applies: |row, config| {
            row.tx_type == "Exchange Liquidation"
                && config.is_eur_like(&row.input_currency)
                && config.is_usd_like(&row.output_currency)
        },
        emit: emit_repayment,
    },
];

fn emit_cashback(row: &ParsedRow, _config: &CurrencyConfig) -> Result<Vec<Event>, ImportError> {
    Ok(vec![Event::Cashback(CashbackEvent {
        tx_id: row.tx_id.clone(),
        date: row.date,
        amount_nexo: row.input_amount,
        value_usd: row.value_usd,
        value_eur: Decimal::ZERO,
        merchant: row.detail.clone(),
    })])
}

fn emit_interest(row: &ParsedRow, _config: &CurrencyConfig) -> Result<Vec<Event>, ImportError> {
    Ok(vec![Event::Interest(InterestEvent {
        tx_id: row.tx_id.clone(),
        date: row.date,
        asset: row.input_currency.clone(),
        amount: row.input_amount,
        value_usd: row.value_usd,
        value_eur: Decimal::ZERO,
        source: row.tx_type.clone(),
    })])
}

fn emit_cashback_reversal(
    row: &ParsedRow,
    _config: &CurrencyConfig,
) -> Result<Vec<Event>, ImportError> {
    Ok(vec![Event::CashbackReversal(CashbackReversalEvent {
        tx_id: row.tx_id.clone(),
        date: row.date,
        value_usd: row.value_usd,
        value_eur: Decimal::ZERO,
    })])
}

/// An exchange row fans out per side: the crypto given up is a disposal, the
/// crypto received is an acquisition. A fiat side emits nothing, so a
/// fiat-to-fiat conversion classifies to zero events.
fn emit_exchange(row: &ParsedRow, config: &CurrencyConfig) -> Result<Vec<Event>, ImportError> {
    let mut events = Vec::new();
    if config.is_crypto(&row.input_currency) {
        events.push(Event::Disposal(DisposalEvent {
            tx_id: row.tx_id.clone(),
            date: row.date,
            asset: row.input_currency.clone(),
            quantity: row.input_amount.abs(),
            proceeds_usd: row.value_usd,
            proceeds_eur: Decimal::ZERO,
            fee_eur: Decimal::ZERO,
            description: row.detail.clone(),
        }));
    }
    if config.is_crypto(&row.output_currency) {
        events.push(Event::ExchangeBuy(ExchangeBuyEvent {
            tx_id: row.tx_id.clone(),
            date: row.date,
            asset: row.output_currency.clone(),
            amount: row.output_amount()?,
            spent_amount: row.input_amount.abs(),
            spent_currency: row.input_currency.clone(),
            value_usd: row.value_usd,
            value_eur: Decimal::ZERO,
        }));
    }
    Ok(events)
}

fn emit_disposal(row: &ParsedRow, _config: &CurrencyConfig) -> Result<Vec<Event>, ImportError> {
    Ok(vec![Event::Disposal(DisposalEvent {
        tx_id: row.tx_id.clone(),
        date: row.date,
        asset: row.input_currency.clone(),
        quantity: row.input_amount.abs(),
        proceeds_usd: row.value_usd,
        proceeds_eur: Decimal::ZERO,
        fee_eur: Decimal::ZERO,
        description: row.detail.clone(),
    })])
}

/// A top-up is self-funded: the spent amount is the deposited amount itself.
fn emit_top_up(row: &ParsedRow, _config: &CurrencyConfig) -> Result<Vec<Event>, ImportError> {
    Ok(vec![Event::ExchangeBuy(ExchangeBuyEvent {
        tx_id: row.tx_id.clone(),
        date: row.date,
        asset: row.input_currency.clone(),
        amount: row.input_amount,
        spent_amount: row.input_amount,
        spent_currency: row.input_currency.clone(),
        value_usd: row.value_usd,
        value_eur: Decimal::ZERO,
    })])
}

/// A card purchase yields the purchase event plus an FX observation: the
/// EUR/USD pair is the only rate source this pipeline has.
fn emit_card_purchase(row: &ParsedRow, _config: &CurrencyConfig) -> Result<Vec<Event>, ImportError> {
    let usd_amount = row.input_amount.abs();
    let eur_amount = row.output_amount()?;
    Ok(vec![
        Event::FxObservation(FxObservation {
            date: row.date,
            eur_amount,
            usd_amount,
        }),
        Event::CardPurchase(CardPurchaseEvent {
            tx_id: row.tx_id.clone(),
            date: row.date,
            eur_amount,
            usd_amount,
            merchant: row.detail.clone(),
        }),
    ])
}

fn emit_repayment(row: &ParsedRow, _config: &CurrencyConfig) -> Result<Vec<Event>, ImportError> {
    Ok(vec![Event::Repayment(RepaymentEvent {
        tx_id: row.tx_id.clone(),
        date: row.date,
        eur_amount: row.input_amount.abs(),
        usd_amount: row.output_amount()?,
    })])
}

/// Maps raw export rows to typed events via the rule table. Unmatched rows
/// classify to an empty event list; the caller counts them.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: CurrencyConfig,
}

impl Classifier {
    pub fn new(config: CurrencyConfig) -> Self {
        Classifier { config }
    }

    pub fn config(&self) -> &CurrencyConfig {
        &self.config
    }

    pub fn classify(&self, record: &RawRecord) -> Result<Vec<Event>, ImportError> {
        let row = ParsedRow::from_record(record)?;
        for rule in RULES {
            if (rule.applies)(&row, &self.config) {
                log::trace!("row {} matched rule '{}'", row.tx_id, rule.name);
                return (rule.emit)(&row, &self.config);
            }
        }
        log::trace!("row {} ({}) matched no rule", row.tx_id, row.tx_type);
        Ok(Vec::new())
    }
}
