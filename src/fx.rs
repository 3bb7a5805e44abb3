//! Daily USD/EUR rate table inferred from card purchase observations.

use crate::events::{Events, FxObservation};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FxError {
    #[error("no FX observations available")]
    NoObservations,
}

/// USD/EUR rate lookup with nearest-date fallback.
///
/// Rates are per UTC calendar day. A day with several observations gets the
/// volume-weighted average (total EUR / total USD), not a mean of the
/// individual rates.
#[derive(Debug, Clone)]
pub struct FxRateTable {
    rates: BTreeMap<NaiveDate, Decimal>,
}

impl FxRateTable {
    pub fn build(observations: &[FxObservation]) -> Self {
        let mut daily_totals: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
        for obs in observations {
            let entry = daily_totals
                .entry(obs.date.date())
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            entry.0 += obs.eur_amount;
            entry.1 += obs.usd_amount;
        }

        let mut rates = BTreeMap::new();
        for (day, (eur, usd)) in daily_totals {
            // a zero-USD day cannot produce a rate
            if usd.is_zero() {
                log::debug!("skipping FX day {day}: zero USD volume");
                continue;
            }
            rates.insert(day, eur / usd);
        }
        FxRateTable { rates }
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Rate for the given instant: exact calendar-day match if present,
    /// otherwise the nearest known day (ties go to the earlier day; queries
    /// outside the observed range clamp to the boundary day).
    pub fn rate_for(&self, dt: NaiveDateTime) -> Result<Decimal, FxError> {
        let day = dt.date();
        if let Some(rate) = self.rates.get(&day) {
            return Ok(*rate);
        }
        self.nearest_rate(day)
    }

    fn nearest_rate(&self, day: NaiveDate) -> Result<Decimal, FxError> {
        let before = self.rates.range(..=day).next_back();
        let after = self.rates.range(day..).next();
        match (before, after) {
            (None, None) => Err(FxError::NoObservations),
            (Some((_, rate)), None) | (None, Some((_, rate))) => Ok(*rate),
            (Some((before_day, before_rate)), Some((after_day, after_rate))) => {
                if day - *before_day <= *after_day - day {
                    Ok(*before_rate)
                } else {
                    Ok(*after_rate)
                }
            }
        }
    }

    pub fn convert(&self, usd_amount: Decimal, dt: NaiveDateTime) -> Result<Decimal, FxError> {
        Ok(usd_amount * self.rate_for(dt)?)
    }
}

/// Attach EUR values to every USD-carrying event. Must run exactly once,
/// after import and before any accounting.
pub fn apply_eur_values(events: &mut Events, table: &FxRateTable) -> Result<(), FxError> {
    for ev in &mut events.cashback {
        ev.value_eur = table.convert(ev.value_usd, ev.date)?;
    }
    for ev in &mut events.cashback_reversals {
        ev.value_eur = table.convert(ev.value_usd, ev.date)?;
    }
    for ev in &mut events.interest {
        ev.value_eur = table.convert(ev.value_usd, ev.date)?;
    }
    for ev in &mut events.exchange_buys {
        ev.value_eur = table.convert(ev.value_usd, ev.date)?;
    }
    for ev in &mut events.disposals {
        ev.proceeds_eur = table.convert(ev.proceeds_usd, ev.date)?;
    }
    Ok(())
}
