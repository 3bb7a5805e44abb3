//! Console reports and audit CSV output for external consumption.

use crate::events::{CashbackEvent, Events, InterestEvent};
use crate::tax::card::CardAnalysisSummary;
use crate::tax::ledger::{DisposalResult, Lot, LotLedger};
use crate::tax::summary::AnnualSummary;
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Per-year machine-readable report for `--json` output.
#[derive(Debug, Serialize)]
pub struct YearReport {
    pub summary: AnnualSummary,
    pub card_analysis: CardAnalysisSummary,
}

fn format_eur(amount: Decimal) -> String {
    format!("{:.2} EUR", amount)
}

/// Print the per-year console tax summary.
pub fn print_summary(summary: &AnnualSummary) {
    println!();
    println!("FINNISH CRYPTO TAX SUMMARY — {}", summary.year);
    println!();

    println!("CAPITAL INCOME (other capital income in MyTax)");
    println!(
        "  Cashback: {} events, {:.8} NEXO, {}",
        summary.total_cashback_events,
        summary.total_cashback_nexo,
        format_eur(summary.total_cashback_eur)
    );
    if summary.total_cashback_reversal_events > 0 {
        println!(
            "  Reversals: {} events, -{} | Net cashback: {}",
            summary.total_cashback_reversal_events,
            format_eur(summary.total_cashback_reversal_eur),
            format_eur(summary.net_cashback_eur())
        );
    }
    println!("  Interest: {} events", summary.total_interest_events);
    for (asset, quantity) in &summary.total_interest_by_asset {
        println!("    {asset}: {quantity:.8}");
    }
    println!("  Interest value: {}", format_eur(summary.total_interest_eur));
    println!(
        "  TOTAL CAPITAL INCOME: {}",
        format_eur(summary.total_capital_income_eur())
    );
    println!();

    if summary.total_exchange_buy_events > 0 {
        println!("CRYPTO PURCHASES (not taxable, creates acquisition lots)");
        println!("  Events: {}", summary.total_exchange_buy_events);
        for (asset, quantity) in &summary.total_exchange_buy_by_asset {
            println!("    {asset}: {quantity:.8}");
        }
        println!("  Cost: {}", format_eur(summary.total_exchange_buy_eur));
        println!();
    }

    println!("CAPITAL GAINS/LOSSES (capital gains — crypto assets in MyTax)");
    if summary.disposal_results.is_empty() {
        println!("  No disposals during this year.");
    } else {
        let rows: Vec<DisposalRow> = summary.disposal_results.iter().map(DisposalRow::from).collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    println!(
        "  Totals: proceeds {}, cost basis {}, net gain/loss {}",
        format_eur(summary.total_disposal_proceeds_eur),
        format_eur(summary.total_disposal_cost_basis_eur),
        format_eur(summary.total_disposal_gain_eur)
    );
    println!();

    println!("LOT QUEUE STATUS ({} lots remaining)", summary.remaining_lots);
    for (asset, quantity) in &summary.remaining_by_asset {
        println!("  {asset}: {quantity:.8}");
    }
    println!();
}

#[derive(Debug, Clone, Tabled)]
struct DisposalRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Proceeds (EUR)")]
    proceeds: String,
    #[tabled(rename = "Fee (EUR)")]
    fee: String,
    #[tabled(rename = "Cost (EUR)")]
    cost: String,
    #[tabled(rename = "Gain (EUR)")]
    gain: String,
    #[tabled(rename = "Lots")]
    lots: String,
}

impl From<&DisposalResult> for DisposalRow {
    fn from(result: &DisposalResult) -> Self {
        DisposalRow {
            date: result.disposal.date.format("%Y-%m-%d").to_string(),
            asset: result.disposal.asset.clone(),
            quantity: format!("{:.8}", result.disposal.quantity),
            acquired: acquisition_range(result),
            proceeds: format!("{:.2}", result.disposal.proceeds_eur),
            fee: format!("{:.2}", result.disposal.fee_eur),
            cost: format!("{:.2}", result.cost_basis_eur),
            gain: format!("{:.2}", result.gain_eur),
            lots: result.lots_consumed.len().to_string(),
        }
    }
}

/// Acquisition date or date range of the lots a disposal consumed.
fn acquisition_range(result: &DisposalResult) -> String {
    let dates: Vec<_> = result.lots_consumed.iter().map(|c| c.acquired_date.date()).collect();
    match (dates.iter().min(), dates.iter().max()) {
        (Some(first), Some(last)) if first == last => first.format("%Y-%m-%d").to_string(),
        (Some(first), Some(last)) => format!(
            "{} — {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ),
        _ => String::new(),
    }
}

/// Print the card cashback profitability analysis.
pub fn print_card_analysis(analysis: &CardAnalysisSummary) {
    println!();
    println!("CARD CASHBACK PROFITABILITY — {}", analysis.year);
    println!();
    println!(
        "  Purchases:  {} ({:.2} USD charged)",
        format_eur(analysis.total_purchase_eur),
        analysis.total_purchase_usd
    );
    println!(
        "  Repayments: {} ({:.2} USD cleared)",
        format_eur(analysis.total_repayment_eur),
        analysis.total_repayment_usd
    );
    println!("  FX spread cost:  {}", format_eur(analysis.fx_spread_eur));
    println!("  Cashback earned: {}", format_eur(analysis.cashback_eur));
    println!("  Tax on cashback: {}", format_eur(analysis.cashback_tax_eur));
    println!("  Net benefit:     {}", format_eur(analysis.net_benefit_eur));
    println!("  Effective rate:  {:.2}%", analysis.effective_rate_pct);
    println!();
}

#[derive(Debug, Serialize)]
struct AcquisitionCsvRecord {
    tx_id: String,
    date: String,
    amount_nexo: String,
    value_usd: String,
    value_eur: String,
    merchant: String,
}

impl From<&CashbackEvent> for AcquisitionCsvRecord {
    fn from(ev: &CashbackEvent) -> Self {
        AcquisitionCsvRecord {
            tx_id: ev.tx_id.clone(),
            date: ev.date.format(DATE_FORMAT).to_string(),
            amount_nexo: format!("{:.8}", ev.amount_nexo),
            value_usd: format!("{:.2}", ev.value_usd),
            value_eur: format!("{:.2}", ev.value_eur),
            merchant: ev.merchant.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct InterestCsvRecord {
    tx_id: String,
    date: String,
    asset: String,
    amount: String,
    value_usd: String,
    value_eur: String,
    source: String,
}

impl From<&InterestEvent> for InterestCsvRecord {
    fn from(ev: &InterestEvent) -> Self {
        InterestCsvRecord {
            tx_id: ev.tx_id.clone(),
            date: ev.date.format(DATE_FORMAT).to_string(),
            asset: ev.asset.clone(),
            amount: format!("{:.8}", ev.amount),
            value_usd: format!("{:.2}", ev.value_usd),
            value_eur: format!("{:.2}", ev.value_eur),
            source: ev.source.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DisposalCsvRecord {
    tx_id: String,
    date: String,
    asset: String,
    quantity: String,
    proceeds_eur: String,
    fee_eur: String,
    cost_basis_eur: String,
    gain_eur: String,
    lots_consumed: String,
    description: String,
}

impl From<&DisposalResult> for DisposalCsvRecord {
    fn from(result: &DisposalResult) -> Self {
        let lots_detail = result
            .lots_consumed
            .iter()
            .map(|c| format!("{}:{:.8}@{:.2}", c.tx_id, c.quantity, c.cost_eur))
            .collect::<Vec<_>>()
            .join("; ");
        DisposalCsvRecord {
            tx_id: result.disposal.tx_id.clone(),
            date: result.disposal.date.format(DATE_FORMAT).to_string(),
            asset: result.disposal.asset.clone(),
            quantity: format!("{:.8}", result.disposal.quantity),
            proceeds_eur: format!("{:.2}", result.disposal.proceeds_eur),
            fee_eur: format!("{:.2}", result.disposal.fee_eur),
            cost_basis_eur: format!("{:.2}", result.cost_basis_eur),
            gain_eur: format!("{:.2}", result.gain_eur),
            lots_consumed: lots_detail,
            description: result.disposal.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RemainingLotCsvRecord {
    tx_id: String,
    asset: String,
    acquired_date: String,
    source: String,
    original_qty: String,
    remaining_qty: String,
    cost_eur: String,
}

impl From<&Lot> for RemainingLotCsvRecord {
    fn from(lot: &Lot) -> Self {
        RemainingLotCsvRecord {
            tx_id: lot.tx_id.clone(),
            asset: lot.asset.clone(),
            acquired_date: lot.acquired_date.format(DATE_FORMAT).to_string(),
            source: lot.source.to_string(),
            original_qty: format!("{:.8}", lot.quantity),
            remaining_qty: format!("{:.8}", lot.remaining),
            cost_eur: format!("{:.2}", lot.remaining_cost_eur()),
        }
    }
}

fn audit_writer(path: &Path) -> anyhow::Result<csv::Writer<File>> {
    let writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_path(path)?;
    Ok(writer)
}

/// Write the per-year audit CSV files: acquisitions, interest, disposals
/// (with consumed-lot detail) and the remaining lot inventory.
pub fn write_audit_csv(
    output_dir: &Path,
    year: i32,
    events: &Events,
    ledger: &LotLedger,
    summary: &AnnualSummary,
) -> anyhow::Result<()> {
    fs::create_dir_all(output_dir)?;

    let acq_path = output_dir.join(format!("acquisitions_{year}.csv"));
    let mut wtr = audit_writer(&acq_path)?;
    for ev in events.cashback.iter().filter(|ev| ev.date.year() == year) {
        wtr.serialize(AcquisitionCsvRecord::from(ev))?;
    }
    wtr.flush()?;
    log::info!("wrote {}", acq_path.display());

    let interest_path = output_dir.join(format!("interest_{year}.csv"));
    let mut wtr = audit_writer(&interest_path)?;
    for ev in events.interest.iter().filter(|ev| ev.date.year() == year) {
        wtr.serialize(InterestCsvRecord::from(ev))?;
    }
    wtr.flush()?;
    log::info!("wrote {}", interest_path.display());

    let disposals_path = output_dir.join(format!("disposals_{year}.csv"));
    let mut wtr = audit_writer(&disposals_path)?;
    for result in &summary.disposal_results {
        wtr.serialize(DisposalCsvRecord::from(result))?;
    }
    wtr.flush()?;
    log::info!("wrote {}", disposals_path.display());

    let lots_path = output_dir.join(format!("remaining_lots_{year}.csv"));
    let mut wtr = audit_writer(&lots_path)?;
    let mut lots: Vec<&Lot> = ledger.remaining_lots().collect();
    lots.sort_by(|a, b| (&a.asset, a.acquired_date).cmp(&(&b.asset, b.acquired_date)));
    for lot in lots {
        wtr.serialize(RemainingLotCsvRecord::from(lot))?;
    }
    wtr.flush()?;
    log::info!("wrote {}", lots_path.display());

    Ok(())
}

/// Write the card analysis audit CSV: per-transaction purchase/repayment
/// detail followed by a metric/value summary block.
pub fn write_card_analysis_csv(
    output_dir: &Path,
    analysis: &CardAnalysisSummary,
    events: &Events,
) -> anyhow::Result<()> {
    fs::create_dir_all(output_dir)?;
    let year = analysis.year;

    let path = output_dir.join(format!("card_analysis_{year}.csv"));
    let mut wtr = audit_writer(&path)?;
    wtr.write_record(["section", "tx_id", "date", "eur_amount", "usd_amount", "merchant"])?;

    for ev in events.card_purchases.iter().filter(|ev| ev.date.year() == year) {
        wtr.write_record([
            "purchase".to_string(),
            ev.tx_id.clone(),
            ev.date.format(DATE_FORMAT).to_string(),
            format!("{:.2}", ev.eur_amount),
            format!("{:.2}", ev.usd_amount),
            ev.merchant.clone(),
        ])?;
    }
    for ev in events.repayments.iter().filter(|ev| ev.date.year() == year) {
        wtr.write_record([
            "repayment".to_string(),
            ev.tx_id.clone(),
            ev.date.format(DATE_FORMAT).to_string(),
            format!("{:.2}", ev.eur_amount),
            format!("{:.2}", ev.usd_amount),
            String::new(),
        ])?;
    }

    wtr.write_record(["metric", "value", "", "", "", ""])?;
    let metrics: [(&str, Decimal); 9] = [
        ("total_purchase_eur", analysis.total_purchase_eur),
        ("total_purchase_usd", analysis.total_purchase_usd),
        ("total_repayment_eur", analysis.total_repayment_eur),
        ("total_repayment_usd", analysis.total_repayment_usd),
        ("fx_spread_eur", analysis.fx_spread_eur),
        ("cashback_eur", analysis.cashback_eur),
        ("cashback_tax_eur", analysis.cashback_tax_eur),
        ("net_benefit_eur", analysis.net_benefit_eur),
        ("effective_rate_pct", analysis.effective_rate_pct),
    ];
    for (metric, value) in metrics {
        wtr.write_record([
            metric.to_string(),
            format!("{value:.2}"),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ])?;
    }
    wtr.flush()?;
    log::info!("wrote {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DisposalEvent;
    use crate::tax::ledger::LotConsumption;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn result_with_lots(dates: &[&str]) -> DisposalResult {
        DisposalResult {
            disposal: DisposalEvent {
                tx_id: "sell1".to_string(),
                date: dt("2024-06-01 10:00:00"),
                asset: "NEXO".to_string(),
                quantity: dec!(4),
                proceeds_usd: dec!(7),
                proceeds_eur: dec!(6),
                fee_eur: Decimal::ZERO,
                description: "swap".to_string(),
            },
            cost_basis_eur: dec!(3.2),
            gain_eur: dec!(2.8),
            lots_consumed: dates
                .iter()
                .enumerate()
                .map(|(i, date)| LotConsumption {
                    tx_id: format!("lot{i}"),
                    quantity: dec!(2),
                    cost_eur: dec!(1.6),
                    acquired_date: dt(date),
                })
                .collect(),
        }
    }

    #[test]
    fn acquisition_range_collapses_single_date() {
        let result = result_with_lots(&["2024-01-05 00:00:00", "2024-01-05 12:00:00"]);
        assert_eq!(acquisition_range(&result), "2024-01-05");
    }

    #[test]
    fn acquisition_range_spans_dates() {
        let result = result_with_lots(&["2024-01-05 00:00:00", "2024-03-20 00:00:00"]);
        assert_eq!(acquisition_range(&result), "2024-01-05 — 2024-03-20");
    }

    #[test]
    fn disposal_csv_record_includes_lot_detail() {
        let record = DisposalCsvRecord::from(&result_with_lots(&[
            "2024-01-05 00:00:00",
            "2024-03-20 00:00:00",
        ]));
        assert_eq!(record.lots_consumed, "lot0:2.00000000@1.60; lot1:2.00000000@1.60");
        assert_eq!(record.quantity, "4.00000000");
        assert_eq!(record.gain_eur, "2.80");
    }
}
