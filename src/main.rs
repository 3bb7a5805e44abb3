use clap::Parser;
use std::path::PathBuf;
use taxfi::{
    analyze_card_year, classify::Classifier, config::{CurrencyConfig, TaxConfig}, fx, import,
    report, summarize_year, FxRateTable, LotLedger,
};

/// Finnish capital income and capital gains calculator for Nexo exports.
#[derive(Parser, Debug)]
#[command(name = "taxfi", version)]
struct Cli {
    /// Nexo transaction CSV export(s)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Tax year(s) to report, e.g. --year 2024 2025
    #[arg(short, long, required = true, num_args = 1..)]
    year: Vec<i32>,

    /// Write detailed audit CSV files
    #[arg(long)]
    audit_csv: bool,

    /// Directory for audit CSV files
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Print per-year results as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    Cli::parse().exec()
}

impl Cli {
    fn exec(&self) -> anyhow::Result<()> {
        let classifier = Classifier::new(CurrencyConfig::default());
        let tax = TaxConfig::default();

        let mut events = import::read_csv_files(&self.files, &classifier)?;
        log::info!(
            "classified {} cashback, {} reversals, {} interest, {} buys, {} disposals, {} purchases, {} repayments ({} rows dropped)",
            events.cashback.len(),
            events.cashback_reversals.len(),
            events.interest.len(),
            events.exchange_buys.len(),
            events.disposals.len(),
            events.card_purchases.len(),
            events.repayments.len(),
            events.dropped_rows
        );

        let fx_table = FxRateTable::build(&events.fx_observations);
        log::info!("FX rate table covers {} days", fx_table.len());
        fx::apply_eur_values(&mut events, &fx_table)?;

        let mut ledger = LotLedger::build(
            &events.cashback,
            &events.interest,
            &events.exchange_buys,
            classifier.config(),
        );

        // Years must run ascending so lots carry forward correctly.
        let mut years = self.year.clone();
        years.sort_unstable();
        years.dedup();

        let mut reports = Vec::new();
        for year in years {
            let summary = summarize_year(year, &events, &mut ledger)?;
            let card_analysis = analyze_card_year(
                year,
                &events.card_purchases,
                &events.repayments,
                summary.net_cashback_eur(),
                &tax,
            );

            if self.audit_csv {
                report::write_audit_csv(&self.output_dir, year, &events, &ledger, &summary)?;
                report::write_card_analysis_csv(&self.output_dir, &card_analysis, &events)?;
            }

            if self.json {
                reports.push(report::YearReport {
                    summary,
                    card_analysis,
                });
            } else {
                report::print_summary(&summary);
                report::print_card_analysis(&card_analysis);
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Ok(())
    }
}
