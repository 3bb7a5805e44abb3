pub mod classify;
pub mod config;
pub mod events;
pub mod fx;
pub mod import;
pub mod report;
pub mod tax;

pub use classify::{Classifier, ImportError};
pub use config::{CurrencyConfig, TaxConfig};
pub use events::Events;
pub use fx::{FxError, FxRateTable};
pub use tax::card::{analyze_card_year, CardAnalysisSummary};
pub use tax::ledger::{DisposalResult, LedgerError, Lot, LotLedger};
pub use tax::summary::{summarize_year, AnnualSummary};
