pub mod card;
pub mod ledger;
pub mod summary;

pub use card::{analyze_card_year, CardAnalysisSummary};
pub use ledger::{DisposalResult, LedgerError, Lot, LotLedger, LotSource};
pub use summary::{summarize_year, AnnualSummary};
