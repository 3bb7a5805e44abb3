use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

/// Currency classification sets used by the transaction classifier.
///
/// The Nexo export mixes real fiat (EUR, USD) with the platform's synthetic
/// fiat tokens (EURX, xUSD, USDX); everything outside the fiat set is treated
/// as a crypto asset.
#[derive(Debug, Clone)]
pub struct CurrencyConfig {
    fiat: HashSet<String>,
    usd_like: HashSet<String>,
    eur_like: HashSet<String>,
    interest_types: HashSet<String>,
    /// Asset credited by card cashback rewards.
    pub reward_token: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        let to_set = |codes: &[&str]| codes.iter().map(|c| c.to_string()).collect();
        CurrencyConfig {
            fiat: to_set(&["EUR", "EURX", "USD", "xUSD", "USDX"]),
            usd_like: to_set(&["USD", "xUSD", "USDX"]),
            eur_like: to_set(&["EUR", "EURX"]),
            interest_types: to_set(&["Interest", "Fixed Term Interest", "Exchange Cashback"]),
            reward_token: "NEXO".to_string(),
        }
    }
}

impl CurrencyConfig {
    pub fn is_fiat(&self, currency: &str) -> bool {
        self.fiat.contains(currency)
    }

    pub fn is_crypto(&self, currency: &str) -> bool {
        !self.is_fiat(currency)
    }

    pub fn is_usd_like(&self, currency: &str) -> bool {
        self.usd_like.contains(currency)
    }

    pub fn is_eur_like(&self, currency: &str) -> bool {
        self.eur_like.contains(currency)
    }

    /// Whether a transaction type label counts as interest income.
    pub fn is_interest_type(&self, tx_type: &str) -> bool {
        self.interest_types.contains(tx_type)
    }
}

/// Finnish tax parameters.
#[derive(Debug, Clone, Copy)]
pub struct TaxConfig {
    /// Flat capital income tax rate applied to cashback rewards.
    pub capital_income_rate: Decimal,
}

impl Default for TaxConfig {
    fn default() -> Self {
        TaxConfig {
            capital_income_rate: dec!(0.30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiat_set_membership() {
        let config = CurrencyConfig::default();
        for code in ["EUR", "EURX", "USD", "xUSD", "USDX"] {
            assert!(config.is_fiat(code), "{code} should be fiat");
            assert!(!config.is_crypto(code));
        }
    }

    #[test]
    fn everything_else_is_crypto() {
        let config = CurrencyConfig::default();
        for code in ["BTC", "ETH", "NEXO", "DOT", "XUSD", "eur"] {
            assert!(config.is_crypto(code), "{code} should be crypto");
        }
    }

    #[test]
    fn usd_and_eur_subsets() {
        let config = CurrencyConfig::default();
        assert!(config.is_usd_like("USDX"));
        assert!(config.is_usd_like("xUSD"));
        assert!(!config.is_usd_like("EUR"));
        assert!(config.is_eur_like("EURX"));
        assert!(!config.is_eur_like("USD"));
    }

    #[test]
    fn interest_type_labels() {
        let config = CurrencyConfig::default();
        assert!(config.is_interest_type("Interest"));
        assert!(config.is_interest_type("Fixed Term Interest"));
        assert!(config.is_interest_type("Exchange Cashback"));
        assert!(!config.is_interest_type("Cashback"));
    }

    #[test]
    fn default_tax_rate() {
        assert_eq!(TaxConfig::default().capital_income_rate, dec!(0.30));
    }
}
