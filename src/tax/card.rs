//! Card cashback profitability: FX spread cost vs net cashback benefit.

use crate::config::TaxConfig;
use crate::events::{CardPurchaseEvent, RepaymentEvent};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;

/// Profitability analysis of card cashback against FX spread costs.
#[derive(Debug, Clone, Serialize)]
pub struct CardAnalysisSummary {
    pub year: i32,
    pub total_purchase_eur: Decimal,
    pub total_purchase_usd: Decimal,
    pub total_repayment_eur: Decimal,
    pub total_repayment_usd: Decimal,
    /// Extra EUR paid because purchases are charged in USD and repaid in EUR.
    pub fx_spread_eur: Decimal,
    /// Net cashback value (cashback minus reversals).
    pub cashback_eur: Decimal,
    pub cashback_tax_eur: Decimal,
    /// cashback − tax − FX spread.
    pub net_benefit_eur: Decimal,
    /// Net benefit as a percentage of EUR spent.
    pub effective_rate_pct: Decimal,
}

/// Analyze one year of card purchases and credit-line repayments.
///
/// The FX spread compares what the repayments actually cost in EUR with
/// what the purchases were worth at the purchase-side rate. Purchases not
/// yet repaid within the year (or over-repaid) would distort that
/// comparison, so the USD mismatch is valued at the purchase rate and
/// netted out first.
pub fn analyze_card_year(
    year: i32,
    card_purchases: &[CardPurchaseEvent],
    repayments: &[RepaymentEvent],
    net_cashback_eur: Decimal,
    tax: &TaxConfig,
) -> CardAnalysisSummary {
    let year_purchases: Vec<_> = card_purchases
        .iter()
        .filter(|ev| ev.date.year() == year)
        .collect();
    let year_repayments: Vec<_> = repayments.iter().filter(|ev| ev.date.year() == year).collect();

    let total_purchase_eur: Decimal = year_purchases.iter().map(|ev| ev.eur_amount).sum();
    let total_purchase_usd: Decimal = year_purchases.iter().map(|ev| ev.usd_amount).sum();
    let total_repayment_eur: Decimal = year_repayments.iter().map(|ev| ev.eur_amount).sum();
    let total_repayment_usd: Decimal = year_repayments.iter().map(|ev| ev.usd_amount).sum();

    let fx_spread_eur = if total_purchase_usd > Decimal::ZERO {
        let purchase_rate = total_purchase_eur / total_purchase_usd;
        let usd_mismatch = total_purchase_usd - total_repayment_usd;
        let mismatch_eur = usd_mismatch * purchase_rate;
        total_repayment_eur - (total_purchase_eur - mismatch_eur)
    } else {
        Decimal::ZERO
    };

    let cashback_tax_eur = net_cashback_eur * tax.capital_income_rate;
    let net_benefit_eur = net_cashback_eur - cashback_tax_eur - fx_spread_eur;

    let effective_rate_pct = if total_purchase_eur > Decimal::ZERO {
        net_benefit_eur / total_purchase_eur * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    CardAnalysisSummary {
        year,
        total_purchase_eur,
        total_purchase_usd,
        total_repayment_eur,
        total_repayment_usd,
        fx_spread_eur,
        cashback_eur: net_cashback_eur,
        cashback_tax_eur,
        net_benefit_eur,
        effective_rate_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn purchase(date: &str, eur: Decimal, usd: Decimal) -> CardPurchaseEvent {
        CardPurchaseEvent {
            tx_id: "p".to_string(),
            date: dt(date),
            eur_amount: eur,
            usd_amount: usd,
            merchant: "shop".to_string(),
        }
    }

    fn repayment(date: &str, eur: Decimal, usd: Decimal) -> RepaymentEvent {
        RepaymentEvent {
            tx_id: "r".to_string(),
            date: dt(date),
            eur_amount: eur,
            usd_amount: usd,
        }
    }

    #[test]
    fn fx_spread_with_usd_mismatch() {
        // 1000 EUR / 1100 USD purchased, 990 EUR / 1050 USD repaid, 20 EUR net cashback
        let purchases = [purchase("2024-03-01 12:00:00", dec!(1000), dec!(1100))];
        let repayments = [repayment("2024-03-15 12:00:00", dec!(990), dec!(1050))];
        let analysis =
            analyze_card_year(2024, &purchases, &repayments, dec!(20), &TaxConfig::default());

        // purchase rate 1000/1100; mismatch 50 USD -> 45.4545... EUR
        // spread = 990 - (1000 - 45.4545...) = 35.4545...
        let expected_spread = dec!(990) - (dec!(1000) - dec!(50) * (dec!(1000) / dec!(1100)));
        assert_eq!(analysis.fx_spread_eur, expected_spread);
        assert_eq!(analysis.cashback_tax_eur, dec!(6.00));
        assert_eq!(
            analysis.net_benefit_eur,
            dec!(20) - dec!(6.00) - expected_spread
        );
        assert!(analysis.net_benefit_eur < Decimal::ZERO);
    }

    #[test]
    fn balanced_usd_has_pure_rate_spread() {
        let purchases = [purchase("2024-03-01 12:00:00", dec!(500), dec!(540))];
        let repayments = [repayment("2024-03-20 12:00:00", dec!(510), dec!(540))];
        let analysis =
            analyze_card_year(2024, &purchases, &repayments, dec!(0), &TaxConfig::default());
        assert_eq!(analysis.fx_spread_eur, dec!(10));
        assert_eq!(analysis.net_benefit_eur, dec!(-10));
    }

    #[test]
    fn no_purchases_means_no_spread_and_zero_rate() {
        let analysis = analyze_card_year(2024, &[], &[], dec!(12), &TaxConfig::default());
        assert_eq!(analysis.fx_spread_eur, Decimal::ZERO);
        assert_eq!(analysis.cashback_tax_eur, dec!(3.60));
        assert_eq!(analysis.net_benefit_eur, dec!(8.40));
        assert_eq!(analysis.effective_rate_pct, Decimal::ZERO);
    }

    #[test]
    fn effective_rate_relates_benefit_to_spend() {
        // spread = 0 (same EUR both sides, same USD), cashback 20, tax 6 -> benefit 14
        let purchases = [purchase("2024-03-01 12:00:00", dec!(1000), dec!(1080))];
        let repayments = [repayment("2024-03-20 12:00:00", dec!(1000), dec!(1080))];
        let analysis =
            analyze_card_year(2024, &purchases, &repayments, dec!(20), &TaxConfig::default());
        assert_eq!(analysis.fx_spread_eur, Decimal::ZERO);
        assert_eq!(analysis.effective_rate_pct, dec!(1.40));
    }

    #[test]
    fn only_the_requested_year_counts() {
        let purchases = [
            purchase("2024-03-01 12:00:00", dec!(100), dec!(108)),
            purchase("2025-03-01 12:00:00", dec!(900), dec!(1000)),
        ];
        let analysis = analyze_card_year(2024, &purchases, &[], dec!(0), &TaxConfig::default());
        assert_eq!(analysis.total_purchase_eur, dec!(100));
        assert_eq!(analysis.total_purchase_usd, dec!(108));
    }
}
