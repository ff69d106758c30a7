use super::columns;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three affordability indices carried by the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    PriceToIncome,
    MortgageAffordability,
    RentAffordability,
}

impl Metric {
    pub const ALL: [Metric; 3] = [
        Metric::PriceToIncome,
        Metric::MortgageAffordability,
        Metric::RentAffordability,
    ];

    /// Value of the `index` column that selects this metric.
    pub fn label(self) -> &'static str {
        match self {
            Metric::PriceToIncome => "Price To Income",
            Metric::MortgageAffordability => "Mortgage Affordability",
            Metric::RentAffordability => "Rent Affordability",
        }
    }

    /// Column holding the metric in the joined table.
    pub fn column(self) -> &'static str {
        match self {
            Metric::PriceToIncome => columns::PRICE_TO_INCOME,
            Metric::MortgageAffordability => columns::MORT_AFFORD,
            Metric::RentAffordability => columns::RENT_AFFORD,
        }
    }

    pub fn hist_column(self) -> &'static str {
        match self {
            Metric::PriceToIncome => columns::PRICE_TO_INCOME_HIST,
            Metric::MortgageAffordability => columns::MORT_AFFORD_HIST,
            Metric::RentAffordability => columns::RENT_AFFORD_HIST,
        }
    }

    /// Column produced by yearly aggregation.
    pub fn avg_column(self) -> &'static str {
        match self {
            Metric::PriceToIncome => "avg_price_to_income",
            Metric::MortgageAffordability => "avg_mort_afford",
            Metric::RentAffordability => "avg_rent_afford",
        }
    }

    pub fn from_label(label: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.label() == label)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_label(metric.label()), Some(metric));
        }
        assert_eq!(Metric::from_label("Price to income"), None);
    }
}
