use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{PromotionCard, StayHours, VehicleCategory};

/// Hourly rates for one category, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub daily: u64,
    pub nightly: u64,
}

/// Rates per vehicle category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffTable {
    rates: BTreeMap<VehicleCategory, Rate>,
}

impl TariffTable {
    pub fn new(rates: BTreeMap<VehicleCategory, Rate>) -> Self {
        Self { rates }
    }

    /// A: 3/2, B: 6/4, C: 12/8 per daytime/nighttime hour.
    pub fn standard() -> Self {
        let mut rates = BTreeMap::new();
        rates.insert(
            VehicleCategory::A,
            Rate {
                daily: 300,
                nightly: 200,
            },
        );
        rates.insert(
            VehicleCategory::B,
            Rate {
                daily: 600,
                nightly: 400,
            },
        );
        rates.insert(
            VehicleCategory::C,
            Rate {
                daily: 1200,
                nightly: 800,
            },
        );
        Self { rates }
    }

    pub fn rate(&self, category: VehicleCategory) -> Option<Rate> {
        self.rates.get(&category).copied()
    }

    /// Prices a stay. Categories missing from the table price at zero.
    pub fn quote(
        &self,
        category: VehicleCategory,
        card: Option<PromotionCard>,
        hours: StayHours,
    ) -> PaymentQuote {
        let rate = self.rate(category).unwrap_or(Rate {
            daily: 0,
            nightly: 0,
        });
        let gross = u64::from(hours.daily) * rate.daily + u64::from(hours.nightly) * rate.nightly;
        let discount_percent = card.map(PromotionCard::discount_percent).unwrap_or(0);
        // Half-cent discounts round up in the customer's favour.
        let discount = (gross * u64::from(discount_percent) + 50) / 100;

        PaymentQuote {
            hours,
            category,
            promotion_card: card,
            gross_cents: gross,
            discount_percent,
            amount_cents: gross - discount,
        }
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// What a vehicle owes for its stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentQuote {
    pub hours: StayHours,
    pub category: VehicleCategory,
    pub promotion_card: Option<PromotionCard>,
    pub gross_cents: u64,
    pub discount_percent: u32,
    pub amount_cents: u64,
}

impl PaymentQuote {
    /// Amount as a decimal string, e.g. `"12.75"`.
    pub fn amount_display(&self) -> String {
        format!("{}.{:02}", self.amount_cents / 100, self.amount_cents % 100)
    }
}
