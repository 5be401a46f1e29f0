// Finance data models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Ledger transaction type. Each type fixes what its amount/fees/net mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    AdditionalChargePayment,
    Refund,
    Tip,
    Tax,
    TravelFee,
    ServiceFee,
    ProviderEarnings,
    ProviderSubscriptionPayment,
    ProviderAdsPayment,
    GiftCardSale,
    MembershipSale,
}

impl TransactionType {
    pub const ALL: [TransactionType; 12] = [
        TransactionType::Payment,
        TransactionType::AdditionalChargePayment,
        TransactionType::Refund,
        TransactionType::Tip,
        TransactionType::Tax,
        TransactionType::TravelFee,
        TransactionType::ServiceFee,
        TransactionType::ProviderEarnings,
        TransactionType::ProviderSubscriptionPayment,
        TransactionType::ProviderAdsPayment,
        TransactionType::GiftCardSale,
        TransactionType::MembershipSale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::AdditionalChargePayment => "additional_charge_payment",
            TransactionType::Refund => "refund",
            TransactionType::Tip => "tip",
            TransactionType::Tax => "tax",
            TransactionType::TravelFee => "travel_fee",
            TransactionType::ServiceFee => "service_fee",
            TransactionType::ProviderEarnings => "provider_earnings",
            TransactionType::ProviderSubscriptionPayment => "provider_subscription_payment",
            TransactionType::ProviderAdsPayment => "provider_ads_payment",
            TransactionType::GiftCardSale => "gift_card_sale",
            TransactionType::MembershipSale => "membership_sale",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown transaction type '{}'", s))
    }
}

/// Numeric column of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerField {
    Amount,
    Fees,
    Commission,
    Net,
}

/// Ledger row as stored; null numerics count as zero
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct LedgerRow {
    pub transaction_type: String,
    pub amount: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub net: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Per-type totals included in the summary
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TypeBreakdown {
    pub transaction_type: TransactionType,
    pub count: usize,
    pub amount: Decimal,
    pub fees: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
}

/// Requested and comparison periods echoed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PeriodEcho {
    /// None for an all-time summary
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub previous_start_date: DateTime<Utc>,
    pub previous_end_date: DateTime<Utc>,
}

/// Revenue summary for one period
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FinanceSummary {
    pub service_collected_gross: Decimal,
    pub service_gateway_fees: Decimal,
    pub platform_commission_gross: Decimal,
    pub platform_refund_impact: Decimal,
    pub platform_commission_net: Decimal,
    pub platform_take_net: Decimal,

    pub refunds_total: Decimal,
    pub tips_total: Decimal,
    pub tax_total: Decimal,
    pub travel_fees_total: Decimal,
    pub service_fees_total: Decimal,
    pub provider_earnings_total: Decimal,

    pub subscription_gross: Decimal,
    pub subscription_fees: Decimal,
    pub subscription_net: Decimal,
    pub ads_gross: Decimal,
    pub ads_fees: Decimal,
    pub ads_net: Decimal,

    pub gift_card_sales: Decimal,
    pub membership_sales: Decimal,

    pub wallet_topup_revenue: Decimal,
    pub referral_payouts: Decimal,
    pub total_platform_take_after_referrals: Decimal,

    pub previous_period_service_gross: Decimal,
    /// Percent change of gross services collected, 2 dp
    pub gmv_growth: Decimal,

    pub transaction_count: usize,
    pub breakdown: Vec<TypeBreakdown>,
    pub period: PeriodEcho,
}
