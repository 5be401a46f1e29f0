// Summary figures composed from the ledger reducer
//
// Ledger conventions the formulas depend on:
// - `payment.amount` is the commission base, while
//   `additional_charge_payment.amount` is stored net of the gateway fee, so
//   its fees are added back for gross collected.
// - refund rows carry a negative `net`.
// - gateway fees are not returned on refund.

use rust_decimal::Decimal;

use crate::finance::{
    ledger::Ledger,
    models::{FinanceSummary, LedgerField, PeriodEcho, TransactionType},
};

use TransactionType::*;

const SERVICE_PAYMENTS: &[TransactionType] = &[Payment, AdditionalChargePayment];

/// Types whose amount counts in full toward gross services collected
const SERVICE_GROSS_AMOUNTS: &[TransactionType] =
    &[Payment, ProviderEarnings, Tip, Tax, TravelFee, ServiceFee];

/// Gross services collected (GMV) for a ledger
pub fn service_collected_gross(ledger: &Ledger) -> Decimal {
    ledger.sum(SERVICE_GROSS_AMOUNTS, LedgerField::Amount)
        + ledger.sum(&[AdditionalChargePayment], LedgerField::Amount)
        + ledger.sum(&[AdditionalChargePayment], LedgerField::Fees)
}

/// Percent change from `previous` to `current`, 2 dp; zero when `previous` is zero
pub fn growth_percent(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Everything a summary is built from
#[derive(Debug, Clone)]
pub struct SummaryInputs<'a> {
    pub ledger: &'a Ledger,
    pub wallet_topup_revenue: Decimal,
    pub referral_payouts: Decimal,
    /// Gross services collected in the growth comparison's current period
    pub growth_current_gross: Decimal,
    pub previous_period_service_gross: Decimal,
    pub period: PeriodEcho,
}

pub fn summarize(inputs: SummaryInputs<'_>) -> FinanceSummary {
    let ledger = inputs.ledger;
    let amount = |t: TransactionType| ledger.sum(&[t], LedgerField::Amount);
    let fees = |t: TransactionType| ledger.sum(&[t], LedgerField::Fees);
    let net = |t: TransactionType| ledger.sum(&[t], LedgerField::Net);

    let service_gateway_fees = ledger.sum(SERVICE_PAYMENTS, LedgerField::Fees);
    let platform_commission_gross = ledger.sum(SERVICE_PAYMENTS, LedgerField::Net);
    let platform_refund_impact = net(Refund);
    let platform_commission_net = platform_commission_gross + platform_refund_impact;
    let platform_take_net = platform_commission_net - service_gateway_fees;

    let subscription_net = net(ProviderSubscriptionPayment);
    let ads_net = net(ProviderAdsPayment);

    let total_platform_take_after_referrals = platform_take_net
        + subscription_net
        + ads_net
        + inputs.wallet_topup_revenue
        - inputs.referral_payouts;

    FinanceSummary {
        service_collected_gross: service_collected_gross(ledger),
        service_gateway_fees,
        platform_commission_gross,
        platform_refund_impact,
        platform_commission_net,
        platform_take_net,

        refunds_total: amount(Refund),
        tips_total: amount(Tip),
        tax_total: amount(Tax),
        travel_fees_total: amount(TravelFee),
        service_fees_total: amount(ServiceFee),
        provider_earnings_total: amount(ProviderEarnings),

        subscription_gross: amount(ProviderSubscriptionPayment),
        subscription_fees: fees(ProviderSubscriptionPayment),
        subscription_net,
        ads_gross: amount(ProviderAdsPayment),
        ads_fees: fees(ProviderAdsPayment),
        ads_net,

        gift_card_sales: amount(GiftCardSale),
        membership_sales: amount(MembershipSale),

        wallet_topup_revenue: inputs.wallet_topup_revenue,
        referral_payouts: inputs.referral_payouts,
        total_platform_take_after_referrals,

        previous_period_service_gross: inputs.previous_period_service_gross,
        gmv_growth: growth_percent(
            inputs.growth_current_gross,
            inputs.previous_period_service_gross,
        ),

        transaction_count: ledger.len(),
        breakdown: ledger.breakdown(),
        period: inputs.period,
    }
}
