//! Pure trade arithmetic: fees, max tradable quantities, and the
//! hold-time rules that keep rapid buy/sell cycling from inflating the
//! feature-unlock volume counter.

use crate::types::TradeQuote;

/// Fractional lot precision, exchange-style.
pub const LOT_DECIMALS: u32 = 6;

const LOT_SCALE: f64 = 1_000_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Minimum hold time before a position's volume counts at all.
pub const VOLUME_ELIGIBILITY_HOURS: f64 = 1.0;
/// Hold time at which volume counts with full weight.
pub const VOLUME_FULL_WEIGHT_HOURS: f64 = 24.0;

/// Round a quantity down to lot precision. Flooring keeps derived
/// spends within the budget they were computed from.
pub fn round_lot(quantity: f64) -> f64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0.0;
    }
    (quantity * LOT_SCALE).floor() / LOT_SCALE
}

/// Largest quantity affordable with `balance` at `price`, fees included:
/// `max_buyable * price * (1 + fee_rate) <= balance` holds by construction.
pub fn max_buyable(balance: f64, price: f64, fee_rate: f64) -> f64 {
    if !balance.is_finite() || balance <= 0.0 || !price.is_finite() || price <= 0.0 {
        return 0.0;
    }
    round_lot((balance / price) / (1.0 + fee_rate))
}

/// Largest quantity sellable is simply the current holding.
pub fn max_sellable(holding_quantity: f64) -> f64 {
    if !holding_quantity.is_finite() || holding_quantity <= 0.0 {
        return 0.0;
    }
    holding_quantity
}

/// Cost breakdown for trading `quantity` at `price`. Non-numeric or
/// non-positive inputs quote as all zeros.
pub fn quote_trade(quantity: f64, price: f64, fee_rate: f64) -> TradeQuote {
    if !quantity.is_finite() || quantity <= 0.0 || !price.is_finite() || price <= 0.0 {
        return TradeQuote::zero();
    }
    let subtotal = quantity * price;
    let fee = subtotal * fee_rate.max(0.0);
    TradeQuote {
        subtotal,
        fee,
        total_cost: subtotal + fee,
        payout: subtotal - fee,
    }
}

/// Anti wash-trading rule: a position's volume only counts once it has
/// been held for at least one hour.
pub fn is_volume_eligible(opened_at_ms: i64, now_ms: i64) -> bool {
    hours_held(opened_at_ms, now_ms) >= VOLUME_ELIGIBILITY_HOURS
}

/// Volume weight in [0, 1]: zero before the 1-hour floor, then linear up
/// to full credit at 24 hours.
pub fn eligible_volume_weight(opened_at_ms: i64, now_ms: i64) -> f64 {
    let hours = hours_held(opened_at_ms, now_ms);
    if hours < VOLUME_ELIGIBILITY_HOURS {
        return 0.0;
    }
    (hours / VOLUME_FULL_WEIGHT_HOURS).min(1.0)
}

fn hours_held(opened_at_ms: i64, now_ms: i64) -> f64 {
    ((now_ms - opened_at_ms).max(0)) as f64 / MS_PER_HOUR
}
