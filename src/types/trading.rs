use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An open leveraged holding of one instrument by one player.
///
/// `quantity` is the leveraged notional (already scaled by leverage at
/// entry). The original cash stake is stored explicitly in `stake_cash`
/// so liquidation loss never has to be back-computed from
/// `quantity * entry_price / leverage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    /// Telegram account id of the holder.
    pub user_id: i64,
    /// Instrument identifier (CoinGecko id, e.g. "bitcoin").
    pub coin_id: String,
    /// Leveraged notional quantity held.
    pub quantity: f64,
    /// Volume-weighted average acquisition price.
    pub entry_price: f64,
    /// Leverage fixed at position-open time.
    pub leverage: u32,
    /// Cash the player actually put in across all buys.
    pub stake_cash: f64,
    /// Epoch millis of the first buy; gates volume eligibility.
    pub opened_at: i64,
}

impl Position {
    /// Open a fresh position.
    pub fn open(
        user_id: i64,
        coin_id: String,
        quantity: f64,
        entry_price: f64,
        leverage: u32,
        stake_cash: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            coin_id,
            quantity,
            entry_price,
            leverage,
            stake_cash,
            opened_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Fractional price drop from entry that erases the full stake.
    /// A 10x position liquidates at a 10% adverse move, a 2x at 50%.
    pub fn liquidation_threshold(&self) -> f64 {
        1.0 / self.leverage.max(1) as f64
    }

    /// Margin-call rule: liquidate exactly when the price decline from
    /// entry reaches or exceeds `1/leverage`.
    pub fn is_breached(&self, current_price: f64) -> bool {
        if self.entry_price <= 0.0 {
            return false;
        }
        let drop = (self.entry_price - current_price) / self.entry_price;
        drop >= self.liquidation_threshold()
    }

    /// Current notional value at the given price.
    pub fn notional_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    /// Unrealized P&L percent against the average entry price.
    pub fn unrealized_pnl_pct(&self, current_price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        (current_price - self.entry_price) / self.entry_price * 100.0
    }
}

/// Cost breakdown for a prospective trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeQuote {
    /// Quantity * price before fees.
    pub subtotal: f64,
    /// Fee charged on the subtotal.
    pub fee: f64,
    /// Buy side: subtotal + fee.
    pub total_cost: f64,
    /// Sell side: subtotal - fee.
    pub payout: f64,
}

impl TradeQuote {
    pub fn zero() -> Self {
        Self {
            subtotal: 0.0,
            fee: 0.0,
            total_cost: 0.0,
            payout: 0.0,
        }
    }
}

/// Result of a (partial) sell.
#[derive(Debug, Clone)]
pub struct SellOutcome {
    /// Cash credited to the player.
    pub payout: f64,
    /// Fee routed to the global fee pool.
    pub fee: f64,
    /// Realized P&L recorded against season statistics.
    pub realized_pnl: f64,
    /// Notional that counted toward the feature-unlock volume.
    pub volume_credit: f64,
    /// Remaining position, if any quantity is left.
    pub remaining: Option<Position>,
}

/// Ledger entry kinds for the transaction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    BuyCrypto,
    SellCrypto,
    Liquidation,
    Rent,
    PropertyPurchase,
    PropertyEvent,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::BuyCrypto => "buy_crypto",
            TxKind::SellCrypto => "sell_crypto",
            TxKind::Liquidation => "liquidation",
            TxKind::Rent => "rent",
            TxKind::PropertyPurchase => "property_purchase",
            TxKind::PropertyEvent => "property_event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy_crypto" => Some(TxKind::BuyCrypto),
            "sell_crypto" => Some(TxKind::SellCrypto),
            "liquidation" => Some(TxKind::Liquidation),
            "rent" => Some(TxKind::Rent),
            "property_purchase" => Some(TxKind::PropertyPurchase),
            "property_event" => Some(TxKind::PropertyEvent),
            _ => None,
        }
    }
}

/// One row of the player-visible transaction history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: i64,
    pub kind: TxKind,
    /// Signed cash effect (negative = debit).
    pub amount: f64,
    pub description: String,
    pub created_at: i64,
}
