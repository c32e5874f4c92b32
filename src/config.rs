use std::env;

/// Scheduler tick intervals, all in milliseconds.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Price refresh + liquidation sweep (~60s).
    pub fast_ms: u64,
    /// Economy tick: rent, maintenance, market events (hourly).
    pub economy_ms: u64,
    /// Season housekeeping (daily).
    pub daily_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            fast_ms: 60_000,
            economy_ms: 3_600_000,
            daily_ms: 86_400_000,
        }
    }
}

/// Property economy tuning.
#[derive(Debug, Clone)]
pub struct EconomyConfig {
    /// Hours between rent credits per property.
    pub rent_cycle_hours: f64,
    /// Per-property chance of a maintenance roll per economy tick.
    pub maintenance_chance: f64,
    /// Chance of a broadcast market event per economy tick.
    pub market_event_chance: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            rent_cycle_hours: 24.0,
            maintenance_chance: 0.05,
            market_event_chance: 0.1,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host address.
    pub host: String,
    /// API server port.
    pub port: u16,
    /// SQLite database path.
    pub db_path: String,
    /// Quote source base URL.
    pub quote_base_url: String,
    /// CoinGecko API key (optional, for pro tier).
    pub coingecko_api_key: Option<String>,
    /// Instrument set polled from the quote source (CoinGecko ids).
    pub supported_coins: Vec<String>,
    /// Timeout for quote source requests, in seconds.
    pub quote_timeout_secs: u64,
    /// Trading fee rate charged on every trade's stake.
    pub trade_fee_rate: f64,
    /// Cash granted to a freshly registered player.
    pub initial_cash: f64,
    /// Eligible trading volume required to unlock the property market.
    pub unlock_volume_threshold: f64,
    /// Season length in days before stats reset.
    pub season_duration_days: i64,
    /// Telegram bot token for outbound notifications (optional).
    pub telegram_token: Option<String>,
    /// Telegram Bot API base URL.
    pub telegram_api_url: String,
    /// Scheduler intervals.
    pub ticks: TickConfig,
    /// Property economy tuning.
    pub economy: EconomyConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let supported_coins = env::var("SUPPORTED_COINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|coins| !coins.is_empty())
            .unwrap_or_else(|| {
                ["bitcoin", "ethereum", "solana", "cardano", "dogecoin"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            db_path: env::var("DB_PATH").unwrap_or_else(|_| "magnate.db".to_string()),
            quote_base_url: env::var("QUOTE_BASE_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok(),
            supported_coins,
            quote_timeout_secs: env::var("QUOTE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            trade_fee_rate: env::var("TRADE_FEE_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.001),
            initial_cash: env::var("INITIAL_CASH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000.0),
            unlock_volume_threshold: env::var("UNLOCK_VOLUME_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000.0),
            season_duration_days: env::var("SEASON_DURATION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            telegram_token: env::var("BOT_TOKEN").ok(),
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            ticks: TickConfig {
                fast_ms: env::var("FAST_TICK_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60_000),
                economy_ms: env::var("ECONOMY_TICK_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3_600_000),
                daily_ms: env::var("DAILY_TICK_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(86_400_000),
            },
            economy: EconomyConfig {
                rent_cycle_hours: env::var("RENT_CYCLE_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(24.0),
                maintenance_chance: env::var("MAINTENANCE_CHANCE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.05),
                market_event_chance: env::var("MARKET_EVENT_CHANCE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.1),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3000,
            db_path: ":memory:".to_string(),
            quote_base_url: "https://api.coingecko.com/api/v3".to_string(),
            coingecko_api_key: None,
            supported_coins: vec!["bitcoin".to_string(), "ethereum".to_string()],
            quote_timeout_secs: 10,
            trade_fee_rate: 0.001,
            initial_cash: 10_000.0,
            unlock_volume_threshold: 30_000.0,
            season_duration_days: 30,
            telegram_token: None,
            telegram_api_url: "https://api.telegram.org".to_string(),
            ticks: TickConfig::default(),
            economy: EconomyConfig::default(),
        }
    }

    #[test]
    fn test_default_tick_intervals() {
        let ticks = TickConfig::default();
        assert_eq!(ticks.fast_ms, 60_000);
        assert_eq!(ticks.economy_ms, 3_600_000);
        assert_eq!(ticks.daily_ms, 86_400_000);
    }

    #[test]
    fn test_default_economy_tuning() {
        let economy = EconomyConfig::default();
        assert_eq!(economy.rent_cycle_hours, 24.0);
        assert_eq!(economy.maintenance_chance, 0.05);
        assert_eq!(economy.market_event_chance, 0.1);
    }

    #[test]
    fn test_config_clone() {
        let config = base_config();
        let cloned = config.clone();
        assert_eq!(cloned.port, config.port);
        assert_eq!(cloned.supported_coins, config.supported_coins);
        assert_eq!(cloned.trade_fee_rate, config.trade_fee_rate);
    }
}
