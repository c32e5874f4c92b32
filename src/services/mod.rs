pub mod economy;
pub mod events;
pub mod ledger;
pub mod liquidation;
pub mod notifier;
pub mod price_cache;
pub mod scheduler;
pub mod sqlite_store;
pub mod trade_math;

pub use economy::{EconomyEngine, EconomyError, PropertyMarketError};
pub use events::{EventEngine, MARKET_EVENTS, PROPERTY_EVENTS};
pub use ledger::{PositionLedger, TradingError};
pub use liquidation::{Liquidation, LiquidationEngine, LiquidationError};
pub use notifier::Notifier;
pub use price_cache::PriceCache;
pub use scheduler::Scheduler;
pub use sqlite_store::SqliteStore;
