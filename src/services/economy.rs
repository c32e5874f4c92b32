//! Economy tick: rent, maintenance decay and property events.
//!
//! Every property is processed independently; an error on one is logged
//! and the batch continues with the rest.

use crate::config::EconomyConfig;
use crate::services::events::{weighted_pick, PROPERTY_EVENTS};
use crate::services::{Notifier, SqliteStore};
use crate::types::{clamp_condition, Property, PropertyKind, TxKind};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum EconomyError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Property market errors surfaced to the chat layer.
#[derive(Debug, Error)]
pub enum PropertyMarketError {
    #[error("Property market locked: volume {volume:.0} of required {required:.0}")]
    MarketLocked { volume: f64, required: f64 },

    #[error("Insufficient funds: need {needed:.2}, have {available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("Unknown player: {0}")]
    UnknownUser(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Weight of a plain wear roll against the named property events.
/// Roughly two thirds of maintenance rolls are ordinary decay.
const PLAIN_WEAR_WEIGHT: u32 = 12;

/// What a maintenance roll resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MaintenanceOutcome {
    /// Ordinary 1-10% wear.
    Wear(u8),
    /// Named event index into `PROPERTY_EVENTS`.
    Event(usize),
}

/// Hourly property economy processor, doubling as the property market.
pub struct EconomyEngine {
    store: Arc<SqliteStore>,
    notifier: Notifier,
    config: EconomyConfig,
    /// Trading volume a player must have before buying property.
    unlock_volume_threshold: f64,
}

impl EconomyEngine {
    pub fn new(
        store: Arc<SqliteStore>,
        notifier: Notifier,
        config: EconomyConfig,
        unlock_volume_threshold: f64,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            unlock_volume_threshold,
        }
    }

    /// Buy a catalog property for a player. The market is gated on
    /// accumulated trading volume; payment and the property row land in
    /// one transaction.
    pub fn purchase_property(
        &self,
        user_id: i64,
        kind: PropertyKind,
    ) -> Result<Property, PropertyMarketError> {
        let profile = self
            .store
            .get_profile(user_id)
            .ok_or(PropertyMarketError::UnknownUser(user_id))?;

        if profile.trading_volume < self.unlock_volume_threshold {
            return Err(PropertyMarketError::MarketLocked {
                volume: profile.trading_volume,
                required: self.unlock_volume_threshold,
            });
        }

        let property = Property::purchase(user_id, kind);
        if !self.store.execute_property_purchase(&property)? {
            return Err(PropertyMarketError::InsufficientFunds {
                needed: property.purchase_price,
                available: profile.balance,
            });
        }

        self.store.log_transaction(
            user_id,
            TxKind::PropertyPurchase,
            -property.purchase_price,
            &format!("Purchased {}", kind.as_str()),
        )?;
        info!(
            "Property purchase: user {} bought a {} for {:.0}",
            user_id,
            kind.as_str(),
            property.purchase_price
        );
        Ok(property)
    }

    /// Run one economy tick over every owned property. Returns how many
    /// properties were processed without error.
    pub fn run_tick(&self) -> usize {
        let properties = match self.store.all_properties() {
            Ok(properties) => properties,
            Err(e) => {
                error!("Economy tick skipped, property query failed: {}", e);
                return 0;
            }
        };

        let total = properties.len();
        let mut processed = 0;
        for property in properties {
            match self.process_property(&property) {
                Ok(()) => processed += 1,
                Err(e) => error!("Economy tick failed for property {}: {}", property.id, e),
            }
        }

        info!("Economy tick finished ({}/{} properties)", processed, total);
        processed
    }

    /// Rent on the configured cadence plus an independent maintenance
    /// roll.
    fn process_property(&self, property: &Property) -> Result<(), EconomyError> {
        let now = chrono::Utc::now().timestamp_millis();

        if property.hours_since_rent(now) >= self.config.rent_cycle_hours {
            self.credit_rent(property, now)?;
        }

        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < self.config.maintenance_chance {
            let outcome = roll_maintenance(&mut rng);
            drop(rng);
            self.apply_maintenance(property, outcome)?;
        }

        Ok(())
    }

    fn credit_rent(&self, property: &Property, now: i64) -> Result<(), EconomyError> {
        let rent = property.rent_amount();
        if rent > 0.0 {
            self.store.increment_balance(property.user_id, rent)?;
            self.store.log_transaction(
                property.user_id,
                TxKind::Rent,
                rent,
                &format!("Rent: {}", property.kind.as_str()),
            )?;
        }
        // The cycle advances even at condition 0, otherwise a repaired
        // property would back-pay missed cycles at once.
        self.store.mark_rent_collected(&property.id, now)?;
        Ok(())
    }

    fn apply_maintenance(
        &self,
        property: &Property,
        outcome: MaintenanceOutcome,
    ) -> Result<(), EconomyError> {
        match outcome {
            MaintenanceOutcome::Wear(damage) => {
                let new_condition = property.condition.saturating_sub(damage);
                self.store
                    .set_property_condition(&property.id, new_condition as i32)?;
                info!(
                    "Wear: {} of user {} damaged (-{}%, now {}%)",
                    property.kind.as_str(),
                    property.user_id,
                    damage,
                    new_condition
                );
            }
            MaintenanceOutcome::Event(index) => {
                let event = &PROPERTY_EVENTS[index];
                let cost = {
                    let mut rng = rand::thread_rng();
                    let (low, high) = event.cost_range;
                    if high > low {
                        rng.gen_range(low..=high)
                    } else {
                        low
                    }
                };

                let new_condition =
                    clamp_condition(property.condition as i32 + event.condition_delta);
                self.store
                    .set_property_condition(&property.id, new_condition as i32)?;

                if cost > 0 {
                    self.store.increment_balance(property.user_id, -(cost as f64))?;
                    self.store.log_transaction(
                        property.user_id,
                        TxKind::PropertyEvent,
                        -(cost as f64),
                        &format!("{} ({})", event.title, property.kind.as_str()),
                    )?;
                }

                self.notifier.send(
                    property.user_id,
                    format!(
                        "⚠️ **EVENT: {}**\n\nYour `{}` is affected.\n\
                         Cost: -{} €\nCondition: {}%",
                        event.title,
                        property.kind.as_str(),
                        cost,
                        new_condition
                    ),
                );
                info!(
                    "Property event {} hit {} of user {} (cost {}, condition {}%)",
                    event.id,
                    property.kind.as_str(),
                    property.user_id,
                    cost,
                    new_condition
                );
            }
        }
        Ok(())
    }
}

/// Pick between ordinary wear and the named event catalog. Wear damage
/// is a uniform 1-10% of condition.
fn roll_maintenance(rng: &mut impl Rng) -> MaintenanceOutcome {
    // Index 0 = plain wear, 1.. = PROPERTY_EVENTS entries.
    let weights: Vec<u32> = std::iter::once(PLAIN_WEAR_WEIGHT)
        .chain(PROPERTY_EVENTS.iter().map(|e| e.weight))
        .collect();
    let indices: Vec<usize> = (0..weights.len()).collect();

    match weighted_pick(rng, &indices, |&i| weights[i]) {
        Some(0) | None => MaintenanceOutcome::Wear(rng.gen_range(1..=10)),
        Some(&i) => MaintenanceOutcome::Event(i - 1),
    }
}
