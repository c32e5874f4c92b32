use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Condition threshold below which rent scales down proportionally.
pub const RENT_CONDITION_FLOOR: u8 = 80;

/// The fixed property catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Garage,
    Apartment,
    House,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 3] =
        [PropertyKind::Garage, PropertyKind::Apartment, PropertyKind::House];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Garage => "garage",
            PropertyKind::Apartment => "apartment",
            PropertyKind::House => "house",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "garage" => Some(PropertyKind::Garage),
            "apartment" => Some(PropertyKind::Apartment),
            "house" => Some(PropertyKind::House),
            _ => None,
        }
    }

    /// Purchase price in EUR.
    pub fn purchase_price(&self) -> f64 {
        match self {
            PropertyKind::Garage => 15_000.0,
            PropertyKind::Apartment => 120_000.0,
            PropertyKind::House => 550_000.0,
        }
    }

    /// Rent per 24h cycle at full condition.
    pub fn base_rent(&self) -> f64 {
        match self {
            PropertyKind::Garage => 110.0,
            PropertyKind::Apartment => 550.0,
            PropertyKind::House => 2_100.0,
        }
    }
}

/// An owned real-estate asset.
///
/// Never auto-deleted: a property at condition 0 simply earns nothing
/// until an event improves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub user_id: i64,
    pub kind: PropertyKind,
    pub purchase_price: f64,
    /// 0-100, decays over time.
    pub condition: u8,
    /// Epoch millis of the last rent credit.
    pub last_rent_collection: i64,
    pub acquired_at: i64,
}

impl Property {
    /// Create a freshly purchased property in perfect condition.
    pub fn purchase(user_id: i64, kind: PropertyKind) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            kind,
            purchase_price: kind.purchase_price(),
            condition: 100,
            last_rent_collection: now,
            acquired_at: now,
        }
    }

    /// Rent multiplier: proportional below the condition floor, full above.
    pub fn condition_factor(&self) -> f64 {
        if self.condition < RENT_CONDITION_FLOOR {
            self.condition as f64 / 100.0
        } else {
            1.0
        }
    }

    /// Rent due this cycle, scaled by condition.
    pub fn rent_amount(&self) -> f64 {
        self.kind.base_rent() * self.condition_factor()
    }

    /// Hours elapsed since the last rent credit.
    pub fn hours_since_rent(&self, now_ms: i64) -> f64 {
        (now_ms - self.last_rent_collection) as f64 / 3_600_000.0
    }
}

/// Clamp a signed condition computation into the stored 0-100 range.
pub fn clamp_condition(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}

/// A named random event that can hit an owned property.
#[derive(Debug, Clone, Copy)]
pub struct PropertyEvent {
    pub id: &'static str,
    pub title: &'static str,
    /// Inclusive cash cost range deducted from the owner.
    pub cost_range: (i64, i64),
    /// Signed condition change (negative = damage).
    pub condition_delta: i32,
    /// Relative weight for the random pick.
    pub weight: u32,
}
