//! Domain primitives: TimeMs and the typed row identifiers.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// The Unix epoch, used as the start of the very first cycle.
    pub const EPOCH: TimeMs = TimeMs(0);

    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Get the underlying milliseconds value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Start of the UTC calendar day containing this instant.
    pub fn utc_day_start(&self) -> TimeMs {
        const DAY_MS: i64 = 24 * 60 * 60 * 1000;
        TimeMs(self.0.div_euclid(DAY_MS) * DAY_MS)
    }
}

impl std::fmt::Display for TimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Inventory lot (one purchased batch of an ingredient).
    LotId
);
row_id!(
    /// Purchase order grouping the lots bought together.
    PurchaseOrderId
);
row_id!(
    /// Raw ingredient.
    IngredientId
);
row_id!(
    /// Closed profit cycle.
    CycleId
);
row_id!(OrderId);
row_id!(LineItemId);
row_id!(PaymentId);
row_id!(ProductId);
row_id!(TableId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
        assert_eq!(TimeMs::EPOCH, TimeMs::new(0));
    }

    #[test]
    fn test_utc_day_start() {
        // 2026-10-18T13:45:00Z
        let t = TimeMs::new(1_792_331_100_000);
        assert_eq!(t.utc_day_start(), TimeMs::new(1_792_281_600_000));
        assert_eq!(TimeMs::new(1_792_281_600_000).utc_day_start().as_i64(), 1_792_281_600_000);
    }

    #[test]
    fn test_row_id_serializes_transparently() {
        let json = serde_json::to_string(&LotId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: CycleId = serde_json::from_str("7").unwrap();
        assert_eq!(back, CycleId::new(7));
    }
}
