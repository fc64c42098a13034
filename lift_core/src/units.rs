//! Weight unit conversion.
//!
//! Every place that aggregates or persists a weight goes through
//! [`canonical_kg`] so mixed units within one session never skew totals.

use crate::Unit;

/// Exact pounds-to-kilograms factor (international avoirdupois pound)
pub const KG_PER_LB: f64 = 0.45359237;

/// Convert a weight to kilograms
pub fn canonical_kg(magnitude: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Kg => magnitude,
        Unit::Lb => magnitude * KG_PER_LB,
    }
}

/// Round to two decimal places for display
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kg_is_identity() {
        assert_eq!(canonical_kg(102.5, Unit::Kg), 102.5);
    }

    #[test]
    fn test_lb_conversion() {
        assert!((canonical_kg(10.0, Unit::Lb) - 4.5359237).abs() < 1e-12);
        assert!((canonical_kg(225.0, Unit::Lb) - 102.05828325).abs() < 1e-9);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(545.359237), 545.36);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(1.005_000_1), 1.01);
    }
}
