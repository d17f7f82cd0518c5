use crate::domain::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quantity(f64);

impl Quantity {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Quantity(value))
        } else {
            Err(ValidationError::InvalidQuantity)
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Round a quantity down to the venue's lot-size step.
///
/// Market sells must never exceed the available balance, so rounding is
/// always toward zero.
pub fn round_down_to_step(quantity: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return quantity;
    }
    let steps = (quantity / step).floor();
    let rounded = steps * step;
    // Guard against float drift like 0.30000000000000004.
    let decimals = step_decimals(step);
    let factor = 10f64.powi(decimals as i32);
    (rounded * factor).round() / factor
}

/// Number of decimal places implied by a lot-size step (0.001 -> 3).
pub fn step_decimals(step: f64) -> usize {
    if step <= 0.0 || step >= 1.0 {
        return 0;
    }
    (-step.log10()).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_non_negative() {
        assert_eq!(Quantity::new(3.5).unwrap().value(), 3.5);
        assert_eq!(Quantity::new(0.0).unwrap().value(), 0.0);
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert!(Quantity::new(-0.1).is_err());
        assert!(Quantity::new(f64::NAN).is_err());
    }

    #[test]
    fn rounds_down_to_step() {
        assert_eq!(round_down_to_step(1.2345, 0.01), 1.23);
        assert_eq!(round_down_to_step(0.999, 0.1), 0.9);
        assert_eq!(round_down_to_step(5.0, 1.0), 5.0);
        assert_eq!(round_down_to_step(0.0299999, 0.001), 0.029);
    }

    #[test]
    fn rounding_never_exceeds_input() {
        for qty in [0.1234567, 17.77, 0.0001, 123.456] {
            for step in [0.001, 0.01, 0.1, 1.0] {
                assert!(round_down_to_step(qty, step) <= qty + 1e-12);
            }
        }
    }

    #[test]
    fn step_decimal_places() {
        assert_eq!(step_decimals(0.001), 3);
        assert_eq!(step_decimals(0.1), 1);
        assert_eq!(step_decimals(1.0), 0);
        assert_eq!(step_decimals(0.00000001), 8);
    }

    #[test]
    fn zero_step_is_identity() {
        assert_eq!(round_down_to_step(1.23, 0.0), 1.23);
    }
}
