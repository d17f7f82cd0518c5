use crate::domain::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Price(value))
        } else {
            Err(ValidationError::InvalidPrice)
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}
