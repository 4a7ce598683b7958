use crate::error::ModelError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    #[serde(default)]
    pub start_with: Option<i64>,
    #[serde(default)]
    pub increment_by: Option<i64>,
    #[serde(default)]
    pub min_value: Option<i64>,
    #[serde(default)]
    pub max_value: Option<i64>,
    #[serde(default)]
    pub cycle: bool,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_with: None,
            increment_by: None,
            min_value: None,
            max_value: None,
            cycle: false,
        }
    }

    pub fn start(&self) -> i64 {
        self.start_with.unwrap_or(1)
    }

    pub fn increment(&self) -> i64 {
        self.increment_by.unwrap_or(1)
    }

    pub fn min(&self) -> i64 {
        self.min_value.unwrap_or_else(|| self.start())
    }

    pub fn max(&self) -> i64 {
        self.max_value.unwrap_or(i64::MAX)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let fail = |reason: &str| {
            Err(ModelError::Sequence {
                sequence: self.name.clone(),
                reason: reason.to_string(),
            })
        };

        let (start, inc, min, max) = (self.start(), self.increment(), self.min(), self.max());
        if inc == 0 {
            return fail("INCREMENT BY must not be zero");
        }
        if min >= max {
            return fail("MINVALUE must be less than MAXVALUE");
        }
        if start < min || start > max {
            return fail("START WITH must lie between MINVALUE and MAXVALUE");
        }
        if inc < 0 {
            if start > 0 && start.checked_add(inc).is_none_or(|next| next < min) {
                return fail("START WITH + INCREMENT BY must not fall below MINVALUE");
            }
            // i128 keeps the full i64 range representable
            let range = (max as i128 - min as i128).abs();
            if (inc as i128).abs() >= range {
                return fail("the magnitude of INCREMENT BY must be less than MAXVALUE - MINVALUE");
            }
        }
        Ok(())
    }
}
