use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MOISTURE_MIN_PCT: f64 = 0.0;
pub const MOISTURE_MAX_PCT: f64 = 100.0;
pub const LIGHT_MIN_PCT: f64 = 0.0;
pub const LIGHT_MAX_PCT: f64 = 100.0;
pub const TEMP_MIN_C: f64 = -50.0;
pub const TEMP_MAX_C: f64 = 100.0;

/// A plant document as stored by the hosted backend.
///
/// The core treats plants as read-only input. Values are checked by
/// [`Plant::validate`] at the repository boundary, never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Live soil moisture, 0 to 100.
    pub moisture: f64,
    /// Live light level, 0 to 100.
    pub light: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Structured alert threshold filled in at identification time.
    #[serde(default)]
    pub moisture_threshold: Option<u32>,
    #[serde(flatten)]
    pub care: CareFields,
}

/// The seven free-text care columns of a plant document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareFields {
    #[serde(default)]
    pub care_water: Option<String>,
    #[serde(default)]
    pub care_humidity: Option<String>,
    #[serde(default)]
    pub care_light: Option<String>,
    #[serde(default)]
    pub care_soil: Option<String>,
    #[serde(default)]
    pub care_temperature: Option<String>,
    #[serde(default)]
    pub care_fertilizer: Option<String>,
    #[serde(default)]
    pub care_warnings: Option<String>,
}

impl CareFields {
    /// Whether any care text is on file.
    pub fn has_care_guide(&self) -> bool {
        [
            &self.care_water,
            &self.care_humidity,
            &self.care_light,
            &self.care_soil,
            &self.care_temperature,
            &self.care_fertilizer,
            &self.care_warnings,
        ]
        .iter()
        .any(|field| field.as_deref().is_some_and(|text| !text.trim().is_empty()))
    }
}

impl Plant {
    /// Reject documents the monitor must not see.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "id".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "name".to_string(),
            });
        }
        check_range("moisture", self.moisture, MOISTURE_MIN_PCT, MOISTURE_MAX_PCT)?;
        check_range("light", self.light, LIGHT_MIN_PCT, LIGHT_MAX_PCT)?;
        if let Some(temperature) = self.temperature {
            check_range("temperature", temperature, TEMP_MIN_C, TEMP_MAX_C)?;
        }
        Ok(())
    }
}

/// A partial sensor update submitted for one plant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moisture: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl SensorReading {
    /// Validate every present value; an empty reading is rejected too.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.moisture.is_none() && self.light.is_none() && self.temperature.is_none() {
            return Err(ValidationError::MissingField {
                field: "reading".to_string(),
            });
        }
        if let Some(moisture) = self.moisture {
            check_range("moisture", moisture, MOISTURE_MIN_PCT, MOISTURE_MAX_PCT)?;
        }
        if let Some(light) = self.light {
            check_range("light", light, LIGHT_MIN_PCT, LIGHT_MAX_PCT)?;
        }
        if let Some(temperature) = self.temperature {
            check_range("temperature", temperature, TEMP_MIN_C, TEMP_MAX_C)?;
        }
        Ok(())
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    // NaN is out of range too
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}
