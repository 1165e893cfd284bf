//! Custom error types for the Plant Guardian application.
//!
//! Service calls (HTTP, relay, retry) propagate `anyhow::Error`. The enums in
//! this module cover the failures callers are expected to match on: bad
//! image input, rejected sensor data, and configuration problems.

use std::fmt;

/// Errors specific to image preparation before identification.
#[derive(Debug)]
pub enum ImageError {
    /// The upload does not carry an `image/*` MIME type.
    UnsupportedMimeType { mime_type: String },

    /// Image bytes could not be decoded.
    DecodeFailed { reason: String },

    /// Downscaled image could not be re-encoded.
    EncodeFailed { reason: String },

    /// Image file could not be opened or read.
    ReadFailed { path: String, reason: String },
}

/// Errors raised when plant data or a phone number fails validation.
#[derive(Debug, PartialEq)]
pub enum ValidationError {
    /// A sensor value lies outside its accepted range.
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A required field is empty.
    MissingField { field: String },

    /// Phone number does not contain exactly ten digits.
    InvalidPhoneNumber { digits: usize },
}

/// Errors related to configuration and application setup.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Invalid configuration values provided.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::UnsupportedMimeType { mime_type } => {
                write!(f, "Expected an image upload, got MIME type '{}'", mime_type)
            }
            ImageError::DecodeFailed { reason } => {
                write!(f, "Failed to decode image: {}", reason)
            }
            ImageError::EncodeFailed { reason } => {
                write!(f, "Failed to re-encode image: {}", reason)
            }
            ImageError::ReadFailed { path, reason } => {
                write!(f, "Failed to read image from '{}': {}", path, reason)
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(
                    f,
                    "{} value {} is outside the accepted range [{}, {}]",
                    field, value, min, max
                )
            }
            ValidationError::MissingField { field } => {
                write!(f, "Required field '{}' is empty", field)
            }
            ValidationError::InvalidPhoneNumber { digits } => {
                write!(
                    f,
                    "Phone number must contain exactly 10 digits, got {}",
                    digits
                )
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, reason
                )
            }
        }
    }
}

impl std::error::Error for ImageError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for ConfigError {}
