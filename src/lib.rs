//! Plant Guardian - moisture alerting for sensor-equipped house plants.
//!
//! This library watches live moisture readings of plants stored in a hosted
//! backend, compares them with a threshold taken from each plant's care guide
//! and raises in-app notifications plus SMS alerts when a plant dries out.
//! Care guides come from an image-identification model.
//!
//! # Core Components
//!
//! * [`care_text`] - Threshold extraction from free-text humidity advice
//! * [`identification`] - Plant identification with retry and answer parsing
//! * [`image_prep`] - Upload validation and compression
//! * [`retry`] - Bounded exponential backoff
//! * [`monitor`] - The moisture alert state machine and its sessions
//! * [`notifications`] - In-process notification store
//! * [`sms`] - SMS relay client
//! * [`phone_store`] - Per-plant phone numbers and SMS enrollment
//! * [`plant`] / [`plants`] - Plant documents and the REST repository
//! * [`config`] - Environment configuration
//! * [`error`] - Typed error enums
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plant_guardian::*;
//!
//! let config = Config::load()?;
//! let repository = RestPlantRepository::new(config.supabase_url.clone(), config.supabase_anon_key.clone());
//! let monitor = MoistureMonitor::new(
//!     Arc::new(NotificationStore::new()),
//!     SmsClient::new(HttpSmsRelay::new(config.sms_function_url.clone(), config.supabase_anon_key.clone())),
//!     Arc::new(FilePhoneStore::new(config.phone_store_path.clone())),
//! );
//! let mut sessions = MonitorSessions::new();
//!
//! if let Some(plant) = repository.fetch_plant(&config.plant_ids[0])? {
//!     let outcome = sessions.observe_at(&monitor, &plant, chrono::Utc::now());
//!     println!("{:?}", outcome);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod care_text;
pub mod config;
pub mod error;
pub mod identification;
pub mod image_prep;
pub mod monitor;
pub mod notifications;
pub mod phone_store;
pub mod plant;
pub mod plants;
pub mod retry;
pub mod sms;

// Re-export commonly used types for convenience
pub use config::Config;
pub use identification::{CareGuide, GeminiBackend, GenerativeBackend, IdentificationClient};
pub use image_prep::{ImagePreparer, ImageUpload};
pub use monitor::{MoistureMonitor, MonitorOutcome, MonitorSessions, MonitorState, SmsDispatch};
pub use notifications::{NotificationRecord, NotificationStore};
pub use phone_store::{FilePhoneStore, MemoryPhoneStore, PhoneNumberStore};
pub use plant::{CareFields, Plant, SensorReading};
pub use plants::{PlantRepository, RestPlantRepository};
pub use retry::RetryPolicy;
pub use sms::{HttpSmsRelay, SmsClient, SmsRelay, SmsResult};
