use anyhow::{Context, Result};
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::ValidationError;
use crate::sms::{SmsClient, SmsRelay, SmsResult, format_phone_number, is_valid_phone_number};

/// Storage key of a plant's alert phone number.
pub fn phone_key(plant_id: &str) -> String {
    format!("plant-{}-phone", plant_id)
}

/// Key-value lookup of the phone numbers that opted into SMS alerts.
pub trait PhoneNumberStore: Send + Sync {
    fn phone_number(&self, plant_id: &str) -> Result<Option<String>>;

    fn set_phone_number(&self, plant_id: &str, phone_number: &str) -> Result<()>;

    fn remove_phone_number(&self, plant_id: &str) -> Result<()>;
}

/// Phone numbers held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryPhoneStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPhoneStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhoneNumberStore for MemoryPhoneStore {
    fn phone_number(&self, plant_id: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("phone store lock poisoned"))?;
        Ok(entries.get(&phone_key(plant_id)).cloned())
    }

    fn set_phone_number(&self, plant_id: &str, phone_number: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("phone store lock poisoned"))?;
        entries.insert(phone_key(plant_id), phone_number.to_string());
        Ok(())
    }

    fn remove_phone_number(&self, plant_id: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("phone store lock poisoned"))?;
        entries.remove(&phone_key(plant_id));
        Ok(())
    }
}

/// Phone numbers kept in a JSON object on disk, one key per plant.
///
/// The file is read on every lookup so numbers registered by another
/// process are picked up without a restart. A missing file is an empty store.
pub struct FilePhoneStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePhoneStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read phone store {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid phone store {}", self.path.display()))
    }

    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("phone store lock poisoned"))?;
        let mut entries = self.read_entries()?;
        change(&mut entries);
        let raw = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write phone store {}", self.path.display()))
    }
}

impl PhoneNumberStore for FilePhoneStore {
    fn phone_number(&self, plant_id: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(&phone_key(plant_id)))
    }

    fn set_phone_number(&self, plant_id: &str, phone_number: &str) -> Result<()> {
        let key = phone_key(plant_id);
        let value = phone_number.to_string();
        self.update(move |entries| {
            entries.insert(key, value);
        })
    }

    fn remove_phone_number(&self, plant_id: &str) -> Result<()> {
        let key = phone_key(plant_id);
        self.update(move |entries| {
            entries.remove(&key);
        })
    }
}

/// Opt a plant into SMS alerts.
///
/// The number must hold ten digits. A welcome text is sent first and the
/// normalised number is stored only when that text goes out, so a number
/// that cannot receive messages is never registered.
///
/// # Errors
///
/// Returns a [`ValidationError`] for a malformed number. Relay failures are
/// reported through the returned [`SmsResult`].
pub fn enroll_sms_alerts<R: SmsRelay>(
    sms: &SmsClient<R>,
    phones: &dyn PhoneNumberStore,
    plant_id: &str,
    plant_name: &str,
    phone_number: &str,
) -> Result<SmsResult> {
    let digits = format_phone_number(phone_number);
    if !is_valid_phone_number(&digits) {
        return Err(ValidationError::InvalidPhoneNumber {
            digits: digits.len(),
        }
        .into());
    }

    let result = sms.send(
        &digits,
        &format!(
            "Your plant {} is now being monitored and you will receive notifications if it needs watering!",
            plant_name
        ),
    );

    if result.success {
        phones.set_phone_number(plant_id, &digits)?;
        info!(
            "SMS alerts enabled for plant {} (remaining quota: {:?})",
            plant_id, result.quota_remaining
        );
    }

    Ok(result)
}
