use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::blocking::RequestBuilder;
use serde_json::{Value, json};

use crate::identification::CareGuide;
use crate::plant::{Plant, SensorReading};

/// Read access to plant documents.
pub trait PlantRepository {
    /// Fetch a validated plant, or `None` if no document has that id.
    fn fetch_plant(&self, plant_id: &str) -> Result<Option<Plant>>;
}

/// Plant documents behind the hosted backend's REST interface.
///
/// Documents live in the `plants` table and are addressed with PostgREST
/// filters (`?id=eq.<id>`).
pub struct RestPlantRepository {
    pub base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl RestPlantRepository {
    /// Create a repository for the backend at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend URL (e.g. "https://project.supabase.co")
    /// * `api_key` - Key sent as `apikey` header and bearer token
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::blocking::Client::new(),
        }
    }

    fn plants_url(&self) -> String {
        format!("{}/rest/v1/plants", self.base_url)
    }

    /// Authenticated request on the row whose id equals `plant_id`.
    fn row_request(&self, method: reqwest::Method, plant_id: &str) -> RequestBuilder {
        self.client
            .request(method, self.plants_url())
            .query(&[("id", format!("eq.{}", plant_id))])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn fetch_request(&self, plant_id: &str) -> RequestBuilder {
        self.row_request(reqwest::Method::GET, plant_id).query(&[("select", "*")])
    }

    fn patch_request(&self, plant_id: &str, body: &Value) -> RequestBuilder {
        self.row_request(reqwest::Method::PATCH, plant_id)
            .header("Prefer", "return=minimal")
            .json(body)
    }

    /// Store a sensor reading on the plant.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A value lies outside its accepted range (nothing is sent)
    /// - The HTTP request fails
    /// - The API returns an error status
    pub fn update_sensor_data(&self, plant_id: &str, reading: &SensorReading) -> Result<()> {
        self.patch(plant_id, &sensor_update_body(reading)?)?;
        info!("Sensor data updated for plant {}", plant_id);
        Ok(())
    }

    /// Persist an identification result onto the plant.
    ///
    /// Writes species, description, the seven care columns and the
    /// structured moisture threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP request fails
    /// - The API returns an error status
    pub fn save_care_guide(&self, plant_id: &str, guide: &CareGuide) -> Result<()> {
        self.patch(plant_id, &care_guide_body(guide)?)?;
        info!("Care guide saved for plant {}", plant_id);
        Ok(())
    }

    fn patch(&self, plant_id: &str, body: &Value) -> Result<()> {
        debug!("PATCH plant {}: {}", plant_id, body);
        let response = self.patch_request(plant_id, body).send()?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to update plant {}: HTTP {}",
                plant_id,
                response.status()
            ));
        }

        Ok(())
    }
}

/// PATCH body for a sensor update. Absent values are left out.
fn sensor_update_body(reading: &SensorReading) -> Result<Value> {
    reading.validate()?;
    Ok(serde_json::to_value(reading)?)
}

/// PATCH body writing a care guide onto the plant's columns.
fn care_guide_body(guide: &CareGuide) -> Result<Value> {
    let mut body = json!({
        "species": guide.species,
        "description": guide.description,
        "moisture_threshold": guide.moisture_threshold,
    });
    if let (Value::Object(fields), Value::Object(care)) =
        (&mut body, serde_json::to_value(guide.care_fields())?)
    {
        fields.extend(care);
    }
    Ok(body)
}

impl PlantRepository for RestPlantRepository {
    fn fetch_plant(&self, plant_id: &str) -> Result<Option<Plant>> {
        let response = self.fetch_request(plant_id).send()?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch plant {}: HTTP {}",
                plant_id,
                response.status()
            ));
        }

        let rows: Vec<Plant> = response
            .json()
            .with_context(|| format!("Malformed plant document for {}", plant_id))?;

        match rows.into_iter().next() {
            Some(plant) => {
                plant.validate()?;
                Ok(Some(plant))
            }
            None => Ok(None),
        }
    }
}
