use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::{thread, time::Duration};

use plant_guardian::identification::GeminiBackend;
use plant_guardian::monitor::SmsDispatch;
use plant_guardian::{
    Config, FilePhoneStore, HttpSmsRelay, IdentificationClient, ImageUpload, MoistureMonitor,
    MonitorOutcome, MonitorSessions, NotificationStore, PlantRepository, RestPlantRepository,
    SmsClient,
};

/// Plant Guardian - moisture alerting daemon.
///
/// Polls the configured plants from the hosted backend, runs every reading
/// through the moisture monitor and sends SMS alerts to the numbers that
/// opted in. Optionally identifies a plant photo at startup and stores the
/// resulting care guide.
///
/// # Environment Variables
///
/// Required:
/// * `SUPABASE_URL` - Backend base URL
/// * `SUPABASE_ANON_KEY` - Backend API key
/// * `PLANT_IDS` - Comma separated ids of the plants to monitor
///
/// Optional (with defaults):
/// * `GEMINI_API_KEY` - Identification API key (identification disabled when unset)
/// * `GEMINI_API_URL` - Identification endpoint
/// * `SMS_FUNCTION_URL` - SMS relay (default: "<SUPABASE_URL>/functions/v1/send-sms")
/// * `PHONE_STORE_PATH` - Phone number file (default: "./phone-numbers.json")
/// * `POLL_INTERVAL_SECONDS` - Poll interval (default: "30")
/// * `IDENTIFY_IMAGE` - Photo to identify at startup
/// * `IDENTIFY_PLANT_ID` - Plant receiving the care guide from `IDENTIFY_IMAGE`
///
/// # Usage
///
/// ```bash
/// export SUPABASE_URL="https://project.supabase.co"
/// export SUPABASE_ANON_KEY="..."
/// export PLANT_IDS="63163886-8775-4190-9a9c-3cb893ed30c2"
/// ./plant-guardian
/// ```
fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let config = Config::load().context(
        "Failed to load configuration. Please ensure all required environment variables are set.",
    )?;

    info!("Plant Guardian starting...");
    info!("Using backend: {}", config.supabase_url);
    info!(
        "Monitoring {} plant(s): {}",
        config.plant_ids.len(),
        config.plant_ids.join(", ")
    );

    let repository =
        RestPlantRepository::new(config.supabase_url.clone(), config.supabase_anon_key.clone());

    if let Some(image_path) = &config.identify_image {
        if let Err(e) = identify_at_startup(&config, &repository, image_path) {
            error!("Startup identification failed: {:#}", e);
        }
    }

    let notifications = Arc::new(NotificationStore::new());
    let monitor = MoistureMonitor::new(
        Arc::clone(&notifications),
        SmsClient::new(HttpSmsRelay::new(
            config.sms_function_url.clone(),
            config.supabase_anon_key.clone(),
        )),
        Arc::new(FilePhoneStore::new(config.phone_store_path.clone())),
    );
    let mut sessions = MonitorSessions::new();
    for plant_id in &config.plant_ids {
        sessions.watch(plant_id);
    }

    info!("Plant Guardian initialized successfully. Starting monitoring loop...");

    loop {
        for plant_id in &config.plant_ids {
            let plant = match repository.fetch_plant(plant_id) {
                Ok(Some(plant)) => plant,
                Ok(None) => {
                    warn!("Plant {} not found, ending its session", plant_id);
                    sessions.unwatch(plant_id);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to fetch plant {}: {:#}", plant_id, e);
                    continue;
                }
            };

            match sessions.observe_at(&monitor, &plant, chrono::Utc::now()) {
                MonitorOutcome::Unchanged => {
                    debug!("{}: moisture unchanged at {}%", plant.name, plant.moisture)
                }
                MonitorOutcome::NoThreshold if plant.care.has_care_guide() => {
                    debug!("{}: care guide gives no moisture percentage", plant.name)
                }
                MonitorOutcome::NoThreshold => {
                    debug!("{}: no care guide on file, identify it to enable alerts", plant.name)
                }
                MonitorOutcome::WithinRange { threshold } => info!(
                    "{}: moisture {}% (threshold {}%)",
                    plant.name, plant.moisture, threshold
                ),
                MonitorOutcome::Alerted { sms, .. } => match sms {
                    SmsDispatch::Sent(result) => info!(
                        "{}: SMS notification sent. Remaining quota: {:?}",
                        plant.name, result.quota_remaining
                    ),
                    SmsDispatch::Failed(result) => warn!(
                        "{}: SMS notification failed: {}",
                        plant.name,
                        result.error.unwrap_or_default()
                    ),
                    SmsDispatch::CoolingDown { until } => {
                        info!("{}: next SMS allowed after {}", plant.name, until)
                    }
                    SmsDispatch::NoPhoneNumber => {
                        info!("{}: no phone number registered for SMS", plant.name)
                    }
                },
            }
        }

        debug!("{} unread notification(s)", notifications.len());
        thread::sleep(Duration::from_secs(config.poll_interval_seconds));
    }
}

/// Identify `image_path` and store the care guide on the configured plant.
fn identify_at_startup(
    config: &Config,
    repository: &RestPlantRepository,
    image_path: &std::path::Path,
) -> Result<()> {
    let Some(api_key) = &config.gemini_api_key else {
        warn!("IDENTIFY_IMAGE is set but GEMINI_API_KEY is not; skipping identification");
        return Ok(());
    };

    let backend = GeminiBackend::new(config.gemini_api_url.clone(), api_key.clone())?;
    let client = IdentificationClient::new(backend);
    let upload = ImageUpload::from_path(image_path)?;

    let Some(guide) = client.identify(upload)? else {
        warn!("Could not identify the plant. Try a clearer photo.");
        return Ok(());
    };

    info!(
        "Identified {} ({}), confidence {:.0}%",
        guide.name,
        guide.species,
        guide.confidence * 100.0
    );
    info!("Water: {}", guide.care.water);
    info!("Humidity: {}", guide.care.humidity);
    info!("Light: {}", guide.care.light);

    match &config.identify_plant_id {
        Some(plant_id) => repository.save_care_guide(plant_id, &guide),
        None => Ok(()),
    }
}
