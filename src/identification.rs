use anyhow::{Context, Result};
use log::{debug, error, info};
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::OnceLock;
use std::time::Duration;

use crate::care_text::parse_threshold;
use crate::image_prep::{ImagePreparer, ImageUpload};
use crate::plant::CareFields;
use crate::retry::RetryPolicy;

/// Placeholder stored for care sub-fields missing from the model output.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Confidence assigned when the model omits or garbles its confidence level.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

const IDENTIFICATION_PROMPT: &str = "You are an expert botanist helping identify plants.
Analyze this plant image and provide the following information:

1. The common name (or most likely plant type if unsure)
2. The scientific name (genus and species, just genus if species is uncertain)
3. A brief description including the plant family and key identifying features
4. A care guide covering watering, humidity (include a target percentage), light, soil, temperature, fertilizer and common problems

Format your response EXACTLY like this:
Name: [common name]
Scientific Name: [genus species]
Description: [your description]
Care Guide:
Water: [watering needs]
Humidity: [humidity needs, e.g. 40%]
Light: [light needs]
Soil: [soil needs]
Temperature: [temperature range]
Fertilizer: [fertilizer needs]
Watch out for: [common problems]
Confidence: [high/medium/low]";

/// Care instructions extracted from the `Care Guide:` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareInstructions {
    pub water: String,
    pub humidity: String,
    pub light: String,
    pub soil: String,
    pub temperature: String,
    pub fertilizer: String,
    pub warnings: String,
}

/// Result of a successful plant identification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareGuide {
    pub name: String,
    pub species: String,
    pub description: String,
    pub care: CareInstructions,
    /// 0.9, 0.7 or 0.5 depending on the self-reported confidence level.
    pub confidence: f64,
    /// Threshold parsed from the humidity text, kept as a structured value.
    pub moisture_threshold: Option<u32>,
    pub raw_response: String,
}

impl CareGuide {
    /// Care columns to persist on the identified plant.
    pub fn care_fields(&self) -> CareFields {
        CareFields {
            care_water: Some(self.care.water.clone()),
            care_humidity: Some(self.care.humidity.clone()),
            care_light: Some(self.care.light.clone()),
            care_soil: Some(self.care.soil.clone()),
            care_temperature: Some(self.care.temperature.clone()),
            care_fertilizer: Some(self.care.fertilizer.clone()),
            care_warnings: Some(self.care.warnings.clone()),
        }
    }
}

/// Transport to a generative vision-language endpoint.
pub trait GenerativeBackend {
    /// Submit one `generateContent` request and return the decoded JSON envelope.
    fn generate(&self, request: &Value) -> Result<Value>;
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiBackend {
    api_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GeminiBackend {
    /// Create a backend for `api_url`, authenticating with `api_key`.
    pub fn new(api_url: String, api_key: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            api_url,
            api_key,
            client,
        })
    }
}

impl GenerativeBackend for GeminiBackend {
    fn generate(&self, request: &Value) -> Result<Value> {
        info!("Making identification API request...");

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            error!("Identification API error ({}): {}", status, text);
            return Err(anyhow::anyhow!(
                "Identification API error (HTTP {}): {}",
                status,
                text
            ));
        }

        let body = response
            .json::<Value>()
            .context("Identification API returned a malformed body")?;
        Ok(body)
    }
}

/// Identifies plants from photos and turns the answer into a [`CareGuide`].
///
/// Transport failures are retried with exponential backoff and reported as
/// errors once the retries are spent. Answers that do not follow the expected
/// template are reported as `Ok(None)`.
pub struct IdentificationClient<B> {
    backend: B,
    retry_policy: RetryPolicy,
    preparer: ImagePreparer,
    sleeper: Box<dyn Fn(Duration)>,
}

impl<B: GenerativeBackend> IdentificationClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            retry_policy: RetryPolicy::default(),
            preparer: ImagePreparer::default(),
            sleeper: Box::new(std::thread::sleep),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_preparer(mut self, preparer: ImagePreparer) -> Self {
        self.preparer = preparer;
        self
    }

    /// Replace the function used to wait between attempts.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Fn(Duration) + 'static,
    {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Identify the plant in `upload`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(guide))` - the answer was parsed
    /// * `Ok(None)` - the endpoint answered but the text is unusable
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The upload is not an image or cannot be compressed
    /// - Every attempt failed (network, non-2xx, malformed body)
    pub fn identify(&self, upload: ImageUpload) -> Result<Option<CareGuide>> {
        let prepared = self.preparer.prepare(upload)?;
        let request = build_request(&prepared);

        let envelope = self
            .retry_policy
            .run(|_| self.backend.generate(&request), |delay| (self.sleeper)(delay))
            .context("Plant identification failed")?;

        let Some(text) = response_text(&envelope) else {
            error!("No candidate text in identification response: {}", envelope);
            return Ok(None);
        };
        debug!("Raw identification response: {}", text);

        let guide = parse_identification(text);
        match &guide {
            Some(guide) => info!(
                "Identified plant as {} ({}) with confidence {}",
                guide.name, guide.species, guide.confidence
            ),
            None => error!("Could not parse identification response"),
        }
        Ok(guide)
    }
}

/// Build the `generateContent` request for a prepared image.
pub fn build_request(image: &ImageUpload) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "text": IDENTIFICATION_PROMPT },
                {
                    "inline_data": {
                        "mime_type": image.mime_type,
                        "data": image.to_base64(),
                    }
                }
            ]
        }],
        "generationConfig": {
            "temperature": 0.2,
            "topK": 32,
            "topP": 1,
            "maxOutputTokens": 1024
        },
        "safetySettings": [{
            "category": "HARM_CATEGORY_DANGEROUS_CONTENT",
            "threshold": "BLOCK_NONE"
        }]
    })
}

/// Text of the first part of the first candidate, if any.
pub fn response_text(envelope: &Value) -> Option<&str> {
    envelope["candidates"][0]["content"]["parts"][0]["text"].as_str()
}

/// Parse the label-delimited answer of the identification model.
///
/// Returns `None` when the name, scientific name, description or care guide
/// block is missing. Missing care sub-fields fall back to [`NOT_SPECIFIED`].
pub fn parse_identification(text: &str) -> Option<CareGuide> {
    let patterns = Patterns::get();

    let name = capture(&patterns.name, text)?;
    let species = capture(&patterns.scientific_name, text)?;
    let description = capture(&patterns.description, text)?;
    let block = capture(&patterns.care_guide, text)?;

    let [water, humidity, light, soil, temperature, fertilizer, warnings] = patterns
        .care_fields
        .each_ref()
        .map(|regex| capture(regex, &block).unwrap_or_else(|| NOT_SPECIFIED.to_string()));
    let care = CareInstructions {
        water,
        humidity,
        light,
        soil,
        temperature,
        fertilizer,
        warnings,
    };

    let confidence = patterns
        .confidence
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(DEFAULT_CONFIDENCE, |level| confidence_score(level.as_str()));

    let moisture_threshold = parse_threshold(Some(&care.humidity));

    Some(CareGuide {
        name,
        species,
        description,
        care,
        confidence,
        moisture_threshold,
        raw_response: text.to_string(),
    })
}

/// Map a self-reported confidence level to a score.
pub fn confidence_score(level: &str) -> f64 {
    match level.trim().to_ascii_lowercase().as_str() {
        "high" => 0.9,
        "medium" => 0.7,
        "low" => 0.5,
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Care Guide labels, in `CareInstructions` field order.
const CARE_LABELS: [&str; 7] = [
    "Water",
    "Humidity",
    "Light",
    "Soil",
    "Temperature",
    "Fertilizer",
    "Watch out for",
];

struct Patterns {
    name: Regex,
    scientific_name: Regex,
    description: Regex,
    care_guide: Regex,
    confidence: Regex,
    care_fields: [Regex; 7],
}

impl Patterns {
    fn get() -> &'static Patterns {
        static PATTERNS: OnceLock<Patterns> = OnceLock::new();
        PATTERNS.get_or_init(|| Patterns {
            name: Regex::new(r"(?m)^[ \t]*\**Name:\**[ \t]*(.+)$").expect("valid name regex"),
            scientific_name: Regex::new(r"(?m)^[ \t]*\**Scientific Name:\**[ \t]*(.+)$")
                .expect("valid scientific name regex"),
            // the description must start on the label's own line
            description: Regex::new(
                r"(?s)Description:\**[ \t]*(\S.*?)(?:\n[ \t]*\**(?:Care Guide|Confidence):|\z)",
            )
            .expect("valid description regex"),
            care_guide: Regex::new(r"(?s)Care Guide:\**[ \t]*(.*?)(?:\n[ \t]*\**Confidence:|\z)")
                .expect("valid care guide regex"),
            confidence: Regex::new(r"(?i)Confidence:\**[ \t]*\**(high|medium|low)")
                .expect("valid confidence regex"),
            care_fields: CARE_LABELS.map(care_field_regex),
        })
    }
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    let value = regex.captures(text)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn care_field_regex(label: &str) -> Regex {
    // bullets and markdown emphasis are common in model output
    Regex::new(&format!(
        r"(?mi)^[ \t]*(?:[-*•][ \t]*)?\**{}:\**[ \t]*(.+)$",
        regex::escape(label)
    ))
    .expect("valid care field regex")
}
