use anyhow::Result;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Outcome of one SMS dispatch attempt.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SmsResult {
    pub success: bool,
    pub quota_remaining: Option<i64>,
    pub error: Option<String>,
}

impl SmsResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            quota_remaining: None,
            error: Some(error.into()),
        }
    }
}

/// Body returned by the SMS relay function.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub text_id: Option<String>,
    #[serde(default)]
    pub quota_remaining: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Something that can hand a text message to the SMS gateway.
///
/// `phone_number` is already normalised to digits only.
pub trait SmsRelay {
    fn invoke(&self, phone_number: &str, message: &str) -> Result<RelayResponse>;
}

/// Relay backed by the hosted `send-sms` function.
///
/// The function forwards the message to the third-party SMS gateway and
/// echoes the gateway's JSON reply.
pub struct HttpSmsRelay {
    function_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpSmsRelay {
    /// Create a relay for the callable function at `function_url`.
    ///
    /// # Arguments
    ///
    /// * `function_url` - Full URL of the function (e.g. "https://x.supabase.co/functions/v1/send-sms")
    /// * `api_key` - Key sent as `apikey` header and bearer token
    pub fn new(function_url: String, api_key: String) -> Self {
        Self {
            function_url,
            api_key,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl SmsRelay for HttpSmsRelay {
    fn invoke(&self, phone_number: &str, message: &str) -> Result<RelayResponse> {
        let body = json!({
            "phoneNumber": phone_number,
            "message": message,
        });

        let response = self
            .client
            .post(&self.function_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(anyhow::anyhow!(
                "SMS relay returned HTTP {}: {}",
                status,
                text
            ));
        }

        Ok(response.json()?)
    }
}

/// Shapes SMS requests and normalises relay replies.
///
/// Never returns an error: transport and relay failures come back as an
/// unsuccessful [`SmsResult`] so callers can treat SMS as best effort.
pub struct SmsClient<R> {
    relay: R,
}

impl<R: SmsRelay> SmsClient<R> {
    pub fn new(relay: R) -> Self {
        Self { relay }
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Send `message` to `phone_number`.
    ///
    /// Non-digit characters are stripped from the number before it is handed
    /// to the relay. A number without any digit is rejected locally.
    pub fn send(&self, phone_number: &str, message: &str) -> SmsResult {
        let phone_number = format_phone_number(phone_number);
        if phone_number.is_empty() {
            return SmsResult::failure("Phone number contains no digits");
        }

        info!("Sending SMS via relay to {}", phone_number);

        match self.relay.invoke(&phone_number, message) {
            Ok(response) if response.success => SmsResult {
                success: true,
                quota_remaining: response.quota_remaining,
                error: None,
            },
            Ok(response) => {
                let reason = response
                    .error
                    .unwrap_or_else(|| "SMS relay reported a failure".to_string());
                error!("SMS relay rejected message: {}", reason);
                SmsResult {
                    success: false,
                    quota_remaining: response.quota_remaining,
                    error: Some(reason),
                }
            }
            Err(e) => {
                error!("Failed to call SMS relay: {:#}", e);
                SmsResult::failure(e.to_string())
            }
        }
    }
}

/// Strip every non-digit character.
pub fn format_phone_number(phone_number: &str) -> String {
    phone_number.chars().filter(char::is_ascii_digit).collect()
}

/// Whether `phone_number` holds exactly ten digits once normalised.
pub fn is_valid_phone_number(phone_number: &str) -> bool {
    format_phone_number(phone_number).len() == 10
}
