use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::care_text::resolve_threshold;
use crate::config::constants;
use crate::notifications::{NotificationRecord, NotificationStore};
use crate::phone_store::PhoneNumberStore;
use crate::plant::Plant;
use crate::sms::{SmsClient, SmsRelay, SmsResult};

/// Per-plant state of one monitoring session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorState {
    /// Last reading seen, `None` before the first observation.
    pub last_moisture_level: Option<f64>,
    /// When the last SMS alert went out.
    pub last_notification_sent: Option<DateTime<Utc>>,
}

/// What the monitor did with one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    /// Same value as the previous reading; nothing was evaluated.
    Unchanged,
    /// No threshold could be resolved for the plant.
    NoThreshold,
    /// The reading is at or above the threshold.
    WithinRange { threshold: u32 },
    /// The reading breached the threshold and a notification was recorded.
    Alerted {
        notification: NotificationRecord,
        threshold: u32,
        sms: SmsDispatch,
    },
}

/// Fate of the SMS side channel for an alert.
#[derive(Debug, Clone, PartialEq)]
pub enum SmsDispatch {
    /// No phone number registered for the plant.
    NoPhoneNumber,
    /// An SMS already went out within the cooldown window.
    CoolingDown { until: DateTime<Utc> },
    Sent(SmsResult),
    Failed(SmsResult),
}

/// Edge-triggered moisture alerting.
///
/// Every reading that differs from the previous one is compared against the
/// plant's threshold. A breach always lands in the notification store; the
/// SMS copy is only sent when a phone number is registered and no SMS went
/// out for the plant within the cooldown window.
pub struct MoistureMonitor<R> {
    notifications: Arc<NotificationStore>,
    sms: SmsClient<R>,
    phones: Arc<dyn PhoneNumberStore>,
    cooldown: Duration,
}

impl<R: SmsRelay> MoistureMonitor<R> {
    pub fn new(
        notifications: Arc<NotificationStore>,
        sms: SmsClient<R>,
        phones: Arc<dyn PhoneNumberStore>,
    ) -> Self {
        Self {
            notifications,
            sms,
            phones,
            cooldown: Duration::seconds(constants::SMS_COOLDOWN_SECONDS),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    pub fn sms(&self) -> &SmsClient<R> {
        &self.sms
    }

    /// Feed the plant's current reading into `state`, stamped with the current time.
    pub fn observe(&self, state: &mut MonitorState, plant: &Plant) -> MonitorOutcome {
        self.observe_at(state, plant, Utc::now())
    }

    /// Feed the plant's current reading into `state` as observed at `now`.
    ///
    /// `last_moisture_level` is updated whatever the outcome.
    pub fn observe_at(
        &self,
        state: &mut MonitorState,
        plant: &Plant,
        now: DateTime<Utc>,
    ) -> MonitorOutcome {
        let moisture = plant.moisture;
        if state.last_moisture_level == Some(moisture) {
            return MonitorOutcome::Unchanged;
        }
        state.last_moisture_level = Some(moisture);

        let Some(threshold) = resolve_threshold(plant) else {
            debug!("No moisture threshold for plant {}", plant.id);
            return MonitorOutcome::NoThreshold;
        };

        if moisture >= f64::from(threshold) {
            return MonitorOutcome::WithinRange { threshold };
        }

        let message = alert_message(&plant.name, moisture, threshold);
        warn!("{}", message);
        let notification = self.notifications.add(&message, &plant.id, &plant.name);
        let sms = self.dispatch_sms(state, plant, &message, now);

        MonitorOutcome::Alerted {
            notification,
            threshold,
            sms,
        }
    }

    fn dispatch_sms(
        &self,
        state: &mut MonitorState,
        plant: &Plant,
        message: &str,
        now: DateTime<Utc>,
    ) -> SmsDispatch {
        let phone_number = match self.phones.phone_number(&plant.id) {
            Ok(Some(phone_number)) => phone_number,
            Ok(None) => return SmsDispatch::NoPhoneNumber,
            Err(e) => {
                error!("Failed to look up phone number for plant {}: {:#}", plant.id, e);
                return SmsDispatch::NoPhoneNumber;
            }
        };

        if let Some(last_sent) = state.last_notification_sent {
            if now - last_sent <= self.cooldown {
                debug!("SMS for plant {} suppressed by cooldown", plant.id);
                return SmsDispatch::CoolingDown {
                    until: last_sent + self.cooldown,
                };
            }
        }

        let result = self.sms.send(&phone_number, message);
        if result.success {
            state.last_notification_sent = Some(now);
            info!(
                "SMS alert sent for plant {}. Remaining quota: {:?}",
                plant.id, result.quota_remaining
            );
            SmsDispatch::Sent(result)
        } else {
            error!(
                "Error sending moisture alert for plant {}: {}",
                plant.id,
                result.error.as_deref().unwrap_or("unknown error")
            );
            SmsDispatch::Failed(result)
        }
    }
}

/// Text of a low-moisture alert.
pub fn alert_message(plant_name: &str, moisture: f64, threshold: u32) -> String {
    format!(
        "Your plant {} needs watering! Current moisture level ({}%) is below the recommended level of {}%.",
        plant_name, moisture, threshold
    )
}

/// Monitoring sessions of the actively watched plants, keyed by plant id.
#[derive(Debug, Default)]
pub struct MonitorSessions {
    states: HashMap<String, MonitorState>,
}

impl MonitorSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `plant_id`. An existing session is kept as is.
    pub fn watch(&mut self, plant_id: &str) {
        self.states.entry(plant_id.to_string()).or_default();
    }

    /// Stop watching `plant_id` and discard its state.
    pub fn unwatch(&mut self, plant_id: &str) -> Option<MonitorState> {
        self.states.remove(plant_id)
    }

    pub fn is_watching(&self, plant_id: &str) -> bool {
        self.states.contains_key(plant_id)
    }

    pub fn state(&self, plant_id: &str) -> Option<&MonitorState> {
        self.states.get(plant_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Route a reading to the plant's session, opening one if needed.
    pub fn observe_at<R: SmsRelay>(
        &mut self,
        monitor: &MoistureMonitor<R>,
        plant: &Plant,
        now: DateTime<Utc>,
    ) -> MonitorOutcome {
        let state = self.states.entry(plant.id.clone()).or_default();
        monitor.observe_at(state, plant, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone_store::MemoryPhoneStore;
    use crate::plant::CareFields;
    use crate::sms::RelayResponse;
    use std::cell::Cell;

    struct CountingRelay {
        calls: Cell<u32>,
        succeed: bool,
    }

    impl SmsRelay for CountingRelay {
        fn invoke(&self, _phone_number: &str, _message: &str) -> anyhow::Result<RelayResponse> {
            self.calls.set(self.calls.get() + 1);
            if self.succeed {
                Ok(RelayResponse {
                    success: true,
                    quota_remaining: Some(10),
                    ..Default::default()
                })
            } else {
                Err(anyhow::anyhow!("gateway down"))
            }
        }
    }

    fn plant(moisture: f64, humidity: Option<&str>) -> Plant {
        Plant {
            id: "p1".to_string(),
            name: "Fern".to_string(),
            species: None,
            description: None,
            moisture,
            light: 50.0,
            temperature: None,
            moisture_threshold: None,
            care: CareFields {
                care_humidity: humidity.map(str::to_string),
                ..Default::default()
            },
        }
    }

    fn monitor(succeed: bool, phone: Option<&str>) -> MoistureMonitor<CountingRelay> {
        let phones = MemoryPhoneStore::new();
        if let Some(phone) = phone {
            phones.set_phone_number("p1", phone).unwrap();
        }
        MoistureMonitor::new(
            Arc::new(NotificationStore::new()),
            SmsClient::new(CountingRelay {
                calls: Cell::new(0),
                succeed,
            }),
            Arc::new(phones),
        )
    }

    fn sms_calls(monitor: &MoistureMonitor<CountingRelay>) -> u32 {
        monitor.sms.relay().calls.get()
    }

    #[test]
    fn test_within_range_does_not_alert() {
        let monitor = monitor(true, Some("5145898299"));
        let mut state = MonitorState::default();
        let outcome = monitor.observe_at(&mut state, &plant(45.0, Some("40%")), Utc::now());
        assert_eq!(outcome, MonitorOutcome::WithinRange { threshold: 40 });
        assert_eq!(state.last_moisture_level, Some(45.0));
        assert!(monitor.notifications.is_empty());
    }

    #[test]
    fn test_equal_to_threshold_is_not_a_breach() {
        let monitor = monitor(true, None);
        let mut state = MonitorState::default();
        let outcome = monitor.observe_at(&mut state, &plant(40.0, Some("40%")), Utc::now());
        assert_eq!(outcome, MonitorOutcome::WithinRange { threshold: 40 });
    }

    #[test]
    fn test_no_threshold_skips_evaluation() {
        let monitor = monitor(true, Some("5145898299"));
        let mut state = MonitorState::default();
        let outcome = monitor.observe_at(&mut state, &plant(5.0, Some("humid")), Utc::now());
        assert_eq!(outcome, MonitorOutcome::NoThreshold);
        assert_eq!(state.last_moisture_level, Some(5.0));
        assert_eq!(state.last_notification_sent, None);
        assert!(monitor.notifications.is_empty());
        assert_eq!(sms_calls(&monitor), 0);
    }

    #[test]
    fn test_structured_threshold_wins_over_text() {
        let monitor = monitor(true, None);
        let mut state = MonitorState::default();
        let mut fern = plant(45.0, Some("40%"));
        fern.moisture_threshold = Some(50);
        let outcome = monitor.observe_at(&mut state, &fern, Utc::now());
        assert!(matches!(outcome, MonitorOutcome::Alerted { threshold: 50, .. }));
    }

    #[test]
    fn test_breach_records_notification_and_sends_sms() {
        let monitor = monitor(true, Some("5145898299"));
        let mut state = MonitorState::default();
        let now = Utc::now();

        let outcome = monitor.observe_at(
            &mut state,
            &plant(25.0, Some("maintain around 40% humidity")),
            now,
        );

        let MonitorOutcome::Alerted {
            notification,
            threshold,
            sms,
        } = outcome
        else {
            panic!("expected an alert");
        };
        assert_eq!(threshold, 40);
        assert_eq!(
            notification.message,
            "Your plant Fern needs watering! Current moisture level (25%) is below the recommended level of 40%."
        );
        assert!(matches!(sms, SmsDispatch::Sent(_)));
        assert_eq!(monitor.notifications.len(), 1);
        assert_eq!(sms_calls(&monitor), 1);
        assert_eq!(state.last_notification_sent, Some(now));
    }

    #[test]
    fn test_breach_without_phone_still_notifies() {
        let monitor = monitor(true, None);
        let mut state = MonitorState::default();
        let outcome = monitor.observe_at(&mut state, &plant(10.0, Some("40%")), Utc::now());
        assert!(matches!(
            outcome,
            MonitorOutcome::Alerted {
                sms: SmsDispatch::NoPhoneNumber,
                ..
            }
        ));
        assert_eq!(monitor.notifications.len(), 1);
        assert_eq!(state.last_notification_sent, None);
    }

    #[test]
    fn test_cooldown_gates_sms_only() {
        let monitor = monitor(true, Some("5145898299"));
        let mut state = MonitorState::default();
        let start = Utc::now();

        monitor.observe_at(&mut state, &plant(30.0, Some("40%")), start);
        let second = monitor.observe_at(
            &mut state,
            &plant(28.0, Some("40%")),
            start + Duration::minutes(30),
        );

        assert!(matches!(
            second,
            MonitorOutcome::Alerted {
                sms: SmsDispatch::CoolingDown { .. },
                ..
            }
        ));
        assert_eq!(monitor.notifications.len(), 2);
        assert_eq!(sms_calls(&monitor), 1);
        assert_eq!(state.last_notification_sent, Some(start));

        let third = monitor.observe_at(
            &mut state,
            &plant(26.0, Some("40%")),
            start + Duration::minutes(61),
        );
        assert!(matches!(
            third,
            MonitorOutcome::Alerted {
                sms: SmsDispatch::Sent(_),
                ..
            }
        ));
        assert_eq!(sms_calls(&monitor), 2);
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let monitor = monitor(true, Some("5145898299"));
        let mut state = MonitorState::default();
        let start = Utc::now();

        monitor.observe_at(&mut state, &plant(30.0, Some("40%")), start);
        let at_boundary = monitor.observe_at(
            &mut state,
            &plant(29.0, Some("40%")),
            start + Duration::hours(1),
        );
        assert_eq!(
            at_boundary,
            MonitorOutcome::Alerted {
                notification: monitor.notifications.list()[0].clone(),
                threshold: 40,
                sms: SmsDispatch::CoolingDown {
                    until: start + Duration::hours(1),
                },
            }
        );

        let just_after = monitor.observe_at(
            &mut state,
            &plant(28.0, Some("40%")),
            start + Duration::hours(1) + Duration::milliseconds(1),
        );
        assert!(matches!(
            just_after,
            MonitorOutcome::Alerted {
                sms: SmsDispatch::Sent(_),
                ..
            }
        ));
        assert_eq!(sms_calls(&monitor), 2);
    }

    #[test]
    fn test_failed_sms_keeps_notification_and_allows_retry() {
        let monitor = monitor(false, Some("5145898299"));
        let mut state = MonitorState::default();
        let start = Utc::now();

        let outcome = monitor.observe_at(&mut state, &plant(20.0, Some("40%")), start);
        assert!(matches!(
            outcome,
            MonitorOutcome::Alerted {
                sms: SmsDispatch::Failed(_),
                ..
            }
        ));
        assert_eq!(monitor.notifications.len(), 1);
        assert_eq!(state.last_moisture_level, Some(20.0));
        assert_eq!(state.last_notification_sent, None);

        monitor.observe_at(
            &mut state,
            &plant(19.0, Some("40%")),
            start + Duration::minutes(1),
        );
        assert_eq!(sms_calls(&monitor), 2);
    }

    #[test]
    fn test_repeated_reading_is_not_reevaluated() {
        let monitor = monitor(true, Some("5145898299"));
        let mut state = MonitorState::default();
        let dry = plant(25.0, Some("40%"));
        let start = Utc::now();

        monitor.observe_at(&mut state, &dry, start);
        let outcome = monitor.observe_at(&mut state, &dry, start + Duration::hours(2));

        assert_eq!(outcome, MonitorOutcome::Unchanged);
        assert_eq!(monitor.notifications.len(), 1);
        assert_eq!(sms_calls(&monitor), 1);
    }

    #[test]
    fn test_sessions_arena() {
        let monitor = monitor(true, None);
        let mut sessions = MonitorSessions::new();
        assert!(!sessions.is_watching("p1"));

        sessions.observe_at(&monitor, &plant(25.0, Some("40%")), Utc::now());
        assert!(sessions.is_watching("p1"));
        assert_eq!(
            sessions.state("p1").and_then(|s| s.last_moisture_level),
            Some(25.0)
        );

        let ended = sessions.unwatch("p1").unwrap();
        assert_eq!(ended.last_moisture_level, Some(25.0));
        assert!(sessions.is_empty());

        // a fresh session evaluates the same reading again
        let outcome = sessions.observe_at(&monitor, &plant(25.0, Some("40%")), Utc::now());
        assert!(matches!(outcome, MonitorOutcome::Alerted { .. }));
        assert_eq!(monitor.notifications.len(), 2);
    }
}
