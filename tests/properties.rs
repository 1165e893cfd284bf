//! Property tests for threshold parsing, reading debounce and the
//! notification store.

use anyhow::Result;
use plant_guardian::care_text::parse_threshold;
use plant_guardian::sms::RelayResponse;
use plant_guardian::{
    CareFields, MemoryPhoneStore, MoistureMonitor, MonitorOutcome, MonitorState,
    NotificationStore, Plant, SmsClient, SmsRelay,
};
use proptest::prelude::*;
use std::sync::Arc;

struct SilentRelay;

impl SmsRelay for SilentRelay {
    fn invoke(&self, _phone_number: &str, _message: &str) -> Result<RelayResponse> {
        Ok(RelayResponse::default())
    }
}

fn plant(moisture: f64) -> Plant {
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
            care_humidity: Some("keep above 50% humidity".to_string()),
            ..Default::default()
        },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the first `<digits>%` occurrence is returned
    #[test]
    fn prop_first_percentage_is_returned(
        prefix in "[a-zA-Z ,.]{0,20}",
        first in 0u32..1000,
        second in 0u32..1000,
        suffix in "[a-zA-Z ,.]{0,20}",
    ) {
        let text = format!("{}{}% then {}%{}", prefix, first, second, suffix);
        prop_assert_eq!(parse_threshold(Some(&text)), Some(first));
    }

    /// Property: text without a percent sign never yields a threshold
    #[test]
    fn prop_no_percent_sign_no_threshold(text in "[a-zA-Z0-9 ,.-]{0,60}") {
        prop_assert_eq!(parse_threshold(Some(&text)), None);
    }

    /// Property: a repeated reading is never evaluated twice in a row
    #[test]
    fn prop_repeated_readings_are_skipped(readings in prop::collection::vec(0u8..=100, 1..40)) {
        let notifications = Arc::new(NotificationStore::new());
        let monitor = MoistureMonitor::new(
            Arc::clone(&notifications),
            SmsClient::new(SilentRelay),
            Arc::new(MemoryPhoneStore::new()),
        );
        let mut state = MonitorState::default();
        let mut previous: Option<u8> = None;
        let mut expected_alerts = 0;

        for reading in readings {
            let outcome = monitor.observe(&mut state, &plant(f64::from(reading)));
            if previous == Some(reading) {
                prop_assert_eq!(outcome, MonitorOutcome::Unchanged);
            } else {
                prop_assert_ne!(&outcome, &MonitorOutcome::Unchanged);
                if reading < 50 {
                    expected_alerts += 1;
                }
            }
            prop_assert_eq!(state.last_moisture_level, Some(f64::from(reading)));
            previous = Some(reading);
        }

        prop_assert_eq!(notifications.len(), expected_alerts);
    }

    /// Property: add followed by remove restores the previous contents
    #[test]
    fn prop_add_then_remove_round_trips(existing in 0usize..10, message in ".{0,40}") {
        let store = NotificationStore::new();
        for i in 0..existing {
            store.add(&format!("alert {}", i), "p1", "Fern");
        }
        let before = store.list();

        let record = store.add(&message, "p2", "Ficus");
        store.remove(&record.id);

        prop_assert_eq!(store.list(), before);
    }
}
