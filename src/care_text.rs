use regex::Regex;
use std::sync::OnceLock;

use crate::plant::Plant;

/// Extract a moisture threshold from a free-text humidity description.
///
/// Returns the integer value of the first `<digits>%` occurrence in the text,
/// or `None` when the text is absent, empty, or carries no such pattern. A
/// parsed `0%` is returned as `Some(0)`.
///
/// Ranges are not interpreted: the first digits directly followed by `%` win.
///
/// # Examples
///
/// ```rust
/// use plant_guardian::care_text::parse_threshold;
///
/// assert_eq!(parse_threshold(Some("maintain around 40% humidity")), Some(40));
/// assert_eq!(parse_threshold(Some("moderate humidity")), None);
/// ```
pub fn parse_threshold(text: Option<&str>) -> Option<u32> {
    static PERCENT_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PERCENT_REGEX.get_or_init(|| Regex::new(r"(\d+)%").expect("valid percent regex"));

    let text = text?;
    let captures = regex.captures(text)?;
    captures.get(1)?.as_str().parse::<u32>().ok()
}

/// Resolve the alert threshold for a plant.
///
/// The structured `moisture_threshold` field takes precedence; the humidity
/// care text is only parsed when it is unset.
pub fn resolve_threshold(plant: &Plant) -> Option<u32> {
    plant
        .moisture_threshold
        .or_else(|| parse_threshold(plant.care.care_humidity.as_deref()))
}
