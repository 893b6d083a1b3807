use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::errors::TrackerError;

/// Label printed on every part QR code in front of the part id.
pub const PAYLOAD_LABEL: &str = "Part ID:";

static PART_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Part ID:\s*([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\b",
    )
    .expect("part id pattern is valid")
});

/// Extract the part id from decoded QR text.
///
/// The text must contain `Part ID:` followed by optional whitespace and a
/// UUID; labels, line breaks or other fields around it are ignored.
pub fn parse_payload(text: &str) -> Result<Uuid, TrackerError> {
    let invalid = || TrackerError::InvalidPayload {
        payload: text.to_string(),
    };
    let captures = PART_ID_RE.captures(text).ok_or_else(invalid)?;
    Uuid::parse_str(&captures[1]).map_err(|_| invalid())
}

/// QR text for a part, the inverse of [`parse_payload`].
pub fn format_payload(part_id: Uuid) -> String {
    format!("{} {}", PAYLOAD_LABEL, part_id)
}
