use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Accepts plain seconds (`90`), humantime text (`"1m 30s"`), an empty
/// string or null. Empty and null mean no duration.
pub fn deserialize_optional_duration<'de, D>(
    deserializer: D
) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String)
    }

    let raw = Option::<RawDuration>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawDuration::Seconds(secs)) => Ok(Some(Duration::from_secs(secs))),
        Some(RawDuration::Text(value)) => parse_optional_duration(&value)
            .map_err(D::Error::custom)
    }
}

/// Same rules as [`deserialize_optional_duration`], for CLI values.
pub fn parse_optional_duration(
    value: &str
) -> Result<Option<Duration>, humantime::DurationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Some(Duration::from_secs(secs)));
    }
    humantime::parse_duration(value).map(Some)
}
