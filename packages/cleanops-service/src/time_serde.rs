//! RFC 3339 timestamps for API payloads, always rendered in UTC.

use serde::{Deserialize, Deserializer, Serializer};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted =
		value.to_offset(UtcOffset::UTC).format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

/// Accepts any offset; the instant is kept and the offset normalized to UTC.
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;
	let parsed = OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(serde::de::Error::custom)?;

	Ok(parsed.to_offset(UtcOffset::UTC))
}

#[cfg(test)]
mod tests {
	use serde::{Deserialize, Serialize};
	use time::macros::datetime;

	#[derive(Debug, Deserialize, Serialize)]
	struct Stamp {
		#[serde(with = "super")]
		at: time::OffsetDateTime,
	}

	#[test]
	fn offsets_are_rendered_in_utc() {
		let stamp = Stamp { at: datetime!(2024-03-04 09:30 +02:00) };
		let json = serde_json::to_string(&stamp).expect("Stamp should serialize.");

		assert_eq!(json, r#"{"at":"2024-03-04T07:30:00Z"}"#);

		let back: Stamp = serde_json::from_str(r#"{"at":"2024-03-04T09:30:00+02:00"}"#)
			.expect("Stamp should deserialize.");

		assert_eq!(back.at, datetime!(2024-03-04 07:30 UTC));
		assert_eq!(back.at.offset(), time::UtcOffset::UTC);
	}
}
