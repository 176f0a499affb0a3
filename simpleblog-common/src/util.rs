use serde::{Serializer, ser::Error as _};
use thiserror::Error;
use time::{Duration, OffsetDateTime, UtcDateTime, format_description::well_known::Rfc3339};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[must_use]
pub fn to_offset_date_time(value: UtcDateTime) -> OffsetDateTime {
    value.date().with_time(value.time()).assume_utc()
}

/// Serializes a timestamp as an RFC 3339 string.
pub fn serialize_timestamp<S>(value: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = to_offset_date_time(*value)
        .format(&Rfc3339)
        .map_err(S::Error::custom)?;
    serializer.serialize_str(&formatted)
}

#[cfg(test)]
mod tests {
    use crate::util::{PositiveDuration, serialize_timestamp};
    use serde::Serialize;
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    #[derive(Serialize)]
    struct Stamped {
        #[serde(serialize_with = "serialize_timestamp")]
        at: UtcDateTime,
    }

    #[test]
    fn positive_duration() {
        assert!(PositiveDuration::new(Duration::minutes(10)).is_some());
        assert!(PositiveDuration::new(Duration::ZERO).is_none());
        assert!(PositiveDuration::try_from(Duration::seconds(-1)).is_err());
    }

    #[test]
    fn timestamps_serialize_as_rfc3339() {
        let stamped = Stamped {
            at: utc_datetime!(2025-10-24 10:30:15),
        };

        assert_eq!(
            serde_json::to_string(&stamped).unwrap(),
            r#"{"at":"2025-10-24T10:30:15Z"}"#
        );
    }
}
