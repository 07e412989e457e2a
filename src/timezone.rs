use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone used to turn the API's UTC timestamps into the wall-clock times users type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalZone {
    #[default]
    System,
    Named(Tz),
}

impl LocalZone {
    /// Parses an IANA zone name such as `Europe/Zurich`.
    pub fn parse(name: &str) -> Result<Self, String> {
        name.parse::<Tz>()
            .map(LocalZone::Named)
            .map_err(|_| format!("unknown time zone: {name}"))
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            LocalZone::System => instant.with_timezone(&Local).naive_local(),
            LocalZone::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// Earliest instant matching `local`; `None` inside a DST gap.
    pub fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            LocalZone::System => Local
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            LocalZone::Named(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
