use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use crate::domain::models::event::NewEvent;
use crate::error::AppError;

/// Start and end as the organizer typed them, in their own zone.
#[derive(Debug, Clone)]
pub struct LocalSchedule {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub timezone: Option<String>,
}

impl LocalSchedule {
    /// Fills the UTC times of `params` from this schedule.
    pub fn apply(&self, mut params: NewEvent) -> Result<NewEvent, AppError> {
        let zone = self.timezone.as_deref();
        params.start_time = to_utc(self.start, zone)?;
        params.end_time = self.end.map(|end| to_utc(end, zone)).transpose()?;
        Ok(params)
    }
}

/// Resolves a wall-clock start time to UTC. Without a zone the value is taken
/// as UTC already; with one, DST overlaps resolve to the earlier instant and
/// times skipped by a DST jump are rejected.
pub fn to_utc(local: NaiveDateTime, timezone: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    let Some(name) = timezone else {
        return Ok(local.and_utc());
    };
    let tz: Tz = name
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown timezone {}", name)))?;

    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(AppError::Validation(format!("{} does not exist in {}", local, name))),
    }
}
