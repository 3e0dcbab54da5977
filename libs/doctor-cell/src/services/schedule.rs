use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailableSlot, BusyInterval, DoctorError, WorkingHours, WorkingHoursEntry};

/// 0 = Sunday .. 6 = Saturday, matching the `weekday` column.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Checks a full weekly schedule: valid weekday, `start < end`, no overlap
/// between intervals of the same day.
pub fn validate_entries(entries: &[WorkingHoursEntry]) -> Result<(), DoctorError> {
    for entry in entries {
        if entry.weekday > 6 {
            return Err(DoctorError::InvalidWorkingHours(format!(
                "dia da semana {} fora do intervalo 0-6",
                entry.weekday
            )));
        }
        if entry.start >= entry.end {
            return Err(DoctorError::InvalidWorkingHours(format!(
                "início {} deve ser antes do fim {}",
                entry.start.format("%H:%M"),
                entry.end.format("%H:%M")
            )));
        }
    }

    for weekday in 0..=6u8 {
        let mut day: Vec<&WorkingHoursEntry> = entries.iter().filter(|e| e.weekday == weekday).collect();
        day.sort_by_key(|e| e.start);
        for pair in day.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(DoctorError::InvalidWorkingHours(format!(
                    "intervalos sobrepostos no dia {}: {}-{} e {}-{}",
                    weekday,
                    pair[0].start.format("%H:%M"),
                    pair[0].end.format("%H:%M"),
                    pair[1].start.format("%H:%M"),
                    pair[1].end.format("%H:%M")
                )));
            }
        }
    }

    Ok(())
}

/// End of a slot, or `None` when it would cross midnight.
fn slot_end(start: NaiveTime, duration_minutes: i64) -> Option<NaiveTime> {
    let (end, overflow) = start.overflowing_add_signed(Duration::minutes(duration_minutes));
    if overflow == 0 { Some(end) } else { None }
}

/// Whether `[start, start + duration)` lies inside one interval of that weekday.
pub fn fits_working_hours(
    hours: &[WorkingHours],
    date: NaiveDate,
    start: NaiveTime,
    duration_minutes: i64,
) -> bool {
    let Some(end) = slot_end(start, duration_minutes) else {
        return false;
    };
    let weekday = weekday_index(date);

    hours.iter()
        .filter(|h| h.weekday == weekday)
        .any(|h| h.start <= start && end <= h.end)
}

pub fn overlaps_busy(busy: &[BusyInterval], start: NaiveTime, duration_minutes: i64) -> bool {
    let Some(end) = slot_end(start, duration_minutes) else {
        return true;
    };

    // A busy interval running past midnight blocks the rest of the day.
    busy.iter().any(|b| {
        b.start < end && slot_end(b.start, b.duration_minutes).map_or(true, |busy_end| start < busy_end)
    })
}

/// Consecutive slots of `duration_minutes` inside the day's working hours
/// that do not touch any busy interval.
pub fn free_slots(
    hours: &[WorkingHours],
    date: NaiveDate,
    busy: &[BusyInterval],
    duration_minutes: i64,
) -> Vec<AvailableSlot> {
    if duration_minutes <= 0 {
        return Vec::new();
    }

    let weekday = weekday_index(date);
    let mut day: Vec<&WorkingHours> = hours.iter().filter(|h| h.weekday == weekday).collect();
    day.sort_by_key(|h| h.start);

    let mut slots = Vec::new();
    for interval in day {
        let mut current = interval.start;
        while let Some(end) = slot_end(current, duration_minutes) {
            if end > interval.end || end <= current {
                break;
            }
            if !overlaps_busy(busy, current, duration_minutes) {
                slots.push(AvailableSlot {
                    date,
                    start: current,
                    end,
                    duration_minutes,
                });
            }
            current = end;
        }
    }

    slots
}

pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_working_hours(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>, DoctorError> {
        debug!("Fetching working hours for doctor {}", doctor_id);

        let path = format!(
            "/rest/v1/horarios?doctor_id=eq.{}&order=weekday.asc,start.asc",
            doctor_id
        );
        let hours: Vec<WorkingHours> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(hours)
    }

    /// Replaces the doctor's whole weekly schedule. The new rows are written
    /// before the old ones are removed, so a failed write leaves the previous
    /// schedule in place.
    pub async fn replace_working_hours(
        &self,
        doctor_id: Uuid,
        entries: Vec<WorkingHoursEntry>,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>, DoctorError> {
        validate_entries(&entries)?;

        let previous = self.get_working_hours(doctor_id, auth_token).await?;
        let previous_ids: Vec<Uuid> = previous.iter().filter_map(|row| row.id).collect();

        let saved: Vec<WorkingHours> = if entries.is_empty() {
            Vec::new()
        } else {
            let rows: Vec<Value> = entries.iter()
                .map(|entry| json!({
                    "doctor_id": doctor_id,
                    "weekday": entry.weekday,
                    "start": entry.start.format("%H:%M:%S").to_string(),
                    "end": entry.end.format("%H:%M:%S").to_string()
                }))
                .collect();

            self.supabase.request_with_headers(
                Method::POST,
                "/rest/v1/horarios",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(SupabaseClient::representation_headers()),
            ).await?
        };

        if let Err(e) = self.delete_rows(&previous_ids, auth_token).await {
            warn!("Failed to drop old working hours for doctor {}, rolling back: {}", doctor_id, e);
            let saved_ids: Vec<Uuid> = saved.iter().filter_map(|row| row.id).collect();
            if let Err(rollback) = self.delete_rows(&saved_ids, auth_token).await {
                error!("Rollback of new working hours for doctor {} failed: {}", doctor_id, rollback);
            }
            return Err(e.into());
        }

        info!("Saved {} working-hour interval(s) for doctor {}", saved.len(), doctor_id);
        Ok(saved)
    }

    async fn delete_rows(&self, ids: &[Uuid], auth_token: &str) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("/rest/v1/horarios?id=in.({})", list);
        self.supabase.execute(Method::DELETE, &path, Some(auth_token), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(weekday: u8, start: NaiveTime, end: NaiveTime) -> WorkingHoursEntry {
        WorkingHoursEntry { weekday, start, end }
    }

    fn hours(weekday: u8, start: NaiveTime, end: NaiveTime) -> WorkingHours {
        WorkingHours { id: None, doctor_id: Uuid::nil(), weekday, start, end }
    }

    // 2024-05-06 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    #[test]
    fn weekday_index_starts_on_sunday() {
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2024, 5, 5).unwrap()), 0);
        assert_eq!(weekday_index(monday()), 1);
    }

    #[test]
    fn rejects_bad_entries() {
        assert_matches!(validate_entries(&[entry(7, t(8, 0), t(12, 0))]), Err(DoctorError::InvalidWorkingHours(_)));
        assert_matches!(validate_entries(&[entry(1, t(12, 0), t(8, 0))]), Err(DoctorError::InvalidWorkingHours(_)));
        assert_matches!(
            validate_entries(&[entry(1, t(8, 0), t(12, 0)), entry(1, t(11, 0), t(14, 0))]),
            Err(DoctorError::InvalidWorkingHours(msg)) if msg.contains("sobrepostos")
        );
    }

    #[test]
    fn accepts_adjacent_and_other_day_intervals() {
        let entries = [
            entry(1, t(8, 0), t(12, 0)),
            entry(1, t(12, 0), t(18, 0)),
            entry(2, t(9, 0), t(10, 0)),
        ];
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn slot_must_fit_inside_one_interval() {
        let schedule = [hours(1, t(8, 0), t(12, 0)), hours(1, t(14, 0), t(18, 0))];

        assert!(fits_working_hours(&schedule, monday(), t(11, 30), 30));
        assert!(!fits_working_hours(&schedule, monday(), t(11, 45), 30));
        assert!(!fits_working_hours(&schedule, monday(), t(12, 30), 30));
        // Tuesday has no hours
        assert!(!fits_working_hours(&schedule, monday().succ_opt().unwrap(), t(9, 0), 30));
        assert!(!fits_working_hours(&schedule, monday(), t(23, 50), 30));
    }

    #[test]
    fn free_slots_skip_busy_intervals() {
        let schedule = [hours(1, t(8, 0), t(10, 0))];
        let busy = [BusyInterval { start: t(8, 30), duration_minutes: 45 }];

        let slots = free_slots(&schedule, monday(), &busy, 30);
        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start).collect();

        assert_eq!(starts, vec![t(8, 0), t(9, 30)]);
        assert!(slots.iter().all(|s| s.duration_minutes == 30));
    }

    #[test]
    fn busy_overlap_is_half_open() {
        let busy = [BusyInterval { start: t(9, 0), duration_minutes: 30 }];
        assert!(!overlaps_busy(&busy, t(8, 30), 30));
        assert!(overlaps_busy(&busy, t(8, 45), 30));
        assert!(!overlaps_busy(&busy, t(9, 30), 30));
    }
}
