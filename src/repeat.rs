use chrono::{DateTime, Days, Duration, Local, LocalResult, Months, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::Recurrence;

/// The calendar that recurrence steps are counted in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CalendarZone {
    #[default]
    Local,
    Named(Tz),
}

impl CalendarZone {
    pub fn from_name(name: Option<&str>) -> Self {
        let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => return Self::Local,
        };
        match name.parse::<Tz>() {
            Ok(tz) => Self::Named(tz),
            Err(err) => {
                log::warn!("unknown time zone {name:?}, falling back to local: {err}");
                Self::Local
            }
        }
    }

    pub fn next_due_date(&self, date: DateTime<Utc>, recurrence: Recurrence) -> DateTime<Utc> {
        match self {
            Self::Local => next_due_date_in(date, recurrence, &Local),
            Self::Named(tz) => next_due_date_in(date, recurrence, tz),
        }
    }

    /// Wall-clock reading of `date` in this calendar.
    pub fn wall_time(&self, date: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => date.with_timezone(&Local).naive_local(),
            Self::Named(tz) => date.with_timezone(tz).naive_local(),
        }
    }
}

pub fn next_due_date(date: DateTime<Utc>, recurrence: Recurrence) -> DateTime<Utc> {
    next_due_date_in(date, recurrence, &Local)
}

/// Advances `date` by one recurrence step on the wall clock of `zone`.
///
/// Monthly steps clamp to the last day of the target month. The result is strictly later than
/// `date` for every recurring variant; `Recurrence::None` returns `date` unchanged.
pub fn next_due_date_in<Z: TimeZone>(
    date: DateTime<Utc>,
    recurrence: Recurrence,
    zone: &Z,
) -> DateTime<Utc> {
    let wall = date.with_timezone(zone).naive_local();
    let stepped = match recurrence {
        Recurrence::None => return date,
        Recurrence::Daily => wall.checked_add_days(Days::new(1)),
        Recurrence::Weekly => wall.checked_add_days(Days::new(7)),
        Recurrence::Monthly => wall.checked_add_months(Months::new(1)),
    };

    stepped
        .and_then(|next| resolve_wall_time(zone, next))
        .filter(|next| *next > date)
        .unwrap_or_else(|| date + fixed_step(recurrence))
}

fn resolve_wall_time<Z: TimeZone>(zone: &Z, wall: NaiveDateTime) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&wall) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        // Skipped by a DST jump: land on the same minute one hour later.
        LocalResult::None => {
            let shifted = wall.checked_add_signed(Duration::hours(1))?;
            zone.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

fn fixed_step(recurrence: Recurrence) -> Duration {
    match recurrence {
        Recurrence::None => Duration::zero(),
        Recurrence::Daily => Duration::days(1),
        Recurrence::Weekly => Duration::days(7),
        Recurrence::Monthly => Duration::days(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_and_weekly_add_calendar_days() {
        let base = utc(2024, 1, 1, 9, 0);
        assert_eq!(
            next_due_date_in(base, Recurrence::Daily, &Utc),
            utc(2024, 1, 2, 9, 0)
        );
        assert_eq!(
            next_due_date_in(base, Recurrence::Weekly, &Utc),
            utc(2024, 1, 8, 9, 0)
        );
        assert_eq!(
            next_due_date_in(utc(2024, 2, 28, 9, 0), Recurrence::Daily, &Utc),
            utc(2024, 2, 29, 9, 0)
        );
    }

    #[test]
    fn monthly_keeps_day_and_time() {
        assert_eq!(
            next_due_date_in(utc(2024, 1, 1, 9, 0), Recurrence::Monthly, &Utc),
            utc(2024, 2, 1, 9, 0)
        );
        assert_eq!(
            next_due_date_in(utc(2024, 12, 31, 23, 30), Recurrence::Monthly, &Utc),
            utc(2025, 1, 31, 23, 30)
        );
    }

    #[test]
    fn monthly_clamps_to_last_day_of_short_months() {
        assert_eq!(
            next_due_date_in(utc(2024, 1, 31, 9, 0), Recurrence::Monthly, &Utc),
            utc(2024, 2, 29, 9, 0)
        );
        assert_eq!(
            next_due_date_in(utc(2023, 1, 31, 9, 0), Recurrence::Monthly, &Utc),
            utc(2023, 2, 28, 9, 0)
        );
        assert_eq!(
            next_due_date_in(utc(2024, 3, 31, 9, 0), Recurrence::Monthly, &Utc),
            utc(2024, 4, 30, 9, 0)
        );
    }

    #[test]
    fn none_returns_input_unchanged() {
        let base = utc(2024, 1, 1, 9, 0);
        assert_eq!(next_due_date_in(base, Recurrence::None, &Utc), base);
        assert_eq!(next_due_date(base, Recurrence::None), base);
    }

    #[test]
    fn daily_keeps_wall_clock_across_spring_forward() {
        let ny = chrono_tz::America::New_York;
        // 09:00 EST on the day before the switch.
        let base = utc(2024, 3, 9, 14, 0);
        // 09:00 EDT is one hour earlier in UTC.
        assert_eq!(
            next_due_date_in(base, Recurrence::Daily, &ny),
            utc(2024, 3, 10, 13, 0)
        );
    }

    #[test]
    fn wall_time_inside_dst_gap_moves_forward() {
        let ny = chrono_tz::America::New_York;
        // 02:30 EST; 02:30 does not exist on 2024-03-10 so it becomes 03:30 EDT.
        let base = utc(2024, 3, 9, 7, 30);
        assert_eq!(
            next_due_date_in(base, Recurrence::Daily, &ny),
            utc(2024, 3, 10, 7, 30)
        );
    }

    #[test]
    fn ambiguous_wall_time_takes_the_earlier_instant() {
        let ny = chrono_tz::America::New_York;
        // 01:30 EDT; on 2024-11-03 01:30 happens twice.
        let base = utc(2024, 11, 2, 5, 30);
        assert_eq!(
            next_due_date_in(base, Recurrence::Daily, &ny),
            utc(2024, 11, 3, 5, 30)
        );
    }

    #[test]
    fn recurring_steps_always_move_forward() {
        let zone = chrono_tz::Europe::London;
        for recurrence in [Recurrence::Daily, Recurrence::Weekly, Recurrence::Monthly] {
            let mut date = utc(2023, 1, 31, 0, 30);
            for _ in 0..60 {
                let next = next_due_date_in(date, recurrence, &zone);
                assert!(next > date, "{recurrence} did not advance from {date}");
                date = next;
            }
        }
    }

    #[test]
    fn calendar_zone_from_name() {
        assert_eq!(CalendarZone::from_name(None), CalendarZone::Local);
        assert_eq!(CalendarZone::from_name(Some("  ")), CalendarZone::Local);
        assert_eq!(
            CalendarZone::from_name(Some("Not/AZone")),
            CalendarZone::Local
        );
        assert_eq!(
            CalendarZone::from_name(Some("UTC")),
            CalendarZone::Named(chrono_tz::UTC)
        );

        let zone = CalendarZone::from_name(Some("Asia/Tokyo"));
        assert_eq!(
            zone.next_due_date(utc(2024, 1, 31, 0, 0), Recurrence::Monthly),
            utc(2024, 2, 29, 0, 0)
        );
        assert_eq!(
            zone.wall_time(utc(2024, 1, 31, 0, 0)),
            NaiveDateTime::parse_from_str("2024-01-31 09:00", "%Y-%m-%d %H:%M").unwrap()
        );
    }
}
