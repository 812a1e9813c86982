use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Resource availability information: what fraction of a server's
/// resources is available at a given moment. Used by scenarios in which
/// resources join and leave the pool over time.
pub trait ServerAvailability {
    /// The availability at the given date, between `0.0` and `1.0`.
    fn availability(&self, date: DateTime<Utc>) -> f32 {
        let _ = date;
        1.0
    }
}

/// The default availability: all resources, all the time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullAvailability;

impl ServerAvailability for FullAvailability {}

/// Week-periodic availability at a granularity of one hour: a 7 x 24
/// table of fractions, all `1.0` by default.
#[derive(Debug, Clone)]
pub struct ServerHourlyAvailability {
    avail: [f32; 7 * 24],
}

impl Default for ServerHourlyAvailability {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHourlyAvailability {
    pub fn new() -> Self {
        Self { avail: [1.0; 7 * 24] }
    }

    /// Sets the availability over a period of the week, from
    /// `(day_start, hour_start)` through `(day_end, hour_end)` inclusive.
    /// A span with `day_end` before `day_start` wraps around the end of
    /// the week; `day_start == day_end` with `hour_end >= hour_start`
    /// covers a same-day span (the whole day with hours `0` and `23`).
    pub fn set_availability(
        &mut self,
        day_start: Weekday,
        hour_start: u32,
        day_end: Weekday,
        hour_end: u32,
        fraction: f32,
    ) {
        assert!(hour_start <= 23, "Start hour must be >= 0 and <= 23");
        assert!(hour_end <= 23, "End hour must be >= 0 and <= 23");
        assert!(
            (0.0..=1.0).contains(&fraction),
            "Availability must be >= 0 and <= 1"
        );

        let ds = day_start.num_days_from_sunday() as usize;
        let de = day_end.num_days_from_sunday() as usize;
        // wrap if the period runs over the end of the week
        let de = if de < ds { de + 7 } else { de };

        if ds == de {
            assert!(hour_end >= hour_start, "End hour must be >= start hour");
            for h in hour_start..=hour_end {
                self.avail[ds * 24 + h as usize] = fraction;
            }
        } else {
            for h in hour_start..24 {
                self.avail[ds * 24 + h as usize] = fraction;
            }
            for h in 0..=hour_end {
                self.avail[(de % 7) * 24 + h as usize] = fraction;
            }
            for d in (ds + 1)..de {
                for h in 0..24 {
                    self.avail[(d % 7) * 24 + h] = fraction;
                }
            }
        }
    }

    /// The availability at the given week day and hour.
    pub fn availability_at(&self, day: Weekday, hour: u32) -> f32 {
        assert!(hour <= 23, "Invalid hour: {}", hour);
        self.avail[day.num_days_from_sunday() as usize * 24 + hour as usize]
    }
}

impl ServerAvailability for ServerHourlyAvailability {
    fn availability(&self, date: DateTime<Utc>) -> f32 {
        self.availability_at(date.weekday(), date.hour())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults_to_fully_available() {
        let avail = ServerHourlyAvailability::new();
        assert_eq!(avail.availability_at(Weekday::Mon, 0), 1.0);
        assert_eq!(avail.availability_at(Weekday::Sat, 23), 1.0);
    }

    #[test]
    fn same_day_and_whole_day_spans() {
        let mut avail = ServerHourlyAvailability::new();
        avail.set_availability(Weekday::Tue, 9, Weekday::Tue, 17, 0.5);
        assert_eq!(avail.availability_at(Weekday::Tue, 9), 0.5);
        assert_eq!(avail.availability_at(Weekday::Tue, 17), 0.5);
        assert_eq!(avail.availability_at(Weekday::Tue, 8), 1.0);
        assert_eq!(avail.availability_at(Weekday::Tue, 18), 1.0);

        avail.set_availability(Weekday::Wed, 0, Weekday::Wed, 23, 0.0);
        assert_eq!(avail.availability_at(Weekday::Wed, 0), 0.0);
        assert_eq!(avail.availability_at(Weekday::Wed, 23), 0.0);
    }

    #[test]
    fn spans_wrap_over_the_weekend() {
        let mut avail = ServerHourlyAvailability::new();
        avail.set_availability(Weekday::Fri, 18, Weekday::Mon, 6, 0.25);
        assert_eq!(avail.availability_at(Weekday::Fri, 18), 0.25);
        assert_eq!(avail.availability_at(Weekday::Sat, 12), 0.25);
        assert_eq!(avail.availability_at(Weekday::Sun, 0), 0.25);
        assert_eq!(avail.availability_at(Weekday::Mon, 6), 0.25);
        assert_eq!(avail.availability_at(Weekday::Mon, 7), 1.0);
        assert_eq!(avail.availability_at(Weekday::Fri, 17), 1.0);
    }

    #[test]
    fn date_lookup_uses_weekday_and_hour() {
        let mut avail = ServerHourlyAvailability::new();
        avail.set_availability(Weekday::Mon, 8, Weekday::Mon, 16, 0.75);
        // 2024-01-01 was a Monday
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap();
        assert_eq!(avail.availability(date), 0.75);
    }
}
