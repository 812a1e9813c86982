use chrono::{DateTime, Duration, Utc};

/// The time unit represented by one tick of the virtual clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl ClockUnit {
    fn to_milliseconds(self, time: i64) -> i64 {
        match self {
            ClockUnit::Milliseconds => time,
            ClockUnit::Seconds => time * 1_000,
            ClockUnit::Minutes => time * 60_000,
            ClockUnit::Hours => time * 3_600_000,
        }
    }
}

/// The simulation clock: the current virtual time, the unit it is counted
/// in, and the wall date the simulation notionally started at.
///
/// The start date matters for scenarios in which the load or availability
/// of resources varies with the day of the week.
#[derive(Debug, Clone)]
pub struct SimClock {
    time: i64,
    unit: ClockUnit,
    start_date: DateTime<Utc>,
}

impl SimClock {
    pub(crate) fn new() -> Self {
        Self { time: 0, unit: ClockUnit::Seconds, start_date: Utc::now() }
    }

    /// The current simulation time.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// The unit one clock tick represents. Defaults to seconds.
    pub fn unit(&self) -> ClockUnit {
        self.unit
    }

    /// The date the simulation started at.
    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// The wall date the current virtual time corresponds to.
    pub fn current_date(&self) -> DateTime<Utc> {
        self.start_date + Duration::milliseconds(self.unit.to_milliseconds(self.time))
    }

    pub(crate) fn set_time(&mut self, time: i64) {
        self.time = time;
    }

    pub(crate) fn set_unit(&mut self, unit: ClockUnit) {
        self.unit = unit;
    }

    pub(crate) fn set_start_date(&mut self, date: DateTime<Utc>) {
        self.start_date = date;
    }

    pub(crate) fn reset(&mut self) {
        self.time = 0;
        self.unit = ClockUnit::Seconds;
        self.start_date = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn current_date_follows_the_unit() {
        let mut clock = SimClock::new();
        clock.set_start_date(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        clock.set_unit(ClockUnit::Minutes);
        clock.set_time(90);
        assert_eq!(
            clock.current_date(),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 30, 0).unwrap()
        );
    }
}
