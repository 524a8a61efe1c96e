use serde::{Deserialize, Serialize};

/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Time(pub f64); // seconds since the Unix epoch

/// Closed time interval `[start, end]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: Time,
    pub end: Time,
}

impl TimeSpan {
    /// Builds a span, swapping the bounds if they arrive reversed.
    pub fn new(start: Time, end: Time) -> Self {
        if end.0 < start.0 {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end.0 - self.start.0).max(0.0)
    }

    pub fn contains(&self, t: Time) -> bool {
        !(t.0 < self.start.0 || t.0 > self.end.0)
    }

    /// `other` lies entirely inside `self`.
    pub fn contains_span(&self, other: &TimeSpan) -> bool {
        self.contains(other.start) && self.contains(other.end)
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        !(other.end.0 < self.start.0 || other.start.0 > self.end.0)
    }

    /// Clamps `other` into `self`.
    ///
    /// Returns `None` when the two spans do not overlap at all.
    pub fn clamp(&self, other: &TimeSpan) -> Option<TimeSpan> {
        if !self.overlaps(other) {
            return None;
        }
        Some(TimeSpan {
            start: Time(other.start.0.max(self.start.0)),
            end: Time(other.end.0.min(self.end.0)),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
    Decades,
}

impl TimeUnit {
    /// Nominal length of one unit in seconds.
    ///
    /// Months and years use Gregorian averages; good enough for counting
    /// selector stops, not for calendar arithmetic.
    pub fn approx_seconds(self) -> f64 {
        const DAY: f64 = 86_400.0;
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Days => DAY,
            TimeUnit::Weeks => 7.0 * DAY,
            TimeUnit::Months => 30.436_875 * DAY,
            TimeUnit::Years => 365.242_5 * DAY,
            TimeUnit::Decades => 3_652.425 * DAY,
        }
    }
}

/// Step interval of a time selector, e.g. `1 month`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub unit: TimeUnit,
    pub value: u32,
}

impl TimeInterval {
    pub const fn new(unit: TimeUnit, value: u32) -> Self {
        Self { unit, value }
    }

    pub fn approx_seconds(&self) -> f64 {
        self.unit.approx_seconds() * f64::from(self.value)
    }

    /// Number of selector stops an extent yields at this step (both ends included).
    pub fn stops_in(&self, extent: &TimeSpan) -> u64 {
        let step = self.approx_seconds();
        if step <= 0.0 {
            return 1;
        }
        // Half a step of slack absorbs uneven month/year lengths.
        (extent.duration() / step + 0.5).floor() as u64 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::{Time, TimeInterval, TimeSpan, TimeUnit};

    const YEAR: f64 = 365.2425 * 86_400.0;

    #[test]
    fn new_orders_bounds() {
        let s = TimeSpan::new(Time(10.0), Time(2.0));
        assert_eq!(s.start, Time(2.0));
        assert_eq!(s.end, Time(10.0));
        assert_eq!(s.duration(), 8.0);
    }

    #[test]
    fn clamp_keeps_window_inside_extent() {
        let extent = TimeSpan::new(Time(0.0), Time(100.0));
        let w = TimeSpan::new(Time(-20.0), Time(50.0));
        assert_eq!(
            extent.clamp(&w),
            Some(TimeSpan::new(Time(0.0), Time(50.0)))
        );
        assert!(extent.contains_span(&extent.clamp(&w).unwrap()));

        let disjoint = TimeSpan::new(Time(200.0), Time(300.0));
        assert_eq!(extent.clamp(&disjoint), None);
    }

    #[test]
    fn stops_count_both_ends() {
        let ten_years = TimeSpan::new(Time(0.0), Time(10.0 * YEAR));
        assert_eq!(TimeInterval::new(TimeUnit::Years, 1).stops_in(&ten_years), 11);
        assert_eq!(
            TimeInterval::new(TimeUnit::Months, 1).stops_in(&ten_years),
            121
        );
    }
}
