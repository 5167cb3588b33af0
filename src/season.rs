use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Lowercase form used in site and API URLs.
    pub fn slug(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonKey {
    pub year: i32,
    pub season: Season,
}

impl SeasonKey {
    pub fn label(&self) -> String {
        format!("{} {}", self.season.display(), self.year)
    }
}

/// Two season-boundary policies coexist upstream and disagree around the
/// year edges. Which one is authoritative is an open question, so both are
/// kept selectable instead of silently reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonPolicy {
    /// Fixed calendar cutoffs: spring from Mar 20, summer from Jun 21,
    /// fall from Sep 22, winter from Dec 21. A date before Mar 20 belongs
    /// to the previous year's winter.
    #[default]
    Calendar,
    /// Coarse month buckets: Jan-Mar winter, Apr-Jun spring, Jul-Sep
    /// summer, Oct-Dec fall. No year adjustment.
    Month,
}

impl SeasonPolicy {
    pub fn resolve(&self, date: NaiveDate) -> SeasonKey {
        match self {
            SeasonPolicy::Calendar => resolve_calendar(date),
            SeasonPolicy::Month => resolve_month(date),
        }
    }

    /// The season following `key`, under this policy's year convention.
    pub fn next(&self, key: SeasonKey) -> SeasonKey {
        let SeasonKey { year, season } = key;
        match (self, season) {
            // Calendar winter of year Y runs Dec 21 Y through Mar 19 Y+1,
            // so its successor is spring of Y+1.
            (SeasonPolicy::Calendar, Season::Winter) => SeasonKey {
                year: year + 1,
                season: Season::Spring,
            },
            (SeasonPolicy::Calendar, Season::Fall) => SeasonKey {
                year,
                season: Season::Winter,
            },
            // Month-bucket winter is Jan-Mar of the same year.
            (SeasonPolicy::Month, Season::Winter) => SeasonKey {
                year,
                season: Season::Spring,
            },
            (SeasonPolicy::Month, Season::Fall) => SeasonKey {
                year: year + 1,
                season: Season::Winter,
            },
            (_, Season::Spring) => SeasonKey {
                year,
                season: Season::Summer,
            },
            (_, Season::Summer) => SeasonKey {
                year,
                season: Season::Fall,
            },
        }
    }
}

fn resolve_calendar(date: NaiveDate) -> SeasonKey {
    let year = date.year();
    let spring = NaiveDate::from_ymd_opt(year, 3, 20).unwrap();
    let summer = NaiveDate::from_ymd_opt(year, 6, 21).unwrap();
    let fall = NaiveDate::from_ymd_opt(year, 9, 22).unwrap();
    let winter = NaiveDate::from_ymd_opt(year, 12, 21).unwrap();

    if date < spring {
        SeasonKey {
            year: year - 1,
            season: Season::Winter,
        }
    } else if date < summer {
        SeasonKey {
            year,
            season: Season::Spring,
        }
    } else if date < fall {
        SeasonKey {
            year,
            season: Season::Summer,
        }
    } else if date < winter {
        SeasonKey {
            year,
            season: Season::Fall,
        }
    } else {
        SeasonKey {
            year,
            season: Season::Winter,
        }
    }
}

fn resolve_month(date: NaiveDate) -> SeasonKey {
    let season = match date.month() {
        1..=3 => Season::Winter,
        4..=6 => Season::Spring,
        7..=9 => Season::Summer,
        _ => Season::Fall,
    };
    SeasonKey {
        year: date.year(),
        season,
    }
}

/// Inclusive date range over which episode scores are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWindow {
    /// The last complete Monday-Sunday week before `today`.
    pub fn last_full_week(today: NaiveDate) -> Self {
        let start = today - Duration::days(today.weekday().num_days_from_monday() as i64 + 7);
        ReportingWindow {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Parses an air-date cell as rendered on episode listing pages. Formats are
/// tried in order, first match wins. `None` means the record is dropped.
pub fn parse_air_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw == "Today" {
        return Some(today);
    }
    if raw == "Yesterday" {
        return Some(today - Duration::days(1));
    }
    for fmt in ["%b %d, %Y", "%Y-%m-%d", "%m/%d/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    None
}
