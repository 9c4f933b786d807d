//! Time granularity and the declarative bucket/label rule for each one.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

const RU_MONTHS_GENITIVE: [&str; 12] = [
    "Января", "Февраля", "Марта", "Апреля", "Мая", "Июня", "Июля", "Августа", "Сентября",
    "Октября", "Ноября", "Декабря",
];

const RU_MONTHS: [&str; 12] = [
    "Январь", "Февраль", "Март", "Апрель", "Май", "Июнь", "Июль", "Август", "Сентябрь",
    "Октябрь", "Ноябрь", "Декабрь",
];

const EN_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Language of the period labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

impl Locale {
    fn day_label(&self, date: NaiveDate) -> String {
        let m = date.month0() as usize;
        let month = match self {
            Locale::Ru => RU_MONTHS_GENITIVE[m],
            Locale::En => EN_MONTHS[m],
        };
        format!("{} {} {}", date.day(), month, date.year())
    }

    fn week_label(&self, week: u32, year: i32) -> String {
        match self {
            Locale::Ru => format!("{week:02} Неделя {year}"),
            Locale::En => format!("{week:02} Week {year}"),
        }
    }

    fn month_label(&self, date: NaiveDate) -> String {
        let m = date.month0() as usize;
        let month = match self {
            Locale::Ru => RU_MONTHS[m],
            Locale::En => EN_MONTHS[m],
        };
        format!("{} {}", month, date.year())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

/// Bucket a single day falls into for a given granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodBucket {
    /// Grouping key, unique per bucket across years.
    pub key: String,
    pub label: String,
    /// Days a bucket needs to be kept; 0 keeps every bucket.
    pub expected_days: u32,
}

/// Period-of-year key used by comparison views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareKey {
    /// `mm-dd`
    MonthDay(String),
    Week(i32),
    Month(i32),
}

/// Monday-based week of year, `00` before the first Monday (strftime `%W`).
pub fn week_of_year(date: NaiveDate) -> u32 {
    (date.ordinal0() + 7 - date.weekday().num_days_from_monday()) / 7
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

impl Granularity {
    /// Whether daily rows are summed into buckets.
    pub fn reduces(self) -> bool {
        !matches!(self, Granularity::Day)
    }

    pub fn bucket(self, date: NaiveDate, locale: Locale) -> PeriodBucket {
        match self {
            Granularity::Day => PeriodBucket {
                key: date.format("%Y-%m-%d").to_string(),
                label: locale.day_label(date),
                expected_days: 1,
            },
            // Only complete weeks survive.
            Granularity::Week => {
                let week = week_of_year(date);
                PeriodBucket {
                    key: format!("{}-W{:02}", date.year(), week),
                    label: locale.week_label(week, date.year()),
                    expected_days: 7,
                }
            }
            // Only complete months survive.
            Granularity::Month => PeriodBucket {
                key: date.format("%Y-%m").to_string(),
                label: locale.month_label(date),
                expected_days: days_in_month(date.year(), date.month()),
            },
            Granularity::Year => PeriodBucket {
                key: date.year().to_string(),
                label: date.year().to_string(),
                expected_days: 0,
            },
        }
    }

    pub fn compare_key(self, date: NaiveDate) -> Result<CompareKey, FlowError> {
        match self {
            Granularity::Day => Ok(CompareKey::MonthDay(date.format("%m-%d").to_string())),
            Granularity::Week => Ok(CompareKey::Week(week_of_year(date) as i32)),
            Granularity::Month => Ok(CompareKey::Month(date.month() as i32)),
            Granularity::Year => Err(FlowError::Unsupported(
                "year granularity has no period-of-year comparison".into(),
            )),
        }
    }
}

impl FromStr for Granularity {
    type Err = FlowError;

    /// Accepts the English names and the dashboard's Russian option labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "день" => Ok(Granularity::Day),
            "week" | "неделя" => Ok(Granularity::Week),
            "month" | "месяц" => Ok(Granularity::Month),
            "year" | "год" => Ok(Granularity::Year),
            _ => Err(FlowError::InvalidArgument(format!("granularity '{s}'"))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        };
        f.write_str(name)
    }
}
