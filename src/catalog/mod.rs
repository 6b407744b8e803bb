//! Static catalog
//!
//! Read-only class data loaded once at start-up from the data directory:
//! - `birthdays.json`: `[{"name": "...", "date": "DD.MM"}]`
//! - `duties.txt`: free text shown as-is
//! - `schedule.json`: `{"<profile>": {"<weekday>": "<text>"}}`
//!
//! Every file is optional. A missing or unreadable file leaves its section
//! empty; malformed entries are skipped. Both are logged as warnings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use tracing::{info, warn};

pub const BIRTHDAYS_FILE: &str = "birthdays.json";
pub const DUTIES_FILE: &str = "duties.txt";
pub const SCHEDULE_FILE: &str = "schedule.json";

/// Telegram rejects callback data longer than this
pub const MAX_CALLBACK_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One birthday entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Birthday {
    pub name: String,
    pub day: u32,
    pub month: u32,
}

impl Birthday {
    /// Parse a `DD.MM` date. Feb 29 is accepted.
    pub fn parse(name: &str, date: &str) -> Option<Self> {
        let (day, month) = date.trim().split_once('.')?;
        let day: u32 = day.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        // 2000 is a leap year, so every real calendar day validates
        NaiveDate::from_ymd_opt(2000, month, day)?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            day,
            month,
        })
    }

    /// Exact day and month match
    pub fn falls_on(&self, date: NaiveDate) -> bool {
        self.day == date.day() && self.month == date.month()
    }
}

#[derive(Debug, Deserialize)]
struct RawBirthday {
    name: String,
    date: String,
}

/// Schedule of one profile, Monday first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSchedule {
    pub days: Vec<(Weekday, String)>,
}

impl ProfileSchedule {
    pub fn day(&self, weekday: Weekday) -> Option<&str> {
        self.days
            .iter()
            .find(|(d, _)| *d == weekday)
            .map(|(_, text)| text.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    pub birthdays: Vec<Birthday>,
    pub duties: String,
    pub schedule: BTreeMap<String, ProfileSchedule>,
}

/// Russian weekday name used on buttons and headers
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Понедельник",
        Weekday::Tue => "Вторник",
        Weekday::Wed => "Среда",
        Weekday::Thu => "Четверг",
        Weekday::Fri => "Пятница",
        Weekday::Sat => "Суббота",
        Weekday::Sun => "Воскресенье",
    }
}

/// Short lowercase code carried in callback data (`mon`, `tue`, ...)
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

pub fn profile_callback(profile: &str) -> String {
    format!("profile_{profile}")
}

pub fn day_callback(profile: &str, weekday: Weekday) -> String {
    format!("day_{profile}_{}", weekday_code(weekday))
}

impl StaticCatalog {
    /// Load every section from `dir`, tolerating missing and malformed data
    pub async fn load(dir: &Path) -> Self {
        let birthdays = match load_birthdays(&dir.join(BIRTHDAYS_FILE)).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "birthday list unavailable");
                Vec::new()
            }
        };
        let duties = match read_optional(&dir.join(DUTIES_FILE)).await {
            Ok(text) => text.unwrap_or_default().trim().to_string(),
            Err(e) => {
                warn!(error = %e, "duties text unavailable");
                String::new()
            }
        };
        let schedule = match load_schedule(&dir.join(SCHEDULE_FILE)).await {
            Ok(schedule) => schedule,
            Err(e) => {
                warn!(error = %e, "schedule unavailable");
                BTreeMap::new()
            }
        };

        let catalog = Self {
            birthdays,
            duties,
            schedule,
        };
        info!(
            birthdays = catalog.birthdays.len(),
            profiles = catalog.schedule.len(),
            duties = !catalog.duties.is_empty(),
            "static catalog loaded"
        );
        catalog
    }

    /// Names of everyone whose birthday falls on `date`
    pub fn birthdays_on(&self, date: NaiveDate) -> Vec<&str> {
        self.birthdays
            .iter()
            .filter(|b| b.falls_on(date))
            .map(|b| b.name.as_str())
            .collect()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.schedule.keys().map(String::as_str)
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileSchedule> {
        self.schedule.get(name)
    }

    /// One-line human summary for the `catalog` command
    pub fn summary(&self) -> String {
        let days: usize = self.schedule.values().map(|p| p.days.len()).sum();
        format!(
            "{} birthdays, {} schedule profiles ({} days), duties: {}",
            self.birthdays.len(),
            self.schedule.len(),
            days,
            if self.duties.is_empty() { "none" } else { "present" }
        )
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, CatalogError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "catalog file missing");
            Ok(None)
        }
        Err(source) => Err(CatalogError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn load_birthdays(path: &Path) -> Result<Vec<Birthday>, CatalogError> {
    let Some(text) = read_optional(path).await? else {
        return Ok(Vec::new());
    };
    let raw: Vec<RawBirthday> = serde_json::from_str(&text).map_err(|source| {
        CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| {
            let parsed = Birthday::parse(&entry.name, &entry.date);
            if parsed.is_none() {
                warn!(name = %entry.name, date = %entry.date, "skipping malformed birthday");
            }
            parsed
        })
        .collect())
}

async fn load_schedule(path: &Path) -> Result<BTreeMap<String, ProfileSchedule>, CatalogError> {
    let Some(text) = read_optional(path).await? else {
        return Ok(BTreeMap::new());
    };
    let raw: BTreeMap<String, BTreeMap<String, String>> =
        serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_schedule(raw))
}

fn parse_schedule(
    raw: BTreeMap<String, BTreeMap<String, String>>,
) -> BTreeMap<String, ProfileSchedule> {
    let mut schedule = BTreeMap::new();
    for (profile, days) in raw {
        let profile = profile.trim().to_string();
        if profile.is_empty() || profile_callback(&profile).len() > MAX_CALLBACK_BYTES {
            warn!(%profile, "skipping schedule profile with unusable name");
            continue;
        }
        let mut parsed: Vec<(Weekday, String)> = Vec::new();
        for (key, text) in days {
            let Ok(weekday) = key.trim().parse::<Weekday>() else {
                warn!(%profile, day = %key, "skipping unknown weekday");
                continue;
            };
            if day_callback(&profile, weekday).len() > MAX_CALLBACK_BYTES {
                warn!(%profile, day = %key, "skipping day whose callback data is too long");
                continue;
            }
            if parsed.iter().any(|(d, _)| *d == weekday) {
                warn!(%profile, day = %key, "skipping duplicate weekday");
                continue;
            }
            parsed.push((weekday, text));
        }
        parsed.sort_by_key(|(d, _)| d.num_days_from_monday());
        schedule.insert(profile, ProfileSchedule { days: parsed });
    }
    schedule
}
