use async_trait::async_trait;
use chrono::format::{self as chrono_format, Item, Parsed, StrftimeItems};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{StoreError, UnknownPeriod};
use crate::store::NoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::Daily,
        Period::Weekly,
        Period::Monthly,
        Period::Quarterly,
        Period::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
            Period::Yearly => "yearly",
        }
    }

    fn default_format(&self) -> &'static str {
        match self {
            Period::Daily => "%Y-%m-%d",
            Period::Weekly => "%G-W%V",
            Period::Monthly => "%Y-%m",
            Period::Quarterly => "%Y-Q%Q",
            Period::Yearly => "%Y",
        }
    }
}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPeriod(s.to_string()))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Per-granularity settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicNoteSettings {
    pub enabled: bool,
    /// Folder the notes live in, relative to the vault root.
    #[serde(default)]
    pub folder: String,
    /// chrono strftime format; `%Q` expands to the quarter number.
    pub format: String,
    /// Note whose content seeds newly created periodic notes.
    #[serde(default)]
    pub template: Option<String>,
}

impl PeriodicNoteSettings {
    pub fn defaults_for(period: Period) -> Self {
        Self {
            enabled: period == Period::Daily,
            folder: String::new(),
            format: period.default_format().to_string(),
            template: None,
        }
    }
}

/// Reject date formats chrono cannot render. `%Q` (quarter) is ours and
/// always valid.
pub fn check_format(format: &str) -> Result<(), StoreError> {
    let format_with_quarter = format.replace("%Q", "1");
    if StrftimeItems::new(&format_with_quarter).any(|item| matches!(item, Item::Error)) {
        return Err(StoreError::DateFormat(format.to_string()));
    }
    Ok(())
}

pub fn default_periodic_settings() -> BTreeMap<Period, PeriodicNoteSettings> {
    Period::ALL
        .into_iter()
        .map(|p| (p, PeriodicNoteSettings::defaults_for(p)))
        .collect()
}

/// Periodic-notes feature as seen by the router, keyed by granularity.
#[async_trait]
pub trait PeriodicCapability: Send + Sync {
    fn is_enabled(&self, period: Period) -> bool;

    /// Path of the note for the current period, if that note exists.
    async fn current_note_path(&self, period: Period) -> Result<Option<String>, StoreError>;

    async fn all_notes(&self, period: Period) -> Result<Vec<String>, StoreError>;

    fn settings(&self, period: Period) -> Option<PeriodicNoteSettings>;

    /// Create the note for the current period (or return it if present).
    async fn create(&self, period: Period) -> Result<String, StoreError>;
}

pub type Clock = fn() -> NaiveDate;

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// One granularity of periodic notes, driven entirely by its settings.
pub struct PeriodicNoteSource {
    period: Period,
    settings: PeriodicNoteSettings,
}

impl PeriodicNoteSource {
    pub fn new(period: Period, settings: PeriodicNoteSettings) -> Self {
        Self { period, settings }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Vault path of the note covering `date`.
    pub fn path_for(&self, date: NaiveDate) -> Result<String, StoreError> {
        let quarter = (date.month0() / 3 + 1).to_string();
        let format = self.settings.format.replace("%Q", &quarter);

        // Formats that only fail while rendering (e.g. a time zone on a date)
        // surface here as fmt::Error
        let mut name = String::new();
        write!(name, "{}", date.format(&format))
            .map_err(|_| StoreError::DateFormat(self.settings.format.clone()))?;

        let folder = self.settings.folder.trim_matches('/');
        if folder.is_empty() {
            Ok(format!("{}.md", name))
        } else {
            Ok(format!("{}/{}.md", folder, name))
        }
    }

    /// Whether `path` sits in this source's folder and its name follows the
    /// configured format.
    pub fn owns(&self, path: &str) -> bool {
        let folder = self.settings.folder.trim_matches('/');
        let (parent, file) = path.rsplit_once('/').unwrap_or(("", path));
        if parent != folder {
            return false;
        }
        let Some(stem) = file.strip_suffix(".md") else {
            return false;
        };

        // Any quarter digit is accepted where the format says %Q
        let formats: Vec<String> = if self.settings.format.contains("%Q") {
            (1..=4)
                .map(|q| self.settings.format.replace("%Q", &q.to_string()))
                .collect()
        } else {
            vec![self.settings.format.clone()]
        };
        formats.iter().any(|format| {
            let mut parsed = Parsed::new();
            chrono_format::parse(&mut parsed, stem, StrftimeItems::new(format)).is_ok()
        })
    }
}

/// The five configured sources behind one capability.
pub struct PeriodicNotes {
    sources: BTreeMap<Period, PeriodicNoteSource>,
    store: Arc<dyn NoteStore>,
    today: Clock,
}

impl PeriodicNotes {
    pub fn new(settings: &BTreeMap<Period, PeriodicNoteSettings>, store: Arc<dyn NoteStore>) -> Self {
        Self::with_clock(settings, store, local_today)
    }

    pub fn with_clock(
        settings: &BTreeMap<Period, PeriodicNoteSettings>,
        store: Arc<dyn NoteStore>,
        today: Clock,
    ) -> Self {
        let sources = Period::ALL
            .into_iter()
            .map(|p| {
                let s = settings
                    .get(&p)
                    .cloned()
                    .unwrap_or_else(|| PeriodicNoteSettings::defaults_for(p));
                (p, PeriodicNoteSource::new(p, s))
            })
            .collect();
        Self {
            sources,
            store,
            today,
        }
    }

    fn enabled_source(&self, period: Period) -> Option<&PeriodicNoteSource> {
        self.sources.get(&period).filter(|s| s.settings.enabled)
    }
}

#[async_trait]
impl PeriodicCapability for PeriodicNotes {
    fn is_enabled(&self, period: Period) -> bool {
        self.enabled_source(period).is_some()
    }

    async fn current_note_path(&self, period: Period) -> Result<Option<String>, StoreError> {
        let Some(source) = self.enabled_source(period) else {
            return Ok(None);
        };
        let path = source.path_for((self.today)())?;
        if self.store.exists(&path).await {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    async fn all_notes(&self, period: Period) -> Result<Vec<String>, StoreError> {
        let Some(source) = self.enabled_source(period) else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .list_notes()
            .await?
            .into_iter()
            .filter(|p| source.owns(p))
            .collect())
    }

    fn settings(&self, period: Period) -> Option<PeriodicNoteSettings> {
        self.sources.get(&period).map(|s| s.settings.clone())
    }

    async fn create(&self, period: Period) -> Result<String, StoreError> {
        let source = self
            .enabled_source(period)
            .ok_or_else(|| StoreError::NotFound(format!("{} notes are not enabled", period)))?;
        let path = source.path_for((self.today)())?;
        if self.store.exists(&path).await {
            return Ok(path);
        }

        let content = match source.settings.template.as_deref() {
            Some(template) => match self.store.note_at_path(template).await? {
                Some(note) => note.content,
                None => {
                    tracing::warn!("Periodic note template '{}' not found", template);
                    String::new()
                }
            },
            None => String::new(),
        };

        self.store.write_note(&path, &content).await?;
        tracing::info!("Created {} note {}", source.period(), path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn fixed_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
    }

    fn settings_with(folder: &str) -> BTreeMap<Period, PeriodicNoteSettings> {
        let mut settings = default_periodic_settings();
        for s in settings.values_mut() {
            s.enabled = true;
            s.folder = folder.to_string();
        }
        settings
    }

    #[test]
    fn test_period_names() {
        assert_eq!("quarterly".parse::<Period>(), Ok(Period::Quarterly));
        assert_eq!(
            "hourly".parse::<Period>(),
            Err(UnknownPeriod("hourly".to_string()))
        );
        assert_eq!(Period::Weekly.to_string(), "weekly");
    }

    #[test]
    fn test_path_for_each_granularity() {
        let settings = settings_with("Journal");
        let expect = [
            (Period::Daily, "Journal/2024-05-14.md"),
            (Period::Weekly, "Journal/2024-W20.md"),
            (Period::Monthly, "Journal/2024-05.md"),
            (Period::Quarterly, "Journal/2024-Q2.md"),
            (Period::Yearly, "Journal/2024.md"),
        ];
        for (period, path) in expect {
            let source = PeriodicNoteSource::new(period, settings[&period].clone());
            assert_eq!(source.path_for(fixed_day()).unwrap(), path);
        }
    }

    #[test]
    fn test_bad_format_is_an_error_not_a_panic() {
        let mut settings = PeriodicNoteSettings::defaults_for(Period::Daily);
        settings.format = "%Y-%!".to_string();
        assert!(matches!(
            check_format(&settings.format),
            Err(StoreError::DateFormat(_))
        ));

        let source = PeriodicNoteSource::new(Period::Daily, settings);
        assert!(matches!(
            source.path_for(fixed_day()),
            Err(StoreError::DateFormat(ref f)) if f == "%Y-%!"
        ));

        assert!(check_format("%Y-Q%Q").is_ok());
        assert!(check_format("%G-W%V").is_ok());
    }

    #[tokio::test]
    async fn test_bad_format_surfaces_from_capability() {
        let store = Arc::new(MemoryStore::new());
        let mut settings = settings_with("Daily");
        settings.get_mut(&Period::Daily).unwrap().format = "%Y-%!".into();
        let notes = PeriodicNotes::with_clock(&settings, store, fixed_day);
        assert!(notes.current_note_path(Period::Daily).await.is_err());
        assert!(notes.create(Period::Daily).await.is_err());
    }

    #[test]
    fn test_defaults_enable_daily_only() {
        let settings = default_periodic_settings();
        assert!(settings[&Period::Daily].enabled);
        assert!(!settings[&Period::Weekly].enabled);
        assert_eq!(settings[&Period::Daily].folder, "");
    }

    #[tokio::test]
    async fn test_current_note_path_requires_existing_note() {
        let store = Arc::new(MemoryStore::new());
        let notes = PeriodicNotes::with_clock(&settings_with("Daily"), store.clone(), fixed_day);

        assert_eq!(notes.current_note_path(Period::Daily).await.unwrap(), None);
        store.insert("Daily/2024-05-14.md", "# Today\n").await;
        assert_eq!(
            notes.current_note_path(Period::Daily).await.unwrap(),
            Some("Daily/2024-05-14.md".to_string())
        );
    }

    #[tokio::test]
    async fn test_disabled_period() {
        let store = Arc::new(MemoryStore::new());
        let notes = PeriodicNotes::with_clock(&default_periodic_settings(), store, fixed_day);
        assert!(notes.is_enabled(Period::Daily));
        assert!(!notes.is_enabled(Period::Yearly));
        assert_eq!(notes.current_note_path(Period::Yearly).await.unwrap(), None);
        assert!(notes.create(Period::Yearly).await.is_err());
        assert!(notes.settings(Period::Yearly).is_some());
    }

    #[tokio::test]
    async fn test_create_uses_template() {
        let store = Arc::new(MemoryStore::new());
        store.insert("Templates/daily.md", "## Log\n").await;
        let mut settings = settings_with("Daily");
        settings.get_mut(&Period::Daily).unwrap().template = Some("Templates/daily.md".into());
        let notes = PeriodicNotes::with_clock(&settings, store.clone(), fixed_day);

        let path = notes.create(Period::Daily).await.unwrap();
        assert_eq!(path, "Daily/2024-05-14.md");
        assert_eq!(store.content(&path).await.as_deref(), Some("## Log\n"));
        // Second call leaves the existing note alone
        store.insert(&path, "edited").await;
        notes.create(Period::Daily).await.unwrap();
        assert_eq!(store.content(&path).await.as_deref(), Some("edited"));
    }

    #[tokio::test]
    async fn test_all_notes_in_folder() {
        let store = Arc::new(MemoryStore::new());
        store.insert("Daily/2024-05-13.md", "").await;
        store.insert("Daily/2024-05-14.md", "").await;
        store.insert("Daily/sub/other.md", "").await;
        store.insert("inbox.md", "").await;
        let notes = PeriodicNotes::with_clock(&settings_with("Daily"), store, fixed_day);
        assert_eq!(
            notes.all_notes(Period::Daily).await.unwrap(),
            vec!["Daily/2024-05-13.md".to_string(), "Daily/2024-05-14.md".to_string()]
        );
    }

    #[tokio::test]
    async fn test_granularities_sharing_a_folder() {
        let store = Arc::new(MemoryStore::new());
        for path in [
            "2024-05-13.md",
            "2024-W20.md",
            "2024-05.md",
            "2024-Q2.md",
            "2024.md",
            "inbox.md",
            "shopping list.md",
        ] {
            store.insert(path, "").await;
        }
        let notes = PeriodicNotes::with_clock(&settings_with(""), store, fixed_day);

        let expect = [
            (Period::Daily, "2024-05-13.md"),
            (Period::Weekly, "2024-W20.md"),
            (Period::Monthly, "2024-05.md"),
            (Period::Quarterly, "2024-Q2.md"),
            (Period::Yearly, "2024.md"),
        ];
        for (period, path) in expect {
            assert_eq!(
                notes.all_notes(period).await.unwrap(),
                vec![path.to_string()],
                "{}",
                period
            );
        }
    }
}
