use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type AlbumId = u64;
pub type DeviceId = u64;
pub type MacroId = u64;
pub type ProductId = u64;
pub type StepId = u64;
pub type TimerId = u64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub year: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumSort {
    #[default]
    TitleAsc,
    ArtistAsc,
    YearAsc,
    YearDesc,
}

impl AlbumSort {
    pub fn apply(self, albums: &mut [Album]) {
        match self {
            AlbumSort::TitleAsc => albums.sort_by(|a, b| a.title.cmp(&b.title)),
            AlbumSort::ArtistAsc => {
                albums.sort_by(|a, b| a.artist.cmp(&b.artist).then(a.title.cmp(&b.title)))
            }
            AlbumSort::YearAsc => albums.sort_by_key(|a| a.year),
            AlbumSort::YearDesc => albums.sort_by(|a, b| b.year.cmp(&a.year)),
        }
    }
}

/// Library filter. An empty query and no genre keeps everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumFilter {
    pub genre: Option<String>,
    pub query: String,
}

impl AlbumFilter {
    pub fn matches(&self, album: &Album) -> bool {
        if let Some(genre) = &self.genre
            && !album.genre.eq_ignore_ascii_case(genre)
        {
            return false;
        }
        let q = self.query.trim().to_lowercase();
        q.is_empty()
            || album.title.to_lowercase().contains(&q)
            || album.artist.to_lowercase().contains(&q)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineType {
    Cnc,
    Laser,
    Printer,
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MachineType::Cnc => "cnc",
            MachineType::Laser => "laser",
            MachineType::Printer => "printer",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: MachineType,
    pub connected: bool,
}

/// A stored G-code snippet for one machine type. Lists are ordered by `position`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub id: MacroId,
    pub name: String,
    pub machine_type: MachineType,
    pub gcode: String,
    pub position: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMacro {
    pub name: String,
    pub machine_type: MachineType,
    pub gcode: String,
}

impl NewMacro {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("gcode", &self.gcode)
    }
}

impl Macro {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("gcode", &self.gcode)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStep {
    pub id: StepId,
    pub product_id: ProductId,
    pub name: String,
    pub position: u32,
    pub estimated_minutes: u32,
}

impl ProductionStep {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductionStep {
    pub product_id: ProductId,
    pub name: String,
    pub estimated_minutes: u32,
}

impl NewProductionStep {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)
    }
}

/// Identifier of a physical unit being produced (serial number).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time spent on one production step for one unit. Times are unix seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTimer {
    pub id: TimerId,
    pub unit_id: UnitId,
    pub step_id: StepId,
    pub started_at: u64,
    pub stopped_at: Option<u64>,
}

impl UnitTimer {
    pub fn is_active(&self) -> bool {
        self.stopped_at.is_none()
    }

    pub fn elapsed_secs(&self, now: u64) -> u64 {
        self.stopped_at.unwrap_or(now).saturating_sub(self.started_at)
    }
}

/// An active timer joined with its step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTimerDetails {
    pub timer: UnitTimer,
    /// `None` when the step no longer exists.
    pub step_name: Option<String>,
    pub estimated_minutes: Option<u32>,
    pub elapsed_secs: u64,
}

impl UnitTimerDetails {
    pub fn is_overdue(&self) -> bool {
        self.estimated_minutes
            .is_some_and(|m| self.elapsed_secs > u64::from(m) * 60)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub default_machine: Option<MachineType>,
    /// Minutes after which an active timer is flagged.
    pub timer_warning_minutes: u32,
    pub display_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            default_machine: None,
            timer_warning_minutes: 60,
            display_name: String::new(),
        }
    }
}

impl Settings {
    pub const MAX_WARNING_MINUTES: u32 = 24 * 60;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timer_warning_minutes == 0 || self.timer_warning_minutes > Self::MAX_WARNING_MINUTES {
            return Err(ValidationError::OutOfRange {
                field: "timer_warning_minutes",
                value: i64::from(self.timer_warning_minutes),
            });
        }
        if self.display_name.chars().count() > 64 {
            return Err(ValidationError::TooLong {
                field: "display_name",
                max: 64,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub expires_at: u64,
}

impl Session {
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(())
    }
}
