use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credited contribution kinds carried by the legacy export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Vocalist,
    Arranger,
    Lyricist,
}

impl Role {
    pub fn code(&self) -> &'static str {
        match self {
            Role::Vocalist => "vocalist",
            Role::Arranger => "arranger",
            Role::Lyricist => "lyricist",
        }
    }
}

/// Host vs co-host marker on a release jointly produced by several circles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Participation {
    Host,
    CoHost,
}

impl Participation {
    pub fn code(&self) -> &'static str {
        match self {
            Participation::Host => "host",
            Participation::CoHost => "co-host",
        }
    }
}

/// A recurring event franchise ("コミックマーケット", "博麗神社例大祭", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSeries {
    pub id: String,
    pub name: String,
}

/// A concrete event occurrence a release debuted at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub series_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(id: String, name: &str, series_id: Option<String>) -> Self {
        Self {
            id,
            name: name.to_string(),
            series_id,
            created_at: Utc::now(),
        }
    }
}

/// A fan-production group credited on a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub id: String,
    pub name: String,
    pub initial: String,
    pub created_at: DateTime<Utc>,
}

impl Circle {
    pub fn new(id: String, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            initial: script_initial(name),
            created_at: Utc::now(),
        }
    }
}

/// An individual credited on a track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub initial: String,
    pub created_at: DateTime<Utc>,
}

impl Artist {
    pub fn new(id: String, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            initial: script_initial(name),
            created_at: Utc::now(),
        }
    }
}

/// An album / single / collection released by one or more circles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub name: String,
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Release {
    pub fn new(id: String, name: &str, event_id: Option<String>) -> Self {
        Self {
            id,
            name: name.to_string(),
            event_id,
            created_at: Utc::now(),
        }
    }
}

/// Link row between a release and a participating circle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseCircle {
    pub release_id: String,
    pub circle_id: String,
    pub participation: Participation,
    pub position: usize,
}

/// One track on a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub release_id: String,
    pub track_number: i32,
    pub name: String,
}

/// An artist's named contribution to a track. The display name is kept
/// verbatim because it can differ from the artist's canonical name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    pub id: String,
    pub track_id: String,
    pub artist_id: String,
    pub credit_name: String,
    pub credit_position: usize,
}

/// Role tag on a credit; one credit can carry several.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRole {
    pub credit_id: String,
    pub role: Role,
    pub role_position: usize,
}

/// Link row between a track and the official song it arranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackOfficialSong {
    pub id: String,
    pub track_id: String,
    pub song_id: String,
    pub part_position: usize,
    pub custom_song_name: Option<String>,
}

/// A canonical source-material song record. Read-only to the importer;
/// the catalog is seeded with these out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficialSong {
    pub id: String,
    pub name: String,
    pub name_ja: Option<String>,
    pub official_work_name: Option<String>,
    pub is_original: bool,
}

/// Script-classification initial used for catalog sorting of circles and
/// artists: ASCII letters map to their uppercase letter, digits to "#",
/// kana to the head kana of their gojūon row, everything else to "他".
pub fn script_initial(name: &str) -> String {
    let first = match name.trim().chars().next() {
        Some(c) => c,
        None => return "他".to_string(),
    };
    if first.is_ascii_alphabetic() {
        return first.to_ascii_uppercase().to_string();
    }
    if first.is_ascii_digit() {
        return "#".to_string();
    }
    // Fold katakana onto the hiragana block so both scripts classify alike.
    let folded = match first {
        'ァ'..='ヶ' => char::from_u32(first as u32 - 0x60).unwrap_or(first),
        _ => first,
    };
    let initial = match folded {
        'ぁ'..='お' => "あ",
        'か'..='ご' => "か",
        'さ'..='ぞ' => "さ",
        'た'..='ど' => "た",
        'な'..='の' => "な",
        'は'..='ぽ' => "は",
        'ま'..='も' => "ま",
        'ゃ'..='よ' => "や",
        'ら'..='ろ' => "ら",
        'ゎ'..='ん' => "わ",
        _ => "他",
    };
    initial.to_string()
}
