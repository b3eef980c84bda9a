/// Fixed identifier of the catch-all "other song" record. Unmatched
/// original-song references are linked here so they never block an import.
pub const OTHER_SONG_ID: &str = "song-other";

/// Literal cell value marking a track as an original composition rather
/// than an arrangement of an official song.
pub const ORIGINAL_KEYWORD: &str = "オリジナル";

/// Default number of candidates returned for a partial song match.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 10;

/// Default upper bound when listing the tracks of a single release.
pub const DEFAULT_TRACK_FETCH_LIMIT: usize = 200;

/// Columns the legacy export must carry for a file to be importable.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "circle",
    "album",
    "title",
    "track_number",
    "event",
    "vocalists",
    "arrangers",
    "lyricists",
    "original_songs",
];
