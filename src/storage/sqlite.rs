//! SQLite-backed catalog store.

use crate::domain::{
    Artist, Circle, Credit, CreditRole, Event, EventSeries, OfficialSong, Release, ReleaseCircle,
    Role, Track, TrackOfficialSong,
};
use crate::error::Result;
use crate::matcher::{MatchType, SongCandidate, SongSearch};
use crate::storage::CatalogStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS event_series (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    series_id TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS circles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    initial TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS artists (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    initial TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS releases (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    event_id TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS release_circles (
    release_id TEXT NOT NULL,
    circle_id TEXT NOT NULL,
    participation TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS tracks (
    id TEXT PRIMARY KEY,
    release_id TEXT NOT NULL,
    track_number INTEGER NOT NULL,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS credits (
    id TEXT PRIMARY KEY,
    track_id TEXT NOT NULL,
    artist_id TEXT NOT NULL,
    credit_name TEXT NOT NULL,
    credit_position INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS credit_roles (
    credit_id TEXT NOT NULL,
    role TEXT NOT NULL,
    role_position INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS track_official_songs (
    id TEXT PRIMARY KEY,
    track_id TEXT NOT NULL,
    song_id TEXT NOT NULL,
    part_position INTEGER NOT NULL,
    custom_song_name TEXT
);
CREATE TABLE IF NOT EXISTS official_songs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    name_ja TEXT,
    official_work_name TEXT,
    is_original INTEGER NOT NULL DEFAULT 0
);
";

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Seed an event-series row (the importer itself never creates one).
    pub fn seed_event_series(&self, series: &EventSeries) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO event_series (id, name) VALUES (?1, ?2)",
            params![series.id, series.name],
        )?;
        Ok(())
    }

    /// Seed an official-song row (read-only to the importer).
    pub fn seed_official_song(&self, song: &OfficialSong) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO official_songs (id, name, name_ja, official_work_name, is_original)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                song.id,
                song.name,
                song.name_ja,
                song.official_work_name,
                song.is_original
            ],
        )?;
        Ok(())
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        series_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn release_from_row(row: &Row<'_>) -> rusqlite::Result<Release> {
    Ok(Release {
        id: row.get(0)?,
        name: row.get(1)?,
        event_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        release_id: row.get(1)?,
        track_number: row.get(2)?,
        name: row.get(3)?,
    })
}

fn candidate_from_row(row: &Row<'_>, match_type: MatchType) -> rusqlite::Result<SongCandidate> {
    Ok(SongCandidate {
        id: row.get(0)?,
        name: row.get(1)?,
        name_ja: row.get(2)?,
        official_work_name: row.get(3)?,
        match_type,
    })
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn begin(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("BEGIN")?;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    async fn get_event_by_name(&self, name: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        let event = conn
            .query_row(
                "SELECT id, name, series_id, created_at FROM events WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name],
                event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    async fn find_series_containing(&self, fragment: &str) -> Result<Option<EventSeries>> {
        let conn = self.conn.lock().unwrap();
        let series = conn
            .query_row(
                "SELECT id, name FROM event_series WHERE instr(name, ?1) > 0 ORDER BY id LIMIT 1",
                params![fragment],
                |row| {
                    Ok(EventSeries {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(series)
    }

    async fn create_event(&self, event: &Event) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (id, name, series_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![event.id, event.name, event.series_id, event.created_at],
        )?;
        debug!("Created event: {} with id {}", event.name, event.id);
        Ok(())
    }

    async fn get_circle_by_name(&self, name: &str) -> Result<Option<Circle>> {
        let conn = self.conn.lock().unwrap();
        let circle = conn
            .query_row(
                "SELECT id, name, initial, created_at FROM circles WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name],
                |row| {
                    Ok(Circle {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        initial: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(circle)
    }

    async fn create_circle(&self, circle: &Circle) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO circles (id, name, initial, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![circle.id, circle.name, circle.initial, circle.created_at],
        )?;
        debug!("Created circle: {} with id {}", circle.name, circle.id);
        Ok(())
    }

    async fn get_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let conn = self.conn.lock().unwrap();
        let artist = conn
            .query_row(
                "SELECT id, name, initial, created_at FROM artists WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name],
                |row| {
                    Ok(Artist {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        initial: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(artist)
    }

    async fn create_artist(&self, artist: &Artist) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO artists (id, name, initial, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![artist.id, artist.name, artist.initial, artist.created_at],
        )?;
        debug!("Created artist: {} with id {}", artist.name, artist.id);
        Ok(())
    }

    async fn find_release_by_name_and_circle(
        &self,
        name: &str,
        circle_id: Option<&str>,
    ) -> Result<Option<Release>> {
        let conn = self.conn.lock().unwrap();
        let release = match circle_id {
            Some(circle_id) => conn
                .query_row(
                    "SELECT r.id, r.name, r.event_id, r.created_at
                     FROM releases r
                     JOIN release_circles rc ON rc.release_id = r.id
                     WHERE r.name = ?1 AND rc.circle_id = ?2
                     ORDER BY r.id LIMIT 1",
                    params![name, circle_id],
                    release_from_row,
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT id, name, event_id, created_at
                     FROM releases
                     WHERE name = ?1
                     ORDER BY id LIMIT 1",
                    params![name],
                    release_from_row,
                )
                .optional()?,
        };
        Ok(release)
    }

    async fn create_release(&self, release: &Release) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO releases (id, name, event_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![release.id, release.name, release.event_id, release.created_at],
        )?;
        debug!("Created release: {} with id {}", release.name, release.id);
        Ok(())
    }

    async fn create_release_circle(&self, link: &ReleaseCircle) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO release_circles (release_id, circle_id, participation, position)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                link.release_id,
                link.circle_id,
                link.participation.code(),
                link.position
            ],
        )?;
        Ok(())
    }

    async fn list_tracks_by_release(&self, release_id: &str, limit: usize) -> Result<Vec<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, release_id, track_number, name FROM tracks
             WHERE release_id = ?1 ORDER BY track_number LIMIT ?2",
        )?;
        let tracks = stmt
            .query_map(params![release_id, limit], track_from_row)?
            .collect::<rusqlite::Result<Vec<Track>>>()?;
        Ok(tracks)
    }

    async fn create_track(&self, track: &Track) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracks (id, release_id, track_number, name) VALUES (?1, ?2, ?3, ?4)",
            params![track.id, track.release_id, track.track_number, track.name],
        )?;
        debug!("Created track: {} with id {}", track.name, track.id);
        Ok(())
    }

    async fn update_track_name(&self, track_id: &str, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tracks SET name = ?1 WHERE id = ?2",
            params![name, track_id],
        )?;
        debug!("Updated track {} name to {}", track_id, name);
        Ok(())
    }

    async fn find_credit(
        &self,
        track_id: &str,
        artist_id: &str,
        credit_name: &str,
    ) -> Result<Option<Credit>> {
        let conn = self.conn.lock().unwrap();
        let credit = conn
            .query_row(
                "SELECT id, track_id, artist_id, credit_name, credit_position FROM credits
                 WHERE track_id = ?1 AND artist_id = ?2 AND credit_name = ?3
                 ORDER BY id LIMIT 1",
                params![track_id, artist_id, credit_name],
                |row| {
                    Ok(Credit {
                        id: row.get(0)?,
                        track_id: row.get(1)?,
                        artist_id: row.get(2)?,
                        credit_name: row.get(3)?,
                        credit_position: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(credit)
    }

    async fn create_credit(&self, credit: &Credit) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO credits (id, track_id, artist_id, credit_name, credit_position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                credit.id,
                credit.track_id,
                credit.artist_id,
                credit.credit_name,
                credit.credit_position
            ],
        )?;
        Ok(())
    }

    async fn credit_role_exists(&self, credit_id: &str, role: Role) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM credit_roles WHERE credit_id = ?1 AND role = ?2 LIMIT 1",
                params![credit_id, role.code()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn create_credit_role(&self, role: &CreditRole) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO credit_roles (credit_id, role, role_position) VALUES (?1, ?2, ?3)",
            params![role.credit_id, role.role.code(), role.role_position],
        )?;
        Ok(())
    }

    async fn song_link_exists(&self, track_id: &str, song_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM track_official_songs WHERE track_id = ?1 AND song_id = ?2 LIMIT 1",
                params![track_id, song_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn create_song_link(&self, link: &TrackOfficialSong) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO track_official_songs (id, track_id, song_id, part_position, custom_song_name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                link.id,
                link.track_id,
                link.song_id,
                link.part_position,
                link.custom_song_name
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl SongSearch for SqliteCatalog {
    async fn search_exact(&self, name: &str) -> Result<Vec<SongCandidate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, name_ja, official_work_name FROM official_songs
             WHERE name = ?1 COLLATE NOCASE OR name_ja = ?1 COLLATE NOCASE ORDER BY id",
        )?;
        let hits = stmt
            .query_map(params![name], |row| candidate_from_row(row, MatchType::Exact))?
            .collect::<rusqlite::Result<Vec<SongCandidate>>>()?;
        Ok(hits)
    }

    async fn search_partial(&self, name: &str, limit: usize) -> Result<Vec<SongCandidate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, name_ja, official_work_name FROM official_songs
             WHERE instr(name, ?1) > 0 OR instr(coalesce(name_ja, ''), ?1) > 0
             ORDER BY id LIMIT ?2",
        )?;
        let hits = stmt
            .query_map(params![name, limit], |row| {
                candidate_from_row(row, MatchType::Partial)
            })?
            .collect::<rusqlite::Result<Vec<SongCandidate>>>()?;
        Ok(hits)
    }

    async fn find_canonical_original(&self) -> Result<Option<SongCandidate>> {
        let conn = self.conn.lock().unwrap();
        let hit = conn
            .query_row(
                "SELECT id, name, name_ja, official_work_name FROM official_songs
                 WHERE is_original = 1 ORDER BY id LIMIT 1",
                [],
                |row| candidate_from_row(row, MatchType::Exact),
            )
            .optional()?;
        Ok(hit)
    }
}
