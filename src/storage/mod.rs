//! Catalog persistence ports and the in-memory implementation used by
//! development and tests.

pub mod sqlite;

use crate::domain::{
    Artist, Circle, Credit, CreditRole, Event, EventSeries, OfficialSong, Release, ReleaseCircle,
    Role, Track, TrackOfficialSong,
};
use crate::error::Result;
use crate::matcher::{MatchType, SongCandidate, SongSearch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Transactional write port for the relational catalog: point lookups by
/// natural key, bounded child listing, inserts, one targeted update, and
/// a transaction scope wrapping a whole import run.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Transaction scope
    async fn begin(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;

    // Event operations
    async fn get_event_by_name(&self, name: &str) -> Result<Option<Event>>;
    async fn find_series_containing(&self, fragment: &str) -> Result<Option<EventSeries>>;
    async fn create_event(&self, event: &Event) -> Result<()>;

    // Circle operations
    async fn get_circle_by_name(&self, name: &str) -> Result<Option<Circle>>;
    async fn create_circle(&self, circle: &Circle) -> Result<()>;

    // Artist operations
    async fn get_artist_by_name(&self, name: &str) -> Result<Option<Artist>>;
    async fn create_artist(&self, artist: &Artist) -> Result<()>;

    // Release operations
    /// Find a release by album name. With a circle id the match is
    /// restricted to releases linked to that circle; without one it is a
    /// plain name lookup (circle-less legacy rows have no link to filter
    /// on).
    async fn find_release_by_name_and_circle(
        &self,
        name: &str,
        circle_id: Option<&str>,
    ) -> Result<Option<Release>>;
    async fn create_release(&self, release: &Release) -> Result<()>;
    async fn create_release_circle(&self, link: &ReleaseCircle) -> Result<()>;

    // Track operations
    async fn list_tracks_by_release(&self, release_id: &str, limit: usize) -> Result<Vec<Track>>;
    async fn create_track(&self, track: &Track) -> Result<()>;
    async fn update_track_name(&self, track_id: &str, name: &str) -> Result<()>;

    // Credit operations
    async fn find_credit(
        &self,
        track_id: &str,
        artist_id: &str,
        credit_name: &str,
    ) -> Result<Option<Credit>>;
    async fn create_credit(&self, credit: &Credit) -> Result<()>;
    async fn credit_role_exists(&self, credit_id: &str, role: Role) -> Result<bool>;
    async fn create_credit_role(&self, role: &CreditRole) -> Result<()>;

    // Official-song link operations
    async fn song_link_exists(&self, track_id: &str, song_id: &str) -> Result<bool>;
    async fn create_song_link(&self, link: &TrackOfficialSong) -> Result<()>;
}

/// In-memory catalog for development and testing.
#[derive(Default)]
pub struct InMemoryCatalog {
    event_series: Mutex<HashMap<String, EventSeries>>,
    events: Mutex<HashMap<String, Event>>,
    circles: Mutex<HashMap<String, Circle>>,
    artists: Mutex<HashMap<String, Artist>>,
    releases: Mutex<HashMap<String, Release>>,
    release_circles: Mutex<Vec<ReleaseCircle>>,
    tracks: Mutex<HashMap<String, Track>>,
    credits: Mutex<HashMap<String, Credit>>,
    credit_roles: Mutex<Vec<CreditRole>>,
    song_links: Mutex<Vec<TrackOfficialSong>>,
    official_songs: Mutex<HashMap<String, OfficialSong>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an event-series row (the importer itself never creates one).
    pub fn seed_event_series(&self, series: EventSeries) {
        self.event_series
            .lock()
            .unwrap()
            .insert(series.id.clone(), series);
    }

    /// Seed an official-song row (read-only to the importer).
    pub fn seed_official_song(&self, song: OfficialSong) {
        self.official_songs
            .lock()
            .unwrap()
            .insert(song.id.clone(), song);
    }

    /// Circle links of a release, ordered by position. Test inspection aid.
    pub fn release_circle_links(&self, release_id: &str) -> Vec<ReleaseCircle> {
        let mut links: Vec<ReleaseCircle> = self
            .release_circles
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.release_id == release_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.position);
        links
    }

    /// Official-song links of a track, ordered by part position.
    pub fn track_song_links(&self, track_id: &str) -> Vec<TrackOfficialSong> {
        let mut links: Vec<TrackOfficialSong> = self
            .song_links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.track_id == track_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.part_position);
        links
    }

    /// Role rows of a credit, ordered by role position.
    pub fn credit_role_rows(&self, credit_id: &str) -> Vec<CreditRole> {
        let mut roles: Vec<CreditRole> = self
            .credit_roles
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.credit_id == credit_id)
            .cloned()
            .collect();
        roles.sort_by_key(|r| r.role_position);
        roles
    }

    pub fn get_event(&self, event_id: &str) -> Option<Event> {
        self.events.lock().unwrap().get(event_id).cloned()
    }

    pub fn get_release(&self, release_id: &str) -> Option<Release> {
        self.releases.lock().unwrap().get(release_id).cloned()
    }

    pub fn get_track(&self, track_id: &str) -> Option<Track> {
        self.tracks.lock().unwrap().get(track_id).cloned()
    }
}

fn song_candidate(song: &OfficialSong, match_type: MatchType) -> SongCandidate {
    SongCandidate {
        id: song.id.clone(),
        name: song.name.clone(),
        name_ja: song.name_ja.clone(),
        official_work_name: song.official_work_name.clone(),
        match_type,
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    async fn get_event_by_name(&self, name: &str) -> Result<Option<Event>> {
        let events = self.events.lock().unwrap();
        Ok(events.values().find(|e| e.name == name).cloned())
    }

    async fn find_series_containing(&self, fragment: &str) -> Result<Option<EventSeries>> {
        let series = self.event_series.lock().unwrap();
        let mut hits: Vec<&EventSeries> =
            series.values().filter(|s| s.name.contains(fragment)).collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits.first().map(|s| (*s).clone()))
    }

    async fn create_event(&self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .insert(event.id.clone(), event.clone());
        debug!("Created event: {} with id {}", event.name, event.id);
        Ok(())
    }

    async fn get_circle_by_name(&self, name: &str) -> Result<Option<Circle>> {
        let circles = self.circles.lock().unwrap();
        Ok(circles.values().find(|c| c.name == name).cloned())
    }

    async fn create_circle(&self, circle: &Circle) -> Result<()> {
        self.circles
            .lock()
            .unwrap()
            .insert(circle.id.clone(), circle.clone());
        debug!("Created circle: {} with id {}", circle.name, circle.id);
        Ok(())
    }

    async fn get_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let artists = self.artists.lock().unwrap();
        Ok(artists.values().find(|a| a.name == name).cloned())
    }

    async fn create_artist(&self, artist: &Artist) -> Result<()> {
        self.artists
            .lock()
            .unwrap()
            .insert(artist.id.clone(), artist.clone());
        debug!("Created artist: {} with id {}", artist.name, artist.id);
        Ok(())
    }

    async fn find_release_by_name_and_circle(
        &self,
        name: &str,
        circle_id: Option<&str>,
    ) -> Result<Option<Release>> {
        let releases = self.releases.lock().unwrap();
        let links = self.release_circles.lock().unwrap();
        let mut hits: Vec<&Release> = releases
            .values()
            .filter(|r| {
                r.name == name
                    && circle_id.map_or(true, |cid| {
                        links
                            .iter()
                            .any(|l| l.release_id == r.id && l.circle_id == cid)
                    })
            })
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits.first().map(|r| (*r).clone()))
    }

    async fn create_release(&self, release: &Release) -> Result<()> {
        self.releases
            .lock()
            .unwrap()
            .insert(release.id.clone(), release.clone());
        debug!("Created release: {} with id {}", release.name, release.id);
        Ok(())
    }

    async fn create_release_circle(&self, link: &ReleaseCircle) -> Result<()> {
        self.release_circles.lock().unwrap().push(link.clone());
        Ok(())
    }

    async fn list_tracks_by_release(&self, release_id: &str, limit: usize) -> Result<Vec<Track>> {
        let tracks = self.tracks.lock().unwrap();
        let mut found: Vec<Track> = tracks
            .values()
            .filter(|t| t.release_id == release_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.track_number);
        found.truncate(limit);
        Ok(found)
    }

    async fn create_track(&self, track: &Track) -> Result<()> {
        self.tracks
            .lock()
            .unwrap()
            .insert(track.id.clone(), track.clone());
        debug!("Created track: {} with id {}", track.name, track.id);
        Ok(())
    }

    async fn update_track_name(&self, track_id: &str, name: &str) -> Result<()> {
        let mut tracks = self.tracks.lock().unwrap();
        if let Some(track) = tracks.get_mut(track_id) {
            track.name = name.to_string();
            debug!("Updated track {} name to {}", track_id, name);
        }
        Ok(())
    }

    async fn find_credit(
        &self,
        track_id: &str,
        artist_id: &str,
        credit_name: &str,
    ) -> Result<Option<Credit>> {
        let credits = self.credits.lock().unwrap();
        Ok(credits
            .values()
            .find(|c| {
                c.track_id == track_id && c.artist_id == artist_id && c.credit_name == credit_name
            })
            .cloned())
    }

    async fn create_credit(&self, credit: &Credit) -> Result<()> {
        self.credits
            .lock()
            .unwrap()
            .insert(credit.id.clone(), credit.clone());
        debug!(
            "Created credit: {} on track {} with id {}",
            credit.credit_name, credit.track_id, credit.id
        );
        Ok(())
    }

    async fn credit_role_exists(&self, credit_id: &str, role: Role) -> Result<bool> {
        let roles = self.credit_roles.lock().unwrap();
        Ok(roles
            .iter()
            .any(|r| r.credit_id == credit_id && r.role == role))
    }

    async fn create_credit_role(&self, role: &CreditRole) -> Result<()> {
        self.credit_roles.lock().unwrap().push(role.clone());
        Ok(())
    }

    async fn song_link_exists(&self, track_id: &str, song_id: &str) -> Result<bool> {
        let links = self.song_links.lock().unwrap();
        Ok(links
            .iter()
            .any(|l| l.track_id == track_id && l.song_id == song_id))
    }

    async fn create_song_link(&self, link: &TrackOfficialSong) -> Result<()> {
        self.song_links.lock().unwrap().push(link.clone());
        Ok(())
    }
}

#[async_trait]
impl SongSearch for InMemoryCatalog {
    async fn search_exact(&self, name: &str) -> Result<Vec<SongCandidate>> {
        let songs = self.official_songs.lock().unwrap();
        let needle = name.to_lowercase();
        let mut hits: Vec<SongCandidate> = songs
            .values()
            .filter(|s| {
                s.name.to_lowercase() == needle
                    || s.name_ja.as_deref().map(str::to_lowercase) == Some(needle.clone())
            })
            .map(|s| song_candidate(s, MatchType::Exact))
            .collect();
        // Ascending by id keeps "first exact hit wins" deterministic.
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(hits)
    }

    async fn search_partial(&self, name: &str, limit: usize) -> Result<Vec<SongCandidate>> {
        let songs = self.official_songs.lock().unwrap();
        let needle = name.to_lowercase();
        let mut hits: Vec<SongCandidate> = songs
            .values()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.name_ja
                        .as_deref()
                        .map(|ja| ja.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .map(|s| song_candidate(s, MatchType::Partial))
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn find_canonical_original(&self) -> Result<Option<SongCandidate>> {
        let songs = self.official_songs.lock().unwrap();
        let mut originals: Vec<&OfficialSong> =
            songs.values().filter(|s| s.is_original).collect();
        originals.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(originals
            .first()
            .map(|s| song_candidate(s, MatchType::Exact)))
    }
}
