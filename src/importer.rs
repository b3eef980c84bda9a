//! Dependency-ordered reconciliation of parsed legacy records against the
//! catalog.
//!
//! Each record resolves its entities strictly in order (event, circles,
//! artists, release, track, credits, official-song links) because later
//! steps need the identifiers the earlier ones produced. Within one run a
//! memo cache guarantees at most one existence check and one insert per
//! logical name; everything runs inside a single store transaction, and a
//! failing record is recorded and skipped rather than aborting the batch.

use crate::config::ImporterConfig;
use crate::domain::{
    Artist, Circle, Credit, CreditRole, Event, Participation, Release, ReleaseCircle, Role, Track,
    TrackOfficialSong,
};
use crate::error::Result;
use crate::idgen::{EntityKind, IdGenerator};
use crate::parser::{split_circles, LegacyRecord};
use crate::storage::CatalogStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Created/updated/skipped tally for one entity category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCount {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// One tally per entity category; all categories are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub events: EntityCount,
    pub circles: EntityCount,
    pub artists: EntityCount,
    pub releases: EntityCount,
    pub tracks: EntityCount,
    pub credits: EntityCount,
    pub official_song_links: EntityCount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportError {
    pub row: usize,
    pub entity: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub counts: ImportCounts,
    pub errors: Vec<ImportError>,
}

/// Identity memo for one import run. Once a key lands here no further
/// existence check or insert is issued for it; the cache is the single
/// source of truth for "already resolved in this run".
#[derive(Default)]
struct ImportCache {
    /// event name -> event id
    events: HashMap<String, String>,
    /// circle name -> circle id
    circles: HashMap<String, String>,
    /// artist name -> artist id
    artists: HashMap<String, String>,
    /// "{primary_circle}:{album}" -> release id
    releases: HashMap<String, String>,
    /// "{release_id}:{track_number}" -> track id
    tracks: HashMap<String, String>,
}

static SERIES_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(第[0-9０-９]+回|[0-9０-９]+)\s*$").unwrap());

/// Base name of an event once its trailing occurrence marker (arabic or
/// fullwidth numerals, or a 第N回 group) is stripped. Heuristic; an event
/// sharing a numeric suffix with an unrelated series can mis-attach.
pub fn series_base(event_name: &str) -> String {
    SERIES_SUFFIX.replace(event_name, "").trim().to_string()
}

pub struct ImportOrchestrator {
    store: Arc<dyn CatalogStore>,
    ids: Arc<dyn IdGenerator>,
    config: ImporterConfig,
}

impl ImportOrchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        ids: Arc<dyn IdGenerator>,
        config: ImporterConfig,
    ) -> Self {
        Self { store, ids, config }
    }

    /// Run one import batch. Always returns a result object; row-level
    /// failures land in `errors` with the 1-based, header-adjusted row
    /// number, a transaction failure as a single row-0 error.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn execute_import(
        &self,
        records: &[LegacyRecord],
        song_mappings: &HashMap<String, String>,
        custom_song_names: &HashMap<String, String>,
    ) -> ImportResult {
        let mut counts = ImportCounts::default();
        let mut errors = Vec::new();
        let mut cache = ImportCache::default();

        if let Err(e) = self.store.begin().await {
            error!("Failed to open import transaction: {}", e);
            return ImportResult {
                success: false,
                counts,
                errors: vec![ImportError {
                    row: 0,
                    entity: "transaction".to_string(),
                    message: e.to_string(),
                }],
            };
        }

        for (index, record) in records.iter().enumerate() {
            if let Err(e) = self
                .process_record(record, &mut cache, &mut counts, song_mappings, custom_song_names)
                .await
            {
                let row = index + 2;
                warn!(row, "record failed, continuing with next: {}", e);
                errors.push(ImportError {
                    row,
                    entity: "record".to_string(),
                    message: e.to_string(),
                });
            }
        }

        if let Err(e) = self.store.commit().await {
            error!("Import transaction failed to commit: {}", e);
            if let Err(rollback_err) = self.store.rollback().await {
                warn!("Rollback after failed commit also failed: {}", rollback_err);
            }
            errors.push(ImportError {
                row: 0,
                entity: "transaction".to_string(),
                message: e.to_string(),
            });
        }

        let success = errors.is_empty();
        info!(success, "import finished");
        ImportResult {
            success,
            counts,
            errors,
        }
    }

    async fn process_record(
        &self,
        record: &LegacyRecord,
        cache: &mut ImportCache,
        counts: &mut ImportCounts,
        song_mappings: &HashMap<String, String>,
        custom_song_names: &HashMap<String, String>,
    ) -> Result<()> {
        let event_id = self.resolve_event(record, cache, counts).await?;

        let circle_names = split_circles(&record.circle);
        for name in &circle_names {
            self.resolve_circle(name, cache, counts).await?;
        }

        for name in credited_artist_names(record) {
            self.resolve_artist(&name, cache, counts).await?;
        }

        let release_id = self
            .resolve_release(record, &circle_names, event_id.as_deref(), cache, counts)
            .await?;

        let track_id = self.resolve_track(record, &release_id, cache, counts).await?;

        self.apply_credits(record, &track_id, cache, counts).await?;

        self.link_official_songs(record, &track_id, song_mappings, custom_song_names, counts)
            .await?;

        Ok(())
    }

    async fn resolve_event(
        &self,
        record: &LegacyRecord,
        cache: &mut ImportCache,
        counts: &mut ImportCounts,
    ) -> Result<Option<String>> {
        let name = record.event.trim();
        if name.is_empty() {
            return Ok(None);
        }

        if let Some(id) = cache.events.get(name) {
            counts.events.skipped += 1;
            return Ok(Some(id.clone()));
        }

        if let Some(existing) = self.store.get_event_by_name(name).await? {
            cache.events.insert(name.to_string(), existing.id.clone());
            counts.events.skipped += 1;
            return Ok(Some(existing.id));
        }

        let series_id = self.find_parent_series(name).await?;
        let event = Event::new(self.ids.generate(EntityKind::Event), name, series_id);
        self.store.create_event(&event).await?;
        info!("Created new event: {} ({})", event.name, event.id);
        cache.events.insert(name.to_string(), event.id.clone());
        counts.events.created += 1;
        Ok(Some(event.id))
    }

    /// Attach a new event to an event series when one plausibly exists.
    async fn find_parent_series(&self, event_name: &str) -> Result<Option<String>> {
        let base = series_base(event_name);
        if base.is_empty() {
            return Ok(None);
        }
        let series = self.store.find_series_containing(&base).await?;
        if let Some(series) = &series {
            debug!(
                "Attached event '{}' to series '{}' ({})",
                event_name, series.name, series.id
            );
        }
        Ok(series.map(|s| s.id))
    }

    async fn resolve_circle(
        &self,
        name: &str,
        cache: &mut ImportCache,
        counts: &mut ImportCounts,
    ) -> Result<String> {
        if let Some(id) = cache.circles.get(name) {
            counts.circles.skipped += 1;
            return Ok(id.clone());
        }

        if let Some(existing) = self.store.get_circle_by_name(name).await? {
            cache.circles.insert(name.to_string(), existing.id.clone());
            counts.circles.skipped += 1;
            return Ok(existing.id);
        }

        let circle = Circle::new(self.ids.generate(EntityKind::Circle), name);
        self.store.create_circle(&circle).await?;
        info!("Created new circle: {} ({})", circle.name, circle.id);
        cache.circles.insert(name.to_string(), circle.id.clone());
        counts.circles.created += 1;
        Ok(circle.id)
    }

    async fn resolve_artist(
        &self,
        name: &str,
        cache: &mut ImportCache,
        counts: &mut ImportCounts,
    ) -> Result<String> {
        if let Some(id) = cache.artists.get(name) {
            counts.artists.skipped += 1;
            return Ok(id.clone());
        }

        if let Some(existing) = self.store.get_artist_by_name(name).await? {
            cache.artists.insert(name.to_string(), existing.id.clone());
            counts.artists.skipped += 1;
            return Ok(existing.id);
        }

        let artist = Artist::new(self.ids.generate(EntityKind::Artist), name);
        self.store.create_artist(&artist).await?;
        info!("Created new artist: {} ({})", artist.name, artist.id);
        cache.artists.insert(name.to_string(), artist.id.clone());
        counts.artists.created += 1;
        Ok(artist.id)
    }

    async fn resolve_release(
        &self,
        record: &LegacyRecord,
        circle_names: &[String],
        event_id: Option<&str>,
        cache: &mut ImportCache,
        counts: &mut ImportCounts,
    ) -> Result<String> {
        let primary = circle_names.first().map(String::as_str).unwrap_or("");
        let release_key = format!("{}:{}", primary, record.album);

        if let Some(id) = cache.releases.get(&release_key) {
            counts.releases.skipped += 1;
            return Ok(id.clone());
        }

        // Rows without a circle cell still have to find their release on
        // re-import; those releases carry no circle links, so the lookup
        // falls back to the album name alone.
        let primary_id = cache.circles.get(primary).map(String::as_str);
        if let Some(existing) = self
            .store
            .find_release_by_name_and_circle(&record.album, primary_id)
            .await?
        {
            cache.releases.insert(release_key, existing.id.clone());
            counts.releases.skipped += 1;
            return Ok(existing.id);
        }

        let release = Release::new(
            self.ids.generate(EntityKind::Release),
            &record.album,
            event_id.map(str::to_string),
        );
        self.store.create_release(&release).await?;
        for (index, name) in circle_names.iter().enumerate() {
            let Some(circle_id) = cache.circles.get(name) else {
                continue;
            };
            let participation = if index == 0 {
                Participation::Host
            } else {
                Participation::CoHost
            };
            self.store
                .create_release_circle(&ReleaseCircle {
                    release_id: release.id.clone(),
                    circle_id: circle_id.clone(),
                    participation,
                    position: index + 1,
                })
                .await?;
        }
        info!("Created new release: {} ({})", release.name, release.id);
        cache.releases.insert(release_key, release.id.clone());
        counts.releases.created += 1;
        Ok(release.id)
    }

    async fn resolve_track(
        &self,
        record: &LegacyRecord,
        release_id: &str,
        cache: &mut ImportCache,
        counts: &mut ImportCounts,
    ) -> Result<String> {
        let track_key = format!("{}:{}", release_id, record.track_number);

        if let Some(id) = cache.tracks.get(&track_key) {
            counts.tracks.skipped += 1;
            return Ok(id.clone());
        }

        let existing_tracks = self
            .store
            .list_tracks_by_release(release_id, self.config.track_fetch_limit)
            .await?;
        if let Some(existing) = existing_tracks
            .iter()
            .find(|t| t.track_number == record.track_number)
        {
            if existing.name != record.title {
                self.store
                    .update_track_name(&existing.id, &record.title)
                    .await?;
                info!(
                    "Updated track {} name to '{}' ({})",
                    record.track_number, record.title, existing.id
                );
                counts.tracks.updated += 1;
            } else {
                counts.tracks.skipped += 1;
            }
            cache.tracks.insert(track_key, existing.id.clone());
            return Ok(existing.id.clone());
        }

        let track = Track {
            id: self.ids.generate(EntityKind::Track),
            release_id: release_id.to_string(),
            track_number: record.track_number,
            name: record.title.clone(),
        };
        self.store.create_track(&track).await?;
        info!("Created new track: {} ({})", track.name, track.id);
        cache.tracks.insert(track_key, track.id.clone());
        counts.tracks.created += 1;
        Ok(track.id)
    }

    async fn apply_credits(
        &self,
        record: &LegacyRecord,
        track_id: &str,
        cache: &mut ImportCache,
        counts: &mut ImportCounts,
    ) -> Result<()> {
        let role_lists: [(Role, &Vec<String>); 3] = [
            (Role::Vocalist, &record.vocalists),
            (Role::Arranger, &record.arrangers),
            (Role::Lyricist, &record.lyricists),
        ];

        for (role, names) in role_lists {
            for (index, name) in names.iter().enumerate() {
                let position = index + 1;
                let Some(artist_id) = cache.artists.get(name) else {
                    // Should not happen: every credited name was resolved
                    // in the artist step of this same record.
                    debug!("No resolved artist for credit name '{}'", name);
                    continue;
                };

                let credit_id = match self.store.find_credit(track_id, artist_id, name).await? {
                    Some(existing) => {
                        counts.credits.skipped += 1;
                        existing.id
                    }
                    None => {
                        let credit = Credit {
                            id: self.ids.generate(EntityKind::Credit),
                            track_id: track_id.to_string(),
                            artist_id: artist_id.clone(),
                            credit_name: name.clone(),
                            credit_position: position,
                        };
                        self.store.create_credit(&credit).await?;
                        counts.credits.created += 1;
                        credit.id
                    }
                };

                // The same artist+name pair can legitimately carry several
                // roles; each role row is added once.
                if !self.store.credit_role_exists(&credit_id, role).await? {
                    self.store
                        .create_credit_role(&CreditRole {
                            credit_id,
                            role,
                            role_position: position,
                        })
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn link_official_songs(
        &self,
        record: &LegacyRecord,
        track_id: &str,
        song_mappings: &HashMap<String, String>,
        custom_song_names: &HashMap<String, String>,
        counts: &mut ImportCounts,
    ) -> Result<()> {
        for (index, name) in record.original_songs.iter().enumerate() {
            let Some(song_id) = song_mappings.get(name) else {
                // An unmapped reference is never silently linked.
                warn!("No confirmed mapping for original song '{}', skipping", name);
                counts.official_song_links.skipped += 1;
                continue;
            };

            if self.store.song_link_exists(track_id, song_id).await? {
                counts.official_song_links.skipped += 1;
                continue;
            }

            self.store
                .create_song_link(&TrackOfficialSong {
                    id: self.ids.generate(EntityKind::SongLink),
                    track_id: track_id.to_string(),
                    song_id: song_id.clone(),
                    part_position: index + 1,
                    custom_song_name: custom_song_names.get(name).cloned(),
                })
                .await?;
            counts.official_song_links.created += 1;
        }
        Ok(())
    }
}

/// Distinct credited names across the three role lists, in first-seen order.
fn credited_artist_names(record: &LegacyRecord) -> Vec<String> {
    let mut names = Vec::new();
    for name in record
        .vocalists
        .iter()
        .chain(record.arrangers.iter())
        .chain(record.lyricists.iter())
    {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}
