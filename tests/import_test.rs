use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::tempdir;

use tdc_importer::config::ImporterConfig;
use tdc_importer::constants::OTHER_SONG_ID;
use tdc_importer::domain::{
    Artist, Circle, Credit, CreditRole, Event, EventSeries, OfficialSong, Participation, Release,
    ReleaseCircle, Role, Track, TrackOfficialSong,
};
use tdc_importer::error::{ImporterError, Result as ImporterResult};
use tdc_importer::idgen::UuidIds;
use tdc_importer::importer::{ImportOrchestrator, ImportResult};
use tdc_importer::parser::{self, LegacyRecord};
use tdc_importer::storage::sqlite::SqliteCatalog;
use tdc_importer::storage::{CatalogStore, InMemoryCatalog};

const HEADER: &str =
    "circle,album,title,track_number,event,vocalists,arrangers,lyricists,original_songs";

fn parse_records(rows: &[&str]) -> Vec<LegacyRecord> {
    let csv = format!("{}\n{}\n", HEADER, rows.join("\n"));
    let outcome = parser::parse(&csv);
    assert!(outcome.success, "test CSV failed to parse: {:?}", outcome.errors);
    outcome.records
}

fn orchestrator(store: Arc<dyn CatalogStore>) -> ImportOrchestrator {
    ImportOrchestrator::new(store, Arc::new(UuidIds), ImporterConfig::default())
}

async fn run_import(
    store: Arc<dyn CatalogStore>,
    records: &[LegacyRecord],
    mappings: &HashMap<String, String>,
) -> ImportResult {
    orchestrator(store)
        .execute_import(records, mappings, &HashMap::new())
        .await
}

#[tokio::test]
async fn round_trip_import_is_idempotent() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.seed_official_song(OfficialSong {
        id: "song-1".to_string(),
        name: "原曲1".to_string(),
        name_ja: None,
        official_work_name: Some("東方紅魔郷".to_string()),
        is_original: false,
    });

    let records = parse_records(&[
        "サークルA,アルバム1,曲名1,1,コミケ100,ボーカルA:ボーカルB,,,原曲1",
    ]);
    let mappings = HashMap::from([("原曲1".to_string(), "song-1".to_string())]);

    let first = run_import(catalog.clone(), &records, &mappings).await;
    assert!(first.success, "first run errors: {:?}", first.errors);
    assert_eq!(first.counts.events.created, 1);
    assert_eq!(first.counts.circles.created, 1);
    assert_eq!(first.counts.artists.created, 2);
    assert_eq!(first.counts.releases.created, 1);
    assert_eq!(first.counts.tracks.created, 1);
    assert_eq!(first.counts.credits.created, 2);
    assert_eq!(first.counts.official_song_links.created, 1);

    let second = run_import(catalog.clone(), &records, &mappings).await;
    assert!(second.success);
    assert_eq!(second.counts.events.created, 0);
    assert_eq!(second.counts.events.skipped, 1);
    assert_eq!(second.counts.circles.skipped, 1);
    assert_eq!(second.counts.artists.skipped, 2);
    assert_eq!(second.counts.releases.skipped, 1);
    assert_eq!(second.counts.tracks.created, 0);
    assert_eq!(second.counts.tracks.skipped, 1);
    assert_eq!(second.counts.credits.created, 0);
    assert_eq!(second.counts.credits.skipped, 2);
    assert_eq!(second.counts.official_song_links.skipped, 1);
    Ok(())
}

#[tokio::test]
async fn memoization_holds_within_a_single_run() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let records = parse_records(&[
        "サークルA,アルバム1,曲名1,1,コミケ100,ボーカルA,,,",
        "サークルA,アルバム1,曲名2,2,コミケ100,ボーカルA,,,",
    ]);

    let result = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(result.success);
    // Second record resolves the same event/circle/artist/release from the
    // run cache; only the track differs.
    assert_eq!(result.counts.events.created, 1);
    assert_eq!(result.counts.events.skipped, 1);
    assert_eq!(result.counts.circles.created, 1);
    assert_eq!(result.counts.circles.skipped, 1);
    assert_eq!(result.counts.artists.created, 1);
    assert_eq!(result.counts.artists.skipped, 1);
    assert_eq!(result.counts.releases.created, 1);
    assert_eq!(result.counts.releases.skipped, 1);
    assert_eq!(result.counts.tracks.created, 2);
    Ok(())
}

#[tokio::test]
async fn circleless_record_reimport_reuses_the_release() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let records = parse_records(&[",アルバム1,曲名1,1,コミケ100,,,,"]);

    let first = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(first.success);
    assert_eq!(first.counts.circles.created, 0);
    assert_eq!(first.counts.releases.created, 1);

    let second = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(second.success);
    assert_eq!(second.counts.releases.created, 0);
    assert_eq!(second.counts.releases.skipped, 1);
    assert_eq!(second.counts.tracks.created, 0);
    assert_eq!(second.counts.tracks.skipped, 1);

    let release = catalog
        .find_release_by_name_and_circle("アルバム1", None)
        .await?
        .unwrap();
    let tracks = catalog.list_tracks_by_release(&release.id, 10).await?;
    assert_eq!(tracks.len(), 1);
    Ok(())
}

#[tokio::test]
async fn collaborating_circles_get_host_and_cohost_links() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let records = parse_records(&["サークルA×サークルB,合同アルバム,曲名,1,コミケ100,,,,"]);

    let result = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(result.success);
    assert_eq!(result.counts.circles.created, 2);
    assert_eq!(result.counts.releases.created, 1);

    let circle_a = catalog.get_circle_by_name("サークルA").await?.unwrap();
    let release = catalog
        .find_release_by_name_and_circle("合同アルバム", Some(circle_a.id.as_str()))
        .await?
        .unwrap();
    let links = catalog.release_circle_links(&release.id);
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].participation, Participation::Host);
    assert_eq!(links[0].position, 1);
    assert_eq!(links[0].circle_id, circle_a.id);
    assert_eq!(links[1].participation, Participation::CoHost);
    assert_eq!(links[1].position, 2);
    Ok(())
}

#[tokio::test]
async fn reimport_with_new_title_updates_the_track() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let first = parse_records(&["サークルA,盤,旧題,1,イベント,,,,"]);
    let second = parse_records(&["サークルA,盤,新題,1,イベント,,,,"]);

    run_import(catalog.clone(), &first, &HashMap::new()).await;
    let result = run_import(catalog.clone(), &second, &HashMap::new()).await;
    assert!(result.success);
    assert_eq!(result.counts.tracks.created, 0);
    assert_eq!(result.counts.tracks.updated, 1);

    let circle = catalog.get_circle_by_name("サークルA").await?.unwrap();
    let release = catalog
        .find_release_by_name_and_circle("盤", Some(circle.id.as_str()))
        .await?
        .unwrap();
    let tracks = catalog.list_tracks_by_release(&release.id, 10).await?;
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].name, "新題");
    Ok(())
}

#[tokio::test]
async fn unmapped_song_reference_is_skipped_not_linked() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let records = parse_records(&["サークルA,盤,曲,1,イベント,,,,謎の原曲"]);

    let result = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(result.success);
    assert_eq!(result.counts.official_song_links.created, 0);
    assert_eq!(result.counts.official_song_links.skipped, 1);

    let circle = catalog.get_circle_by_name("サークルA").await?.unwrap();
    let release = catalog
        .find_release_by_name_and_circle("盤", Some(circle.id.as_str()))
        .await?
        .unwrap();
    let tracks = catalog.list_tracks_by_release(&release.id, 10).await?;
    assert!(catalog.track_song_links(&tracks[0].id).is_empty());
    Ok(())
}

#[tokio::test]
async fn sentinel_mapping_keeps_the_custom_name() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.seed_official_song(OfficialSong {
        id: OTHER_SONG_ID.to_string(),
        name: "その他".to_string(),
        name_ja: None,
        official_work_name: None,
        is_original: false,
    });
    let records = parse_records(&["サークルA,盤,曲,1,イベント,,,,謎の原曲"]);
    let mappings = HashMap::from([("謎の原曲".to_string(), OTHER_SONG_ID.to_string())]);
    let custom = HashMap::from([("謎の原曲".to_string(), "謎の原曲".to_string())]);

    let result = orchestrator(catalog.clone())
        .execute_import(&records, &mappings, &custom)
        .await;
    assert!(result.success);
    assert_eq!(result.counts.official_song_links.created, 1);

    let circle = catalog.get_circle_by_name("サークルA").await?.unwrap();
    let release = catalog
        .find_release_by_name_and_circle("盤", Some(circle.id.as_str()))
        .await?
        .unwrap();
    let tracks = catalog.list_tracks_by_release(&release.id, 10).await?;
    let links = catalog.track_song_links(&tracks[0].id);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].song_id, OTHER_SONG_ID);
    assert_eq!(links[0].part_position, 1);
    assert_eq!(links[0].custom_song_name.as_deref(), Some("謎の原曲"));
    Ok(())
}

#[tokio::test]
async fn new_event_attaches_to_a_matching_series() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.seed_event_series(EventSeries {
        id: "series-reitaisai".to_string(),
        name: "博麗神社例大祭".to_string(),
    });
    let records = parse_records(&["サークルA,盤,曲,1,博麗神社例大祭18,,,,"]);

    let result = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(result.success);

    let event = catalog.get_event_by_name("博麗神社例大祭18").await?.unwrap();
    assert_eq!(event.series_id.as_deref(), Some("series-reitaisai"));
    Ok(())
}

#[tokio::test]
async fn same_artist_under_two_roles_shares_one_credit() -> Result<()> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let records = parse_records(&["サークルA,盤,曲,1,イベント,歌手A,歌手A,,"]);

    let result = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(result.success);
    assert_eq!(result.counts.artists.created, 1);
    // One credit row created, reused by the second role list.
    assert_eq!(result.counts.credits.created, 1);
    assert_eq!(result.counts.credits.skipped, 1);

    let circle = catalog.get_circle_by_name("サークルA").await?.unwrap();
    let release = catalog
        .find_release_by_name_and_circle("盤", Some(circle.id.as_str()))
        .await?
        .unwrap();
    let tracks = catalog.list_tracks_by_release(&release.id, 10).await?;
    let artist = catalog.get_artist_by_name("歌手A").await?.unwrap();
    let credit = catalog
        .find_credit(&tracks[0].id, &artist.id, "歌手A")
        .await?
        .unwrap();
    let roles = catalog.credit_role_rows(&credit.id);
    assert_eq!(roles.len(), 2);
    assert!(roles.iter().any(|r| r.role == Role::Vocalist));
    assert!(roles.iter().any(|r| r.role == Role::Arranger));
    Ok(())
}

/// Delegating store that can be told to fail specific operations.
struct FlakyCatalog {
    inner: InMemoryCatalog,
    fail_circle_name: Option<String>,
    fail_commit: bool,
}

#[async_trait::async_trait]
impl CatalogStore for FlakyCatalog {
    async fn begin(&self) -> ImporterResult<()> {
        self.inner.begin().await
    }

    async fn commit(&self) -> ImporterResult<()> {
        if self.fail_commit {
            return Err(ImporterError::Storage {
                message: "commit rejected".to_string(),
            });
        }
        self.inner.commit().await
    }

    async fn rollback(&self) -> ImporterResult<()> {
        self.inner.rollback().await
    }

    async fn get_event_by_name(&self, name: &str) -> ImporterResult<Option<Event>> {
        self.inner.get_event_by_name(name).await
    }

    async fn find_series_containing(&self, fragment: &str) -> ImporterResult<Option<EventSeries>> {
        self.inner.find_series_containing(fragment).await
    }

    async fn create_event(&self, event: &Event) -> ImporterResult<()> {
        self.inner.create_event(event).await
    }

    async fn get_circle_by_name(&self, name: &str) -> ImporterResult<Option<Circle>> {
        self.inner.get_circle_by_name(name).await
    }

    async fn create_circle(&self, circle: &Circle) -> ImporterResult<()> {
        if self.fail_circle_name.as_deref() == Some(circle.name.as_str()) {
            return Err(ImporterError::Storage {
                message: format!("insert rejected for circle '{}'", circle.name),
            });
        }
        self.inner.create_circle(circle).await
    }

    async fn get_artist_by_name(&self, name: &str) -> ImporterResult<Option<Artist>> {
        self.inner.get_artist_by_name(name).await
    }

    async fn create_artist(&self, artist: &Artist) -> ImporterResult<()> {
        self.inner.create_artist(artist).await
    }

    async fn find_release_by_name_and_circle(
        &self,
        name: &str,
        circle_id: Option<&str>,
    ) -> ImporterResult<Option<Release>> {
        self.inner.find_release_by_name_and_circle(name, circle_id).await
    }

    async fn create_release(&self, release: &Release) -> ImporterResult<()> {
        self.inner.create_release(release).await
    }

    async fn create_release_circle(&self, link: &ReleaseCircle) -> ImporterResult<()> {
        self.inner.create_release_circle(link).await
    }

    async fn list_tracks_by_release(
        &self,
        release_id: &str,
        limit: usize,
    ) -> ImporterResult<Vec<Track>> {
        self.inner.list_tracks_by_release(release_id, limit).await
    }

    async fn create_track(&self, track: &Track) -> ImporterResult<()> {
        self.inner.create_track(track).await
    }

    async fn update_track_name(&self, track_id: &str, name: &str) -> ImporterResult<()> {
        self.inner.update_track_name(track_id, name).await
    }

    async fn find_credit(
        &self,
        track_id: &str,
        artist_id: &str,
        credit_name: &str,
    ) -> ImporterResult<Option<Credit>> {
        self.inner.find_credit(track_id, artist_id, credit_name).await
    }

    async fn create_credit(&self, credit: &Credit) -> ImporterResult<()> {
        self.inner.create_credit(credit).await
    }

    async fn credit_role_exists(&self, credit_id: &str, role: Role) -> ImporterResult<bool> {
        self.inner.credit_role_exists(credit_id, role).await
    }

    async fn create_credit_role(&self, role: &CreditRole) -> ImporterResult<()> {
        self.inner.create_credit_role(role).await
    }

    async fn song_link_exists(&self, track_id: &str, song_id: &str) -> ImporterResult<bool> {
        self.inner.song_link_exists(track_id, song_id).await
    }

    async fn create_song_link(&self, link: &TrackOfficialSong) -> ImporterResult<()> {
        self.inner.create_song_link(link).await
    }
}

#[tokio::test]
async fn one_bad_record_does_not_abort_the_batch() -> Result<()> {
    let catalog = Arc::new(FlakyCatalog {
        inner: InMemoryCatalog::new(),
        fail_circle_name: Some("爆発サークル".to_string()),
        fail_commit: false,
    });
    let records = parse_records(&[
        "サークルA,盤1,曲1,1,イベント,,,,",
        "爆発サークル,盤2,曲2,1,イベント,,,,",
        "サークルC,盤3,曲3,1,イベント,,,,",
    ]);

    let result = run_import(catalog.clone(), &records, &HashMap::new()).await;
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 3);
    assert_eq!(result.errors[0].entity, "record");
    // Rows 1 and 3 were still fully processed.
    assert_eq!(result.counts.circles.created, 2);
    assert_eq!(result.counts.releases.created, 2);
    assert_eq!(result.counts.tracks.created, 2);
    Ok(())
}

#[tokio::test]
async fn commit_failure_yields_a_single_transaction_error() -> Result<()> {
    let catalog = Arc::new(FlakyCatalog {
        inner: InMemoryCatalog::new(),
        fail_circle_name: None,
        fail_commit: true,
    });
    let records = parse_records(&["サークルA,盤,曲,1,イベント,,,,"]);

    let result = run_import(catalog, &records, &HashMap::new()).await;
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 0);
    assert_eq!(result.errors[0].entity, "transaction");
    Ok(())
}

#[tokio::test]
async fn sqlite_backed_import_round_trips() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("catalog.sqlite3");
    let catalog = Arc::new(SqliteCatalog::open(&db_path)?);
    catalog.seed_official_song(&OfficialSong {
        id: "song-1".to_string(),
        name: "原曲1".to_string(),
        name_ja: None,
        official_work_name: Some("東方紅魔郷".to_string()),
        is_original: false,
    })?;

    let records = parse_records(&[
        "サークルA,アルバム1,曲名1,1,コミケ100,ボーカルA:ボーカルB,,,原曲1",
    ]);
    let mappings = HashMap::from([("原曲1".to_string(), "song-1".to_string())]);

    let first = run_import(catalog.clone(), &records, &mappings).await;
    assert!(first.success, "first run errors: {:?}", first.errors);
    assert_eq!(first.counts.events.created, 1);
    assert_eq!(first.counts.artists.created, 2);
    assert_eq!(first.counts.credits.created, 2);
    assert_eq!(first.counts.official_song_links.created, 1);

    let second = run_import(catalog.clone(), &records, &mappings).await;
    assert!(second.success);
    assert_eq!(second.counts.events.created, 0);
    assert_eq!(second.counts.events.skipped, 1);
    assert_eq!(second.counts.artists.skipped, 2);
    assert_eq!(second.counts.credits.skipped, 2);
    assert_eq!(second.counts.official_song_links.skipped, 1);
    Ok(())
}
