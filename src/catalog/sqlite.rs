//! SQLite implementation of [`Catalog`].
//!
//! Uses SQLx with a WAL-mode SQLite file for embedded storage. Artist,
//! album and genre rows are deduplicated case-insensitively; within one
//! write transaction their ids are cached in a per-call map so a batch of
//! 50 tracks by the same artist costs one upsert, not 50.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::Catalog;
use crate::error::{Error, Result};
use crate::model::{
    Claim, EnrichmentOutcome, EnrichmentStatus, EnrichmentSummary, LibraryTrack, NewTrack,
    OrphanCounts, ResetTarget, TrackUpdate, now_millis,
};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "catalog.db";

/// Ids per `IN (...)` list; well under SQLite's bound-parameter limit.
const ID_CHUNK: usize = 500;

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

const SELECT_TRACKS: &str = r#"
    SELECT
        t.id, t.external_uri, t.title, ar.name AS artist, al.title AS album, g.name AS genre,
        t.version_tag, t.duration_secs, t.year, t.track_number, t.last_modified,
        t.raw_title, t.raw_artist, t.raw_album, t.added_at,
        t.enrichment_status, t.missing_fields, t.enrichment_attempts,
        t.external_id, t.external_url, t.lyrics_available, t.cover_path, t.last_error
    FROM tracks t
    JOIN artists ar ON ar.id = t.artist_id
    LEFT JOIN albums al ON al.id = t.album_id
    LEFT JOIN genres g ON g.id = t.genre_id
"#;

/// Eligible for a new attempt (attempt cap checked separately). Binds the
/// stale-claim cutoff.
const ELIGIBLE: &str = "(t.enrichment_status IN ('pending', 'failed') \
     OR (t.enrichment_status = 'resolving' AND t.claimed_at < ?))";

#[derive(Debug, FromRow)]
struct TrackRow {
    id: i64,
    external_uri: String,
    title: String,
    artist: String,
    album: Option<String>,
    genre: Option<String>,
    version_tag: Option<String>,
    duration_secs: i64,
    year: Option<i64>,
    track_number: Option<i64>,
    last_modified: i64,
    raw_title: String,
    raw_artist: Option<String>,
    raw_album: Option<String>,
    added_at: i64,
    enrichment_status: String,
    missing_fields: i64,
    enrichment_attempts: i64,
    external_id: Option<String>,
    external_url: Option<String>,
    lyrics_available: bool,
    cover_path: Option<String>,
    last_error: Option<String>,
}

impl TryFrom<TrackRow> for LibraryTrack {
    type Error = Error;

    fn try_from(row: TrackRow) -> Result<Self> {
        Ok(Self {
            enrichment_status: EnrichmentStatus::from_columns(
                &row.enrichment_status,
                row.missing_fields,
            )?,
            id: row.id,
            external_uri: row.external_uri,
            title: row.title,
            artist: row.artist,
            album: row.album,
            genre: row.genre,
            version_tag: row.version_tag,
            duration_secs: row.duration_secs,
            year: row.year.and_then(|y| i32::try_from(y).ok()),
            track_number: row.track_number.and_then(|n| u32::try_from(n).ok()),
            last_modified: row.last_modified,
            raw_title: row.raw_title,
            raw_artist: row.raw_artist,
            raw_album: row.raw_album,
            added_at: row.added_at,
            enrichment_attempts: u32::try_from(row.enrichment_attempts).unwrap_or(u32::MAX),
            external_id: row.external_id,
            external_url: row.external_url,
            lyrics_available: row.lyrics_available,
            cover_path: row.cover_path.map(Into::into),
            last_error: row.last_error,
        })
    }
}

/// Artist/album/genre ids seen within one transaction.
#[derive(Default)]
struct NameCache {
    artists: HashMap<String, i64>,
    albums: HashMap<(String, i64), i64>,
    genres: HashMap<String, i64>,
}

impl NameCache {
    async fn artist_id(&mut self, conn: &mut SqliteConnection, name: &str) -> sqlx::Result<i64> {
        let key = name.to_lowercase();
        if let Some(&id) = self.artists.get(&key) {
            return Ok(id);
        }
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO artists (name) VALUES (?) \
             ON CONFLICT(name) DO UPDATE SET name = name RETURNING id",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
        self.artists.insert(key, id);
        Ok(id)
    }

    async fn album_id(
        &mut self,
        conn: &mut SqliteConnection,
        title: &str,
        artist_id: i64,
    ) -> sqlx::Result<i64> {
        let key = (title.to_lowercase(), artist_id);
        if let Some(&id) = self.albums.get(&key) {
            return Ok(id);
        }
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO albums (title, artist_id) VALUES (?, ?) \
             ON CONFLICT(title, artist_id) DO UPDATE SET title = title RETURNING id",
        )
        .bind(title)
        .bind(artist_id)
        .fetch_one(&mut *conn)
        .await?;
        self.albums.insert(key, id);
        Ok(id)
    }

    async fn genre_id(&mut self, conn: &mut SqliteConnection, name: &str) -> sqlx::Result<i64> {
        let key = name.to_lowercase();
        if let Some(&id) = self.genres.get(&key) {
            return Ok(id);
        }
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO genres (name) VALUES (?) \
             ON CONFLICT(name) DO UPDATE SET name = name RETURNING id",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
        self.genres.insert(key, id);
        Ok(id)
    }

    /// (artist_id, album_id, genre_id) for a track.
    async fn resolve(
        &mut self,
        conn: &mut SqliteConnection,
        track: &NewTrack,
    ) -> sqlx::Result<(i64, Option<i64>, Option<i64>)> {
        let artist_id = self.artist_id(conn, &track.artist).await?;
        let album_id = match &track.album {
            Some(album) => Some(self.album_id(conn, album, artist_id).await?),
            None => None,
        };
        let genre_id = match &track.genre {
            Some(genre) => Some(self.genre_id(conn, genre).await?),
            None => None,
        };
        Ok((artist_id, album_id, genre_id))
    }
}

static CLAIM_SEQ: AtomicU64 = AtomicU64::new(0);

fn new_claim_token() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{:x}-{:x}", nanos, CLAIM_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// SQLite-backed catalog.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
    stale_claim_after: Duration,
}

impl SqliteCatalog {
    /// Open (creating if needed) the database and run migrations.
    ///
    /// Connections use WAL journaling, a 5 s busy timeout and enforced
    /// foreign keys. The pool holds up to 5 connections.
    pub async fn open(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        tracing::debug!(target: "catalog", url = %db_url, "Catalog opened");

        Ok(Self {
            pool,
            stale_claim_after: Duration::from_secs(600),
        })
    }

    /// A resolving claim older than this may be taken over.
    pub fn with_stale_claim_after(mut self, after: Duration) -> Self {
        self.stale_claim_after = after;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn stale_cutoff(&self) -> i64 {
        now_millis() - self.stale_claim_after.as_millis() as i64
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn all_tracks(&self) -> Result<Vec<LibraryTrack>> {
        let rows = sqlx::query_as::<_, TrackRow>(&format!("{SELECT_TRACKS} ORDER BY t.id"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LibraryTrack::try_from).collect()
    }

    async fn track_by_id(&self, id: i64) -> Result<Option<LibraryTrack>> {
        let row = sqlx::query_as::<_, TrackRow>(&format!("{SELECT_TRACKS} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LibraryTrack::try_from).transpose()
    }

    async fn insert_batch(&self, tracks: &[NewTrack]) -> Result<Vec<i64>> {
        if tracks.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut names = NameCache::default();
        let mut ids = Vec::with_capacity(tracks.len());
        let added_at = now_millis();

        for track in tracks {
            let (artist_id, album_id, genre_id) = names.resolve(&mut *tx, track).await?;
            let inserted: Option<(i64,)> = sqlx::query_as(
                r#"
                INSERT INTO tracks (
                    external_uri, title, artist_id, album_id, genre_id, version_tag,
                    duration_secs, year, track_number, last_modified,
                    raw_title, raw_artist, raw_album, added_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(external_uri) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&track.external_uri)
            .bind(&track.title)
            .bind(artist_id)
            .bind(album_id)
            .bind(genre_id)
            .bind(&track.version_tag)
            .bind(track.duration_secs)
            .bind(track.year)
            .bind(track.track_number.map(i64::from))
            .bind(track.last_modified)
            .bind(&track.raw_title)
            .bind(&track.raw_artist)
            .bind(&track.raw_album)
            .bind(added_at)
            .fetch_optional(&mut *tx)
            .await?;
            match inserted {
                Some((id,)) => ids.push(id),
                None => {
                    let err = Error::data_integrity(format!(
                        "{} is already cataloged",
                        track.external_uri
                    ));
                    tracing::warn!(target: "catalog", error = %err, "Skipping insert");
                }
            }
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn update_batch(&self, updates: &[TrackUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let mut names = NameCache::default();

        for update in updates {
            let track = &update.track;
            let (artist_id, album_id, genre_id) = names.resolve(&mut *tx, track).await?;
            let result = sqlx::query(
                r#"
                UPDATE tracks SET
                    title = ?, artist_id = ?, album_id = ?, genre_id = ?, version_tag = ?,
                    duration_secs = ?, year = ?, track_number = ?, last_modified = ?,
                    raw_title = ?, raw_artist = ?, raw_album = ?
                WHERE id = ?
                "#,
            )
            .bind(&track.title)
            .bind(artist_id)
            .bind(album_id)
            .bind(genre_id)
            .bind(&track.version_tag)
            .bind(track.duration_secs)
            .bind(track.year)
            .bind(track.track_number.map(i64::from))
            .bind(track.last_modified)
            .bind(&track.raw_title)
            .bind(&track.raw_artist)
            .bind(&track.raw_album)
            .bind(update.id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(Error::data_integrity(format!(
                    "update for missing track {}",
                    update.id
                )));
            }

            if update.reset_enrichment {
                // Clearing the claim token also voids any in-flight attempt
                sqlx::query(
                    r#"
                    UPDATE tracks SET
                        enrichment_status = 'pending', missing_fields = 0,
                        claim_token = NULL, claimed_at = NULL,
                        external_id = NULL, external_url = NULL,
                        lyrics_available = 0, cover_path = NULL, last_error = NULL
                    WHERE id = ?
                    "#,
                )
                .bind(update.id)
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM track_lyrics WHERE track_id = ?")
                    .bind(update.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM tracks WHERE id IN (");
            let mut list = query.separated(", ");
            for id in chunk {
                list.push_bind(*id);
            }
            list.push_unseparated(")");
            deleted += query.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn garbage_collect_orphans(&self) -> Result<OrphanCounts> {
        let mut tx = self.pool.begin().await?;

        // Albums first: they hold the last reference to some artists
        let albums = sqlx::query(
            "DELETE FROM albums WHERE id NOT IN \
             (SELECT album_id FROM tracks WHERE album_id IS NOT NULL)",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let genres = sqlx::query(
            "DELETE FROM genres WHERE id NOT IN \
             (SELECT genre_id FROM tracks WHERE genre_id IS NOT NULL)",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let artists = sqlx::query(
            "DELETE FROM artists WHERE id NOT IN (SELECT artist_id FROM tracks) \
             AND id NOT IN (SELECT artist_id FROM albums)",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(OrphanCounts {
            artists,
            albums,
            genres,
        })
    }

    async fn find_pending_enrichment(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<LibraryTrack>> {
        let rows = sqlx::query_as::<_, TrackRow>(&format!(
            "{SELECT_TRACKS} WHERE t.enrichment_attempts < ? AND {ELIGIBLE} \
             ORDER BY t.added_at, t.id LIMIT ?"
        ))
        .bind(i64::from(max_attempts))
        .bind(self.stale_cutoff())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LibraryTrack::try_from).collect()
    }

    async fn mark_exhausted(&self, max_attempts: u32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                enrichment_status = 'exhausted', claim_token = NULL, claimed_at = NULL
            WHERE enrichment_attempts >= ?
              AND (enrichment_status = 'failed'
                   OR (enrichment_status = 'resolving' AND claimed_at < ?))
            "#,
        )
        .bind(i64::from(max_attempts))
        .bind(self.stale_cutoff())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn claim_for_enrichment(&self, id: i64, max_attempts: u32) -> Result<Option<Claim>> {
        let token = new_claim_token();
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            r#"
            UPDATE tracks AS t SET
                enrichment_status = 'resolving',
                enrichment_attempts = t.enrichment_attempts + 1,
                claim_token = ?, claimed_at = ?
            WHERE t.id = ? AND t.enrichment_attempts < ? AND {ELIGIBLE}
            RETURNING enrichment_attempts
            "#
        ))
        .bind(&token)
        .bind(now_millis())
        .bind(id)
        .bind(i64::from(max_attempts))
        .bind(self.stale_cutoff())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(attempt,)| Claim {
            track_id: id,
            token,
            attempt: u32::try_from(attempt).unwrap_or(u32::MAX),
        }))
    }

    async fn record_enrichment(&self, claim: &Claim, outcome: &EnrichmentOutcome) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                enrichment_status = ?, missing_fields = ?,
                external_id = COALESCE(?, external_id),
                external_url = COALESCE(?, external_url),
                lyrics_available = (lyrics_available OR ?),
                cover_path = COALESCE(?, cover_path),
                last_error = ?,
                claim_token = NULL, claimed_at = NULL
            WHERE id = ? AND claim_token = ? AND enrichment_status = 'resolving'
            "#,
        )
        .bind(outcome.status.as_str())
        .bind(outcome.status.missing_mask())
        .bind(&outcome.external_id)
        .bind(&outcome.external_url)
        .bind(outcome.lyrics.is_some())
        .bind(outcome.cover_path.as_ref().map(|p| p.to_string_lossy().into_owned()))
        .bind(&outcome.error)
        .bind(claim.track_id)
        .bind(&claim.token)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::debug!(target: "catalog", track_id = claim.track_id, "Stale claim, write skipped");
            return Ok(false);
        }

        if let Some(lyrics) = &outcome.lyrics {
            sqlx::query(
                "INSERT INTO track_lyrics (track_id, lyrics) VALUES (?, ?) \
                 ON CONFLICT(track_id) DO UPDATE SET lyrics = excluded.lyrics",
            )
            .bind(claim.track_id)
            .bind(lyrics)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn reset_enrichment(&self, target: ResetTarget) -> Result<u64> {
        const RESET: &str = "UPDATE tracks SET enrichment_status = 'pending', missing_fields = 0, \
             enrichment_attempts = 0, claim_token = NULL, claimed_at = NULL, last_error = NULL";

        match target {
            ResetTarget::AllExhausted => {
                let result = sqlx::query(&format!("{RESET} WHERE enrichment_status = 'exhausted'"))
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected())
            }
            ResetTarget::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(0);
                }
                let mut tx = self.pool.begin().await?;
                let mut changed = 0;
                for chunk in ids.chunks(ID_CHUNK) {
                    let mut query = QueryBuilder::<Sqlite>::new(RESET);
                    query.push(" WHERE id IN (");
                    let mut list = query.separated(", ");
                    for id in chunk {
                        list.push_bind(*id);
                    }
                    list.push_unseparated(")");
                    changed += query.build().execute(&mut *tx).await?.rows_affected();
                }
                tx.commit().await?;
                Ok(changed)
            }
        }
    }

    async fn lyrics_for(&self, id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT lyrics FROM track_lyrics WHERE track_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(lyrics,)| lyrics))
    }

    async fn enrichment_summary(&self) -> Result<EnrichmentSummary> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT enrichment_status, COUNT(*) FROM tracks GROUP BY enrichment_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut summary = EnrichmentSummary::default();
        for (status, count) in rows {
            let count = u64::try_from(count).unwrap_or_default();
            match status.as_str() {
                "pending" => summary.pending = count,
                "resolving" => summary.resolving = count,
                "enriched" => summary.enriched = count,
                "partial" => summary.partial = count,
                "failed" => summary.failed = count,
                "exhausted" => summary.exhausted = count,
                other => {
                    return Err(Error::data_integrity(format!(
                        "unknown enrichment status {other:?}"
                    )));
                }
            }
        }
        Ok(summary)
    }
}
