//! Workbook ingestion pipeline
//!
//! Per region: `upload` validates a workbook and stages it, `preview` shows
//! what is staged, `commit` upserts its learner profiles in one transaction.
//!
//! ```text
//! Empty --upload ok--> Staged --commit ok--> Empty
//!                      Staged --upload ok--> Staged (replaced)
//!                      Staged --commit err-> Staged
//! ```
//!
//! A failed upload never touches what is already staged. Only the
//! `learner_profiles` sheet is persisted; the measurement sheets are
//! validated but not written.

use chrono::{DateTime, Utc};
use lrms_common::dataset::{TablePreview, PROFILE_SHEET};
use lrms_common::db::{LearnerProfile, StagedUpload};
use lrms_common::workbook::{read_sheet, read_workbook, WORKBOOK_EXTENSION};
use lrms_common::{validate, Cell, Dataset, Region, Table};
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{learners, staging};
use crate::error::IngestError;

/// Result of a successful upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub region: Region,
    pub sheets: usize,
    pub learners: usize,
}

impl UploadOutcome {
    pub fn notice(&self) -> String {
        format!("{} Excel uploaded and validated successfully", self.region)
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub region: Region,
    pub learners: usize,
}

impl CommitOutcome {
    pub fn notice(&self) -> String {
        format!("All {} data saved successfully", self.region)
    }
}

/// Metadata of the workbook staged for a region
#[derive(Debug, Clone, Serialize)]
pub struct StagedFile {
    pub original_filename: Option<String>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&StagedUpload> for StagedFile {
    fn from(staged: &StagedUpload) -> Self {
        Self {
            original_filename: staged.original_filename.clone(),
            uploaded_by: staged.uploaded_by.clone(),
            uploaded_at: staged.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetPreview {
    pub name: String,
    #[serde(flatten)]
    pub table: TablePreview,
}

/// Staged workbook of one region, every sheet in workbook order
#[derive(Debug, Clone, Serialize)]
pub struct RegionPreview {
    pub region: Region,
    pub staged: Option<StagedFile>,
    pub sheets: Vec<SheetPreview>,
    /// Load failure to report to the user
    #[serde(skip)]
    pub warning: Option<String>,
}

impl RegionPreview {
    fn empty(region: Region) -> Self {
        Self {
            region,
            staged: None,
            sheets: Vec::new(),
            warning: None,
        }
    }
}

/// Staged `learner_profiles` rows of one region
#[derive(Debug, Clone, Serialize)]
pub struct ProfilesPreview {
    pub region: Region,
    #[serde(flatten)]
    pub table: TablePreview,
    #[serde(skip)]
    pub warning: Option<String>,
}

impl ProfilesPreview {
    fn empty(region: Region) -> Self {
        Self {
            region,
            table: TablePreview::default(),
            warning: None,
        }
    }
}

/// Upload, preview and commit of regional workbooks
pub struct IngestionPipeline {
    db: SqlitePool,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
}

impl IngestionPipeline {
    pub fn new(db: SqlitePool, upload_dir: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            db,
            upload_dir,
            max_upload_bytes,
        }
    }

    /// Validate an uploaded workbook and stage it for `region`.
    ///
    /// The payload is written to a uniquely named file which is removed on
    /// any failure. On success the region's previous upload is replaced and
    /// its file deleted.
    pub async fn upload(
        &self,
        region: Region,
        filename: &str,
        bytes: &[u8],
        uploaded_by: &str,
    ) -> Result<UploadOutcome, IngestError> {
        if filename.is_empty() {
            return Err(IngestError::NoFile);
        }
        if !filename.ends_with(WORKBOOK_EXTENSION) {
            return Err(IngestError::Format);
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(IngestError::TooLarge {
                limit: self.max_upload_bytes,
            });
        }

        let path = self
            .upload_dir
            .join(format!("{}{}", Uuid::new_v4(), WORKBOOK_EXTENSION));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?;

        let dataset = match check_workbook(&path).await {
            Ok(dataset) => dataset,
            Err(e) => {
                remove_quietly(&path).await;
                warn!(region = %region, filename = %filename, "Upload rejected: {}", e);
                return Err(e);
            }
        };

        let staged = StagedUpload {
            region,
            file_path: path.clone(),
            original_filename: Some(filename.to_string()),
            uploaded_by: Some(uploaded_by.to_string()),
            uploaded_at: Utc::now(),
        };

        let previous = match staging::replace(&self.db, &staged).await {
            Ok(previous) => previous,
            Err(e) => {
                remove_quietly(&path).await;
                return Err(IngestError::Storage(e.to_string()));
            }
        };
        if let Some(previous) = previous {
            remove_quietly(&previous).await;
        }

        let outcome = UploadOutcome {
            region,
            sheets: dataset.sheet_names().len(),
            learners: dataset.sheet(PROFILE_SHEET).map(Table::len).unwrap_or(0),
        };
        info!(
            region = %region,
            filename = %filename,
            learners = outcome.learners,
            "Workbook staged"
        );

        Ok(outcome)
    }

    /// Every sheet of the region's staged workbook.
    ///
    /// Never fails: an unreadable staged file is unstaged and reported
    /// through `warning`.
    pub async fn preview(&self, region: Region) -> RegionPreview {
        let staged = match self.staged(region).await {
            Ok(Some(staged)) => staged,
            Ok(None) => return RegionPreview::empty(region),
            Err(cause) => {
                let mut preview = RegionPreview::empty(region);
                preview.warning = Some(format!("Failed to load uploaded file for {}: {}", region, cause));
                return preview;
            }
        };

        let path = staged.file_path.clone();
        match blocking(move || read_workbook(&path)).await {
            Ok(dataset) => RegionPreview {
                region,
                staged: Some(StagedFile::from(&staged)),
                sheets: dataset
                    .sheets()
                    .map(|sheet| SheetPreview {
                        name: sheet.name.clone(),
                        table: sheet.table.preview(),
                    })
                    .collect(),
                warning: None,
            },
            Err(cause) => {
                self.discard_stale(&staged).await;
                let mut preview = RegionPreview::empty(region);
                preview.warning = Some(format!("Failed to load uploaded file for {}: {}", region, cause));
                preview
            }
        }
    }

    /// Only the `learner_profiles` sheet of the region's staged workbook,
    /// with the same failure policy as [`preview`](Self::preview).
    pub async fn preview_profiles(&self, region: Region) -> ProfilesPreview {
        let staged = match self.staged(region).await {
            Ok(Some(staged)) => staged,
            Ok(None) => return ProfilesPreview::empty(region),
            Err(cause) => {
                let mut preview = ProfilesPreview::empty(region);
                preview.warning = Some(format!("Failed to load learner_profiles for {}: {}", region, cause));
                return preview;
            }
        };

        let path = staged.file_path.clone();
        match blocking(move || read_sheet(&path, PROFILE_SHEET)).await {
            Ok(table) => ProfilesPreview {
                region,
                table: table.map(|t| t.preview()).unwrap_or_default(),
                warning: None,
            },
            Err(cause) => {
                self.discard_stale(&staged).await;
                let mut preview = ProfilesPreview::empty(region);
                preview.warning = Some(format!("Failed to load learner_profiles for {}: {}", region, cause));
                preview
            }
        }
    }

    /// Persist the region's staged learner profiles.
    ///
    /// All rows are upserted in one transaction together with clearing the
    /// staging row; on failure nothing is written and the workbook stays
    /// staged.
    pub async fn commit(&self, region: Region) -> Result<CommitOutcome, IngestError> {
        let staged = self
            .staged(region)
            .await
            .map_err(|cause| IngestError::Persistence { region, cause })?
            .ok_or(IngestError::NotFound { region })?;

        if !tokio::fs::try_exists(&staged.file_path).await.unwrap_or(false) {
            warn!(region = %region, path = %staged.file_path.display(), "Staged file vanished");
            self.discard_stale(&staged).await;
            return Err(IngestError::NotFound { region });
        }

        let path = staged.file_path.clone();
        let profiles = blocking(move || read_sheet(&path, PROFILE_SHEET))
            .await
            .and_then(|table| {
                table.ok_or_else(|| format!("sheet {} not found", PROFILE_SHEET))
            })
            .and_then(|table| profile_rows(&table))
            .map_err(|cause| IngestError::Persistence { region, cause })?;

        self.persist(region, &staged.file_path, &profiles)
            .await
            .map_err(|e| IngestError::Persistence {
                region,
                cause: e.to_string(),
            })?;

        remove_quietly(&staged.file_path).await;
        info!(region = %region, learners = profiles.len(), "Learner profiles saved");

        Ok(CommitOutcome {
            region,
            learners: profiles.len(),
        })
    }

    async fn persist(
        &self,
        region: Region,
        file_path: &Path,
        profiles: &[LearnerProfile],
    ) -> lrms_common::Result<()> {
        let mut tx = self.db.begin().await?;

        for profile in profiles {
            learners::upsert_profile(&mut tx, profile).await?;
        }

        if !staging::clear_if_current(&mut tx, region, file_path).await? {
            warn!(region = %region, "Staged upload was replaced during commit; keeping the newer one");
        }

        tx.commit().await?;
        Ok(())
    }

    /// Regions with a workbook awaiting commit, in region order
    pub async fn staged_regions(&self) -> Vec<Region> {
        match staging::list(&self.db).await {
            Ok(uploads) => uploads.into_iter().map(|u| u.region).collect(),
            Err(e) => {
                warn!("Failed to list staged uploads: {}", e);
                Vec::new()
            }
        }
    }

    async fn staged(&self, region: Region) -> Result<Option<StagedUpload>, String> {
        staging::get(&self.db, region).await.map_err(|e| e.to_string())
    }

    /// Unstage an upload whose file can no longer be read, and remove the file
    async fn discard_stale(&self, staged: &StagedUpload) {
        let cleared = match self.db.acquire().await {
            Ok(mut conn) => staging::clear_if_current(&mut conn, staged.region, &staged.file_path).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = cleared {
            warn!(region = %staged.region, "Failed to clear stale staged upload: {}", e);
        }
        remove_quietly(&staged.file_path).await;
    }
}

/// Parse a workbook and run the schema and consistency checks
async fn check_workbook(path: &Path) -> Result<Dataset, IngestError> {
    let owned = path.to_path_buf();
    let dataset = blocking(move || read_workbook(&owned))
        .await
        .map_err(IngestError::Parse)?;

    let missing = dataset.missing_sheets();
    if !missing.is_empty() {
        return Err(IngestError::Schema {
            missing: missing.into_iter().map(String::from).collect(),
        });
    }

    let errors = validate(&dataset);
    if !errors.is_empty() {
        return Err(IngestError::Consistency(errors));
    }

    Ok(dataset)
}

/// Run workbook I/O on the blocking pool, flattening failures to a message
async fn blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> lrms_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("workbook task failed: {}", e)),
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove upload: {}", e),
    }
}

/// Convert `learner_profiles` rows into profiles.
///
/// Learner number and name are trimmed; an absent or blank optional column
/// becomes `None`. A blank learner number is passed through so the database
/// constraint rejects the batch.
pub fn profile_rows(table: &Table) -> Result<Vec<LearnerProfile>, String> {
    if !table.has_column("learner_number") || !table.has_column("name") {
        return Err(format!("{} is missing the learner_number or name column", PROFILE_SHEET));
    }

    let text = |row: &[Cell], column: &str| -> Option<String> {
        table
            .cell(row, column)
            .map(Cell::as_text)
            .filter(|value| !value.trim().is_empty())
    };

    Ok(table
        .rows
        .iter()
        .map(|row| {
            let row = row.as_slice();
            LearnerProfile {
                learner_number: text(row, "learner_number").unwrap_or_default().trim().to_string(),
                name: text(row, "name").unwrap_or_default().trim().to_string(),
                gender: text(row, "gender"),
                region: text(row, "region"),
                learning_hub: text(row, "learning_hub"),
                program: text(row, "program"),
                class_name: text(row, "class"),
                co_learner: text(row, "co_learner"),
                grade_level: text(row, "grade_level"),
            }
        })
        .collect())
}
