//! Database management: workbook upload, preview and commit per region

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Form, Router,
};
use lrms_common::Region;
use serde::{Deserialize, Serialize};

use crate::api::{parse_region, Page};
use crate::error::IngestError;
use crate::gate::Admin;
use crate::ingest::RegionPreview;
use crate::session::SessionId;
use crate::AppState;

const PAGE_PATH: &str = "/database-management";

#[derive(Debug, Serialize)]
pub struct DatabaseManagement {
    pub regions: Vec<RegionPreview>,
}

/// GET /database-management
pub async fn management_page(
    State(state): State<AppState>,
    session: SessionId,
    Admin(identity): Admin,
) -> Page<DatabaseManagement> {
    let mut regions = Vec::with_capacity(Region::ALL.len());
    for region in Region::ALL {
        regions.push(state.pipeline.preview(region).await);
    }
    let warnings: Vec<String> = regions.iter().filter_map(|r| r.warning.clone()).collect();

    Page::new("database_management", DatabaseManagement { regions })
        .role(Some(identity.role))
        .warnings(warnings)
        .render(&state, session)
        .await
}

/// Fields of the upload form
#[derive(Debug, Default)]
struct UploadForm {
    region: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

async fn read_upload_form(mut multipart: Multipart, limit: usize) -> Result<UploadForm, IngestError> {
    let multipart_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            IngestError::TooLarge { limit }
        } else {
            IngestError::Parse(e.body_text())
        }
    };

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("region") => form.region = Some(field.text().await.map_err(multipart_error)?),
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /database-management/upload
///
/// Multipart form with `region` and `file`.
pub async fn upload(
    State(state): State<AppState>,
    session: SessionId,
    Admin(identity): Admin,
    multipart: Multipart,
) -> Redirect {
    let notices = match read_upload_form(multipart, state.config.max_upload_bytes).await {
        Ok(form) => match parse_region(form.region.as_deref().unwrap_or_default()) {
            Err(notice) => vec![notice],
            Ok(region) => {
                let (filename, bytes) = form.file.unwrap_or_default();
                match state
                    .pipeline
                    .upload(region, &filename, &bytes, &identity.username)
                    .await
                {
                    Ok(outcome) => vec![outcome.notice()],
                    Err(e) => e.notices(),
                }
            }
        },
        Err(e) => e.notices(),
    };

    state.sessions.push_notices(&session.0, notices).await;
    Redirect::to(PAGE_PATH)
}

#[derive(Debug, Deserialize)]
pub struct SaveForm {
    #[serde(default)]
    pub region: String,
    pub save_db: Option<String>,
}

/// POST /database-management/save
pub async fn save(
    State(state): State<AppState>,
    session: SessionId,
    Admin(_identity): Admin,
    Form(form): Form<SaveForm>,
) -> Redirect {
    if form.save_db.is_none() {
        return Redirect::to(PAGE_PATH);
    }

    let notices = match parse_region(&form.region) {
        Err(notice) => vec![notice],
        Ok(region) => match state.pipeline.commit(region).await {
            Ok(outcome) => vec![outcome.notice()],
            Err(e) => e.notices(),
        },
    };

    state.sessions.push_notices(&session.0, notices).await;
    Redirect::to(PAGE_PATH)
}

pub fn database_routes() -> Router<AppState> {
    Router::new()
        .route(PAGE_PATH, get(management_page))
        .route("/database-management/upload", post(upload))
        .route("/database-management/save", post(save))
}
