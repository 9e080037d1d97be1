//! Shared test utilities: service setup, HTTP helpers and workbook fixtures

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use lrms_common::config::{AppConfig, ConfigOverrides};
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use lrms_web::{bootstrap, build_router, AppState};

pub const ROOT_PASSWORD: &str = "admin123";

/// Running service backed by a scratch database and upload directory.
///
/// The TempDir must stay alive for the duration of the test.
pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
}

pub async fn test_app() -> TestApp {
    let dir = TempDir::new().expect("Should create temp dir");
    let overrides = ConfigOverrides {
        database_url: Some(format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("lrms.db").display()
        )),
        session_secret: Some("test-secret".to_string()),
        upload_dir: Some(dir.path().join("uploads")),
        bind_addr: None,
        root_admin_password: Some(ROOT_PASSWORD.to_string()),
    };

    let state = bootstrap(AppConfig::resolve(overrides, None))
        .await
        .expect("Should bootstrap service");
    let router = build_router(state.clone());

    TestApp { dir, state, router }
}

impl TestApp {
    pub fn upload_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    /// Number of files currently in the upload directory
    pub fn uploaded_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir())
            .expect("Should read upload dir")
            .count()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router should respond")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn post_upload(
        &self,
        cookie: &str,
        region: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri("/database-management/upload")
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(region, filename, bytes)))
            .unwrap();
        self.send(request).await
    }

    /// Log in and return the session cookie to send with later requests
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .post_form(
                "/login",
                None,
                &format!("username={}&password={}", username, password),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard", "Login as {} should succeed", username);
        session_cookie(&response).expect("Login should issue a session cookie")
    }

    pub async fn login_admin(&self) -> String {
        self.login("admin", ROOT_PASSWORD).await
    }

    /// Drain the session's pending notices by rendering the login page
    pub async fn notices(&self, cookie: &str) -> Vec<String> {
        let response = self.get("/login", Some(cookie)).await;
        let body = json(response).await;
        body["notices"]
            .as_array()
            .expect("Page should carry notices")
            .iter()
            .map(|n| n.as_str().unwrap().to_string())
            .collect()
    }
}

/// `name=value` of the session cookie set by a response
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("lrms_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

const BOUNDARY: &str = "lrms-test-boundary";

fn multipart_body(region: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"region\"\r\n\r\n{region}\r\n",
            b = BOUNDARY,
            region = region
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/vnd.openxmlformats-officedocument.spreadsheetml.sheet\r\n\r\n",
            b = BOUNDARY,
            f = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

// =============================================================================
// Workbook fixtures
// =============================================================================

/// Sheet name plus rows; the first row is the header
pub type Sheet = (String, Vec<Vec<String>>);

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// A consistent workbook with two learners of the given region, sheets in
/// the conventional order
pub fn valid_sheets(region: &str) -> Vec<Sheet> {
    let profiles = vec![
        row(&["learner_number", "name", "gender", "region", "learning_hub", "program", "class", "co_learner", "grade_level"]),
        row(&["L001", "Jane Doe", "F", region, "Hub 1", "ALS", "A", "Maria", "7"]),
        row(&["L002", "Juan Cruz", "M", region, "Hub 2", "ALS", "B", "", "8"]),
    ];

    let scored = |name: &str| -> Sheet {
        (
            name.to_string(),
            vec![
                row(&["learner_number", "name", "score"]),
                row(&["L001", "Jane Doe", "12"]),
                row(&["L002", "Juan Cruz", "15"]),
            ],
        )
    };

    vec![
        ("learner_profiles".to_string(), profiles),
        scored("pre_confidence_and_self_esteem"),
        scored("post_confidence_and_self_esteem"),
        (
            "attendance".to_string(),
            vec![
                row(&["learner_number", "name", "date", "status"]),
                row(&["L001", "Jane Doe", "2024-06-03", "present"]),
                row(&["L002", "Juan Cruz", "2024-06-03", "absent"]),
            ],
        ),
        (
            "worksheet_score".to_string(),
            vec![
                row(&["learner_number", "name", "ws_number", "score"]),
                row(&["L001", "Jane Doe", "1", "9"]),
            ],
        ),
        (
            "hope_index".to_string(),
            vec![
                row(&["learner_number", "name", "day_number", "am_score", "pm_score"]),
                row(&["L002", "Juan Cruz", "1", "3", "4"]),
            ],
        ),
        scored("pre_competency_evaluation"),
        scored("post_competency_evaluation"),
    ]
}

pub fn without_sheet(mut sheets: Vec<Sheet>, name: &str) -> Vec<Sheet> {
    sheets.retain(|(sheet, _)| sheet != name);
    sheets
}

/// Append a data row to the named sheet
pub fn with_row(mut sheets: Vec<Sheet>, name: &str, cells: &[&str]) -> Vec<Sheet> {
    if let Some((_, rows)) = sheets.iter_mut().find(|(sheet, _)| sheet == name) {
        rows.push(row(cells));
    }
    sheets
}

/// Serialize sheets into `.xlsx` bytes; empty strings are left as blank cells
pub fn workbook_bytes(sheets: &[Sheet]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name).unwrap();
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if !value.is_empty() {
                    worksheet.write_string(r as u32, c as u16, value).unwrap();
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

pub fn write_workbook(path: &Path, sheets: &[Sheet]) {
    std::fs::write(path, workbook_bytes(sheets)).unwrap();
}
