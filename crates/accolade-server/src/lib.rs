//! HTTP server for Accolade.
//!
//! Wraps the [`accolade_api`] router with Basic authentication and request
//! tracing, and wires it to the SQLite stores.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use accolade_core::lifecycle::{Coordinator, CoordinatorSettings};
use accolade_store_sqlite::{
  Lecturer, SqliteDetailStore, SqliteReferenceStore, Student,
};
use axum::{Router, middleware};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AccountConfig, authenticate};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub reference_store_path: PathBuf,
  pub detail_store_path:    PathBuf,
  #[serde(default = "default_store_timeout_ms")]
  pub store_timeout_ms:     u64,
  #[serde(default = "default_read_retries")]
  pub read_retries:         u32,
  #[serde(default)]
  pub accounts:             Vec<AccountConfig>,
  /// Upserted into the directory at startup.
  #[serde(default)]
  pub lecturers:            Vec<Lecturer>,
  #[serde(default)]
  pub students:             Vec<Student>,
}

fn default_store_timeout_ms() -> u64 { 5000 }

fn default_read_retries() -> u32 { 1 }

impl ServerConfig {
  pub fn coordinator_settings(&self) -> CoordinatorSettings {
    CoordinatorSettings {
      store_timeout: Duration::from_millis(self.store_timeout_ms),
      read_retries:  self.read_retries,
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

pub type SqliteCoordinator =
  Coordinator<SqliteDetailStore, SqliteReferenceStore, SqliteReferenceStore>;

/// Everything the router needs.
#[derive(Clone)]
pub struct AppState {
  pub coordinator: Arc<SqliteCoordinator>,
  pub accounts:    Arc<[AccountConfig]>,
}

impl AppState {
  pub fn new(
    details: SqliteDetailStore,
    references: SqliteReferenceStore,
    config: &ServerConfig,
  ) -> Self {
    let references = Arc::new(references);
    let coordinator = Coordinator::new(
      Arc::new(details),
      Arc::clone(&references),
      references,
    )
    .with_settings(config.coordinator_settings());

    Self {
      coordinator: Arc::new(coordinator),
      accounts:    config.accounts.clone().into(),
    }
  }
}

/// Upsert the configured lecturers, then students, so advisor references
/// resolve.
pub async fn seed_directory(
  store: &SqliteReferenceStore,
  config: &ServerConfig,
) -> accolade_store_sqlite::Result<()> {
  for lecturer in &config.lecturers {
    store.upsert_lecturer(lecturer).await?;
  }
  for student in &config.students {
    store.upsert_student(student).await?;
  }
  tracing::info!(
    lecturers = config.lecturers.len(),
    students = config.students.len(),
    "directory seeded"
  );
  Ok(())
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router: the API under `/api`, behind Basic
/// authentication.
pub fn router(state: AppState) -> Router {
  Router::new()
    .nest("/api", accolade_api::api_router(state.coordinator))
    .layer(middleware::from_fn_with_state(state.accounts, authenticate))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use accolade_core::scope::Actor;
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  fn make_config() -> ServerConfig {
    let lecturer = Lecturer {
      lecturer_id:     Uuid::new_v4(),
      user_id:         Uuid::new_v4(),
      lecturer_number: "L-1".into(),
      department:      "Mathematics".into(),
    };
    let student = Student {
      student_id:     Uuid::new_v4(),
      user_id:        Uuid::new_v4(),
      student_number: "S-1".into(),
      program_study:  "Mathematics".into(),
      academic_year:  "2024".into(),
      advisor_id:     Some(lecturer.lecturer_id),
    };

    ServerConfig {
      host:                 "127.0.0.1".to_string(),
      port:                 8080,
      reference_store_path: PathBuf::from(":memory:"),
      detail_store_path:    PathBuf::from(":memory:"),
      store_timeout_ms:     default_store_timeout_ms(),
      read_retries:         default_read_retries(),
      accounts:             vec![
        AccountConfig {
          username:      "siti".into(),
          password_hash: hash("secret"),
          actor:         Actor::Student {
            user_id:    student.user_id,
            student_id: student.student_id,
          },
        },
        AccountConfig {
          username:      "budi".into(),
          password_hash: hash("lecture"),
          actor:         Actor::Advisor {
            user_id:     lecturer.user_id,
            lecturer_id: lecturer.lecturer_id,
          },
        },
      ],
      lecturers:            vec![lecturer],
      students:             vec![student],
    }
  }

  async fn make_app() -> Router {
    let config = make_config();
    let details = SqliteDetailStore::open_in_memory().await.unwrap();
    let references = SqliteReferenceStore::open_in_memory().await.unwrap();
    seed_directory(&references, &config).await.unwrap();
    router(AppState::new(details, references, &config))
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<String>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    if body.is_some() {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let req = builder
      .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  #[test]
  fn settings_come_from_config() {
    let settings = make_config().coordinator_settings();
    assert_eq!(settings.store_timeout, Duration::from_secs(5));
    assert_eq!(settings.read_retries, 1);
  }

  #[tokio::test]
  async fn missing_credentials_get_a_challenge() {
    let app = make_app().await;
    let req = Request::builder()
      .uri("/api/achievements")
      .body(Body::empty())
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
    assert_eq!(challenge, "Basic realm=\"accolade\"");
  }

  #[tokio::test]
  async fn wrong_password_is_rejected() {
    let app = make_app().await;
    let (status, _) = send(
      &app,
      "GET",
      "/api/achievements",
      Some(auth_header("siti", "wrong")),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn student_submits_and_advisor_verifies() {
    let app = make_app().await;
    let student = Some(auth_header("siti", "secret"));
    let advisor = Some(auth_header("budi", "lecture"));

    let (status, created) = send(
      &app,
      "POST",
      "/api/achievements",
      student.clone(),
      Some(json!({
        "title": "Olympiad",
        "type": "competition",
        "details": {
          "competition_name": "International Mathematical Olympiad",
          "level": "international",
          "rank": 3,
          "medal": "bronze",
          "event_date": null,
          "location": null,
          "organizer": null
        },
        "tags": ["math"]
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let id = created["reference"]["reference_id"].as_str().unwrap();

    let (status, _) = send(
      &app,
      "POST",
      &format!("/api/achievements/{id}/submit"),
      student.clone(),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, queue) = send(
      &app,
      "GET",
      "/api/achievements?status=submitted",
      advisor.clone(),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let (status, verified) = send(
      &app,
      "POST",
      &format!("/api/achievements/{id}/verify"),
      advisor,
      Some(json!({ "points": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["status"], "verified");

    let detail_id = created["detail"]["detail_id"].as_str().unwrap();
    let (status, detail) = send(
      &app,
      "GET",
      &format!("/api/details/{detail_id}"),
      student,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["points"], 50);
  }

  #[tokio::test]
  async fn seeding_twice_is_harmless() {
    let config = make_config();
    let references = SqliteReferenceStore::open_in_memory().await.unwrap();
    seed_directory(&references, &config).await.unwrap();
    seed_directory(&references, &config).await.unwrap();
  }
}
