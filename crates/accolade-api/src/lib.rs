//! JSON REST API for Accolade.
//!
//! Exposes an axum [`Router`] over a [`Coordinator`]. Authentication, TLS
//! and transport concerns are the caller's responsibility: every request
//! must arrive with a verified [`accolade_core::scope::Actor`] in its
//! extensions (see [`Caller`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", accolade_api::api_router(Arc::new(coordinator)))
//! ```

pub mod achievements;
pub mod caller;
pub mod details;
pub mod error;
pub mod reconciliation;
pub mod students;

use std::sync::Arc;

use accolade_core::{
  lifecycle::Coordinator,
  store::{DetailStore, Directory, ReferenceStore},
};
use axum::{
  Router,
  routing::{delete, get, post, put},
};

pub use caller::Caller;
pub use error::ApiError;

/// Build a fully-materialised API router for `coordinator`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<D, R, Dir>(coordinator: Arc<Coordinator<D, R, Dir>>) -> Router<()>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Router::new()
    // Achievements
    .route(
      "/achievements",
      get(achievements::list::<D, R, Dir>).post(achievements::create::<D, R, Dir>),
    )
    .route("/achievements/tags/{tag}", get(achievements::find_by_tag::<D, R, Dir>))
    .route(
      "/achievements/{id}",
      put(achievements::update::<D, R, Dir>).delete(achievements::delete::<D, R, Dir>),
    )
    .route("/achievements/{id}/history", get(achievements::history::<D, R, Dir>))
    .route(
      "/achievements/{id}/attachments",
      post(achievements::add_attachment::<D, R, Dir>),
    )
    .route(
      "/achievements/{id}/attachments/{file_name}",
      delete(achievements::remove_attachment::<D, R, Dir>),
    )
    .route("/achievements/{id}/submit", post(achievements::submit::<D, R, Dir>))
    .route("/achievements/{id}/verify", post(achievements::verify::<D, R, Dir>))
    .route("/achievements/{id}/reject", post(achievements::reject::<D, R, Dir>))
    .route("/achievements/{id}/purge", delete(achievements::purge::<D, R, Dir>))
    // Reads by owner and by document
    .route("/students/{id}/achievements", get(students::achievements::<D, R, Dir>))
    .route("/details/{id}", get(details::get_one::<D, R, Dir>))
    // Administration
    .route("/reconciliation", get(reconciliation::list::<D, R, Dir>))
    .route(
      "/reconciliation/{detail_id}",
      delete(reconciliation::acknowledge::<D, R, Dir>),
    )
    .with_state(coordinator)
}
