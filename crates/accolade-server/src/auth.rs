//! HTTP Basic authentication against the configured accounts.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use std::sync::Arc;

use accolade_core::scope::Actor;

use crate::error::Error;

/// One login. The remaining keys of the table describe who the login acts
/// as, e.g. `role = "advisor"`, `user_id = "…"`, `lecturer_id = "…"`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  #[serde(flatten)]
  pub actor:         Actor,
}

/// Resolve the `Authorization` header to the actor of a configured account.
pub fn verify_auth(
  headers: &HeaderMap,
  accounts: &[AccountConfig],
) -> Result<Actor, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let account = accounts
    .iter()
    .find(|a| a.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(account.actor)
}

/// Middleware: reject unauthenticated requests, otherwise attach the
/// caller's [`Actor`] for the API handlers.
pub async fn authenticate(
  State(accounts): State<Arc<[AccountConfig]>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let actor = match verify_auth(req.headers(), &accounts) {
    Ok(actor) => actor,
    Err(e) => {
      tracing::debug!(path = %req.uri().path(), "rejected credentials");
      return Err(e);
    }
  };
  req.extensions_mut().insert(actor);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{HeaderValue, header};
  use rand_core::OsRng;
  use uuid::Uuid;

  fn account(username: &str, password: &str, actor: Actor) -> AccountConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AccountConfig {
      username: username.to_string(),
      password_hash: hash,
      actor,
    }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  fn accounts() -> (Vec<AccountConfig>, Actor, Actor) {
    let student = Actor::Student {
      user_id:    Uuid::new_v4(),
      student_id: Uuid::new_v4(),
    };
    let admin = Actor::Admin { user_id: Uuid::new_v4() };
    (
      vec![account("siti", "secret", student), account("root", "hunter2", admin)],
      student,
      admin,
    )
  }

  #[test]
  fn correct_credentials_resolve_the_actor() {
    let (accounts, student, admin) = accounts();
    assert_eq!(verify_auth(&headers(&basic("siti", "secret")), &accounts).unwrap(), student);
    assert_eq!(verify_auth(&headers(&basic("root", "hunter2")), &accounts).unwrap(), admin);
  }

  #[test]
  fn wrong_password() {
    let (accounts, ..) = accounts();
    let res = verify_auth(&headers(&basic("siti", "hunter2")), &accounts);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let (accounts, ..) = accounts();
    let res = verify_auth(&headers(&basic("nobody", "secret")), &accounts);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let (accounts, ..) = accounts();
    let res = verify_auth(&HeaderMap::new(), &accounts);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let (accounts, ..) = accounts();
    let res = verify_auth(&headers("Basic !!!not-base64!!!"), &accounts);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn account_table_flattens_the_actor() {
    let lecturer_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let raw = serde_json::json!({
      "username": "budi",
      "password_hash": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA",
      "role": "advisor",
      "user_id": user_id,
      "lecturer_id": lecturer_id,
    });
    let parsed: AccountConfig = serde_json::from_value(raw).unwrap();
    assert_eq!(parsed.username, "budi");
    assert_eq!(parsed.actor, Actor::Advisor { user_id, lecturer_id });
  }
}
