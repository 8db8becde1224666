//! Core types and trait definitions for the Accolade achievement backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the domain model, the store traits, authorization scoping and the
//! lifecycle coordinator that keeps the two stores consistent.

// Native `async fn` in traits; `Send` bounds are spelled out on the returned
// futures where the coordinator needs them.
#![allow(async_fn_in_trait)]

pub mod achievement;
pub mod error;
pub mod lifecycle;
pub mod reconcile;
pub mod reference;
pub mod scope;
pub mod store;

pub use error::{Error, Result};
