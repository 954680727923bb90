//! Core types and trait definitions for Knot, the identity reconciliation
//! service.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! [`resolver::Resolver`] talks to storage only through the
//! [`store::ContactStore`] trait; [`memory::MemoryStore`] is the in-process
//! backend used by tests.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod contact;
pub mod error;
pub mod locks;
pub mod memory;
pub mod resolver;
pub mod store;
pub mod view;

pub use error::{Error, Result};
