//! FieldOps Inventory Engine
//!
//! Tracks physical stock quantities across (product, location, condition)
//! buckets and guarantees that every change to a quantity is paired,
//! atomically, with an immutable audit entry explaining why it happened.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod models;
pub mod services;

pub use errors::ServiceError;
pub use models::{
    Actor, BucketFilter, BucketKey, LedgerFilter, LedgerSnapshot, LocationRef, Paged, Pagination,
    ProductRef,
};
