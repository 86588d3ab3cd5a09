//! Core types and the schema loader for the Roost listing warehouse.
//!
//! The warehouse is a star schema: `fact_reviews` references the three
//! dimensions `dim_date`, `dim_hosts` and `dim_listings`. This crate validates
//! raw source records against the constraints the schema declares and hands
//! accepted rows to a [`store::Warehouse`] backend in dependency order.
//!
//! This crate is free of database dependencies; `roost-store-sqlite` provides
//! the concrete backend.

// Native `async fn` in traits; the `Send` bounds are spelled out on the trait.
#![allow(async_fn_in_trait)]

pub mod calendar;
pub mod error;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod raw;
pub mod store;

pub use error::{Error, Rejection, Result, Violation, ViolationKind};
