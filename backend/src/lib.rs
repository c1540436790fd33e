//! # LMS Booking Backend
//!
//! Lesson booking, credit accounting and attendance tracking for a language
//! school.
//!
//! ## Features
//!
//! - **Slots**: Expand weekly teacher availability into bookable instants
//! - **Bookings**: Reserve a slot and debit the student's lesson package atomically
//! - **Cancellations**: Notice-period rule and exactly-once credit refunds
//! - **Attendance**: Join/leave logs and per-student attendance statistics
//! - **Calendar**: Best-effort meeting creation through a pluggable client
//! - **HTTP API**: REST endpoints behind an identity gateway
//!
//! ## Architecture
//!
//! - [`models`]: Domain records and the booking state machine
//! - [`db`]: Repository traits with in-memory and Postgres backends
//! - [`services`]: Booking rules, access checks and calendar integration
//! - [`config`]: `lms.toml` loading with environment overrides
//! - [`http`]: Axum-based HTTP server and request handlers

// RepositoryError carries rich context for debugging.
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
