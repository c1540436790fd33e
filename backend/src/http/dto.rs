//! Request and response bodies that exist only at the HTTP boundary.
//!
//! Most payloads are service types that already derive
//! `Serialize`/`Deserialize`; they are re-exported here for handler imports.

use serde::{Deserialize, Serialize};

pub use crate::models::{
    AttendanceLog, Availability, AvailabilityChanges, Booking, BookingFilter, NewPackage, Package,
    PackageOverride, StudentStats, User,
};
pub use crate::services::{
    AttendanceReceipt, AttendanceRequest, AvailabilityRequest, BookingReceipt, BookingRequest,
    CancellationReceipt, ServiceWarning, Slot, SlotQuery,
};

use crate::models::{BookingId, Role};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub calendar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotListResponse {
    pub slots: Vec<Slot>,
    pub total: usize,
}

/// `GET /v1/availability` query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    #[serde(default)]
    pub teacher_id: Option<crate::models::UserId>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBookingResponse {
    pub booking_id: BookingId,
    pub deleted: bool,
    pub warnings: Vec<ServiceWarning>,
}

/// `PUT /v1/users/{id}` body; the id comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub display_name: String,
    pub role: Role,
}
