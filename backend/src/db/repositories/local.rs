//! In-memory repository for unit testing and local development.
//!
//! All state sits behind one mutex, so every trait method observes and
//! mutates a consistent snapshot; that makes the multi-row operations
//! (`reserve_slot`, `cancel_booking`) atomic the same way a database
//! transaction would.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::db::repository::{
    AttendanceRepository, AvailabilityRepository, AvailabilityWrite, BookingRepository,
    CancellationOutcome, ErrorContext, PackageRepository, RepositoryError, RepositoryResult,
    ReservationOutcome, ReservationRules, TransitionOutcome, UserRepository,
};
use crate::models::{
    select_active_package, AttendanceCounts, AttendanceLog, AttendanceLogId, Availability,
    AvailabilityChanges, AvailabilityId, Booking, BookingFilter, BookingId, BookingStatus,
    NewAttendanceLog, NewAvailability, NewBooking, NewPackage, Package, PackageId,
    PackageOverride, Role, SlotOccupancy, StudentStats, User, UserId,
};

#[derive(Debug, Default)]
struct LocalState {
    users: HashMap<UserId, User>,
    availability: HashMap<AvailabilityId, Availability>,
    bookings: HashMap<BookingId, Booking>,
    packages: HashMap<PackageId, Package>,
    attendance: Vec<AttendanceLog>,
    stats: HashMap<UserId, StudentStats>,
    next_id: i64,
}

impl LocalState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn booking(&self, id: BookingId, operation: &str) -> RepositoryResult<&Booking> {
        self.bookings.get(&id).ok_or_else(|| booking_not_found(id, operation))
    }

    fn booking_mut(&mut self, id: BookingId, operation: &str) -> RepositoryResult<&mut Booking> {
        self.bookings
            .get_mut(&id)
            .ok_or_else(|| booking_not_found(id, operation))
    }

    fn overlapping_window(&self, candidate: &Availability) -> Option<Availability> {
        self.availability
            .values()
            .filter(|existing| existing.id != candidate.id)
            .find(|existing| existing.overlaps(candidate))
            .cloned()
    }

    fn active_package_id(&self, user_id: UserId, now: DateTime<Utc>) -> Option<PackageId> {
        select_active_package(
            self.packages.values().filter(|p| p.user_id == user_id),
            now,
        )
        .map(|p| p.id)
    }
}

fn booking_not_found(id: BookingId, operation: &str) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Booking {} not found", id),
        ErrorContext::new(operation)
            .with_entity("booking")
            .with_entity_id(id),
    )
}

/// In-memory implementation of every repository trait.
#[derive(Debug, Clone, Default)]
pub struct LocalRepository {
    state: Arc<Mutex<LocalState>>,
}

impl LocalRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bookings currently stored, whatever their status.
    pub fn booking_count(&self) -> usize {
        self.state.lock().bookings.len()
    }
}

#[async_trait]
impl AvailabilityRepository for LocalRepository {
    async fn insert_availability(
        &self,
        availability: NewAvailability,
    ) -> RepositoryResult<AvailabilityWrite> {
        let mut state = self.state.lock();
        let candidate = availability.into_availability(AvailabilityId(0));
        if let Some(existing) = state.overlapping_window(&candidate) {
            return Ok(AvailabilityWrite::Overlaps { existing });
        }
        let id = AvailabilityId(state.next_id());
        let stored = Availability { id, ..candidate };
        state.availability.insert(id, stored.clone());
        Ok(AvailabilityWrite::Saved(stored))
    }

    async fn update_availability(
        &self,
        id: AvailabilityId,
        changes: AvailabilityChanges,
    ) -> RepositoryResult<AvailabilityWrite> {
        let mut state = self.state.lock();
        let current = state.availability.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Availability {} not found", id),
                ErrorContext::new("update_availability")
                    .with_entity("availability")
                    .with_entity_id(id),
            )
        })?;
        let updated = changes.apply(&current);
        if let Some(existing) = state.overlapping_window(&updated) {
            return Ok(AvailabilityWrite::Overlaps { existing });
        }
        state.availability.insert(id, updated.clone());
        Ok(AvailabilityWrite::Saved(updated))
    }

    async fn get_availability(&self, id: AvailabilityId) -> RepositoryResult<Availability> {
        self.state.lock().availability.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Availability {} not found", id),
                ErrorContext::new("get_availability")
                    .with_entity("availability")
                    .with_entity_id(id),
            )
        })
    }

    async fn list_availability(
        &self,
        teacher_id: Option<UserId>,
        active_only: bool,
    ) -> RepositoryResult<Vec<Availability>> {
        let state = self.state.lock();
        let mut windows: Vec<Availability> = state
            .availability
            .values()
            .filter(|a| teacher_id.map_or(true, |t| a.teacher_id == t))
            .filter(|a| !active_only || a.is_active)
            .cloned()
            .collect();
        windows.sort_by_key(|a| (a.teacher_id, a.day_of_week, a.start_time, a.id));
        Ok(windows)
    }
}

#[async_trait]
impl BookingRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }

    async fn get_booking(&self, id: BookingId) -> RepositoryResult<Booking> {
        self.state.lock().booking(id, "get_booking").cloned()
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> RepositoryResult<Vec<Booking>> {
        let state = self.state.lock();
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.scheduled_at, b.id));
        Ok(bookings)
    }

    async fn fetch_slot_occupancy(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        teacher_id: Option<UserId>,
    ) -> RepositoryResult<Vec<SlotOccupancy>> {
        let state = self.state.lock();
        let mut counts: HashMap<(UserId, DateTime<Utc>), u32> = HashMap::new();
        for booking in state.bookings.values() {
            if !booking.status.occupies_slot()
                || booking.scheduled_at < from
                || booking.scheduled_at >= until
                || teacher_id.map_or(false, |t| booking.teacher_id != t)
            {
                continue;
            }
            *counts
                .entry((booking.teacher_id, booking.scheduled_at))
                .or_insert(0) += 1;
        }
        let mut occupancy: Vec<SlotOccupancy> = counts
            .into_iter()
            .map(|((teacher_id, scheduled_at), booked)| SlotOccupancy {
                teacher_id,
                scheduled_at,
                booked,
            })
            .collect();
        occupancy.sort_by_key(|o| (o.scheduled_at, o.teacher_id));
        Ok(occupancy)
    }

    async fn reserve_slot(
        &self,
        booking: NewBooking,
        rules: ReservationRules,
    ) -> RepositoryResult<ReservationOutcome> {
        let mut state = self.state.lock();

        let mut booked = 0u32;
        for existing in state.bookings.values() {
            if existing.teacher_id != booking.teacher_id
                || existing.scheduled_at != booking.scheduled_at
                || !existing.status.occupies_slot()
            {
                continue;
            }
            if existing.student_id == booking.student_id
                && existing.status == BookingStatus::Scheduled
            {
                return Ok(ReservationOutcome::AlreadyBooked {
                    existing: existing.id,
                });
            }
            booked += 1;
        }
        if booked >= rules.capacity {
            return Ok(ReservationOutcome::SlotFull { booked });
        }

        let Some(package_id) = state.active_package_id(booking.student_id, rules.now) else {
            return Ok(ReservationOutcome::NoActivePackage);
        };
        let Some(package) = state.packages.get_mut(&package_id) else {
            return Err(RepositoryError::internal("active package vanished"));
        };
        if !package.has_credit() {
            return Ok(ReservationOutcome::NoCredit {
                package: package.clone(),
            });
        }
        package.debit();
        let package = package.clone();

        let id = BookingId(state.next_id());
        let stored = booking.into_booking(id, rules.now);
        state.bookings.insert(id, stored.clone());

        Ok(ReservationOutcome::Reserved {
            booking: stored,
            package,
        })
    }

    async fn cancel_booking(
        &self,
        id: BookingId,
        now: DateTime<Utc>,
        refund: bool,
    ) -> RepositoryResult<CancellationOutcome> {
        let mut state = self.state.lock();
        let current = state.booking(id, "cancel_booking")?.clone();
        if current.status.transition(BookingStatus::Cancelled).is_err() {
            return Ok(CancellationOutcome::NotScheduled { booking: current });
        }

        let mut refunded = None;
        if refund {
            let package = state
                .active_package_id(current.student_id, now)
                .and_then(|package_id| state.packages.get_mut(&package_id));
            match package {
                Some(package) => {
                    package.refund();
                    refunded = Some(package.clone());
                }
                None => {
                    return Ok(CancellationOutcome::NoActivePackage { booking: current });
                }
            }
        }

        let booking = state.booking_mut(id, "cancel_booking")?;
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        Ok(CancellationOutcome::Cancelled {
            booking: booking.clone(),
            refunded,
        })
    }

    async fn complete_booking(&self, id: BookingId) -> RepositoryResult<TransitionOutcome> {
        let mut state = self.state.lock();
        let booking = state.booking_mut(id, "complete_booking")?;
        match booking.status.transition(BookingStatus::Completed) {
            Ok(next) => {
                booking.status = next;
                Ok(TransitionOutcome::Applied(booking.clone()))
            }
            Err(_) => Ok(TransitionOutcome::Rejected(booking.clone())),
        }
    }

    async fn mark_attended(&self, id: BookingId, at: DateTime<Utc>) -> RepositoryResult<Booking> {
        let mut state = self.state.lock();
        let booking = state.booking_mut(id, "mark_attended")?;
        if booking.attended_at.is_none() {
            booking.attended_at = Some(at);
        }
        Ok(booking.clone())
    }

    async fn set_external_event_ref(
        &self,
        id: BookingId,
        event_ref: Option<String>,
    ) -> RepositoryResult<Booking> {
        let mut state = self.state.lock();
        let booking = state.booking_mut(id, "set_external_event_ref")?;
        booking.external_event_ref = event_ref;
        Ok(booking.clone())
    }

    async fn delete_booking(&self, id: BookingId) -> RepositoryResult<()> {
        let mut state = self.state.lock();
        if state.bookings.remove(&id).is_none() {
            return Err(booking_not_found(id, "delete_booking"));
        }
        state.attendance.retain(|log| log.booking_id != id);
        Ok(())
    }
}

#[async_trait]
impl PackageRepository for LocalRepository {
    async fn insert_package(
        &self,
        package: NewPackage,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<Package> {
        let mut state = self.state.lock();
        let id = PackageId(state.next_id());
        let stored = package.into_package(id, created_at);
        state.packages.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_package(&self, id: PackageId) -> RepositoryResult<Package> {
        self.state.lock().packages.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Package {} not found", id),
                ErrorContext::new("get_package")
                    .with_entity("package")
                    .with_entity_id(id),
            )
        })
    }

    async fn list_packages(&self, user_id: UserId) -> RepositoryResult<Vec<Package>> {
        let state = self.state.lock();
        let mut packages: Vec<Package> = state
            .packages
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        packages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(packages)
    }

    async fn active_package(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Package>> {
        let state = self.state.lock();
        Ok(state
            .active_package_id(user_id, now)
            .and_then(|id| state.packages.get(&id).cloned()))
    }

    async fn override_package(
        &self,
        id: PackageId,
        changes: PackageOverride,
    ) -> RepositoryResult<Package> {
        let mut state = self.state.lock();
        let package = state.packages.get_mut(&id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Package {} not found", id),
                ErrorContext::new("override_package")
                    .with_entity("package")
                    .with_entity_id(id),
            )
        })?;
        *package = changes.apply(package);
        Ok(package.clone())
    }
}

#[async_trait]
impl AttendanceRepository for LocalRepository {
    async fn append_attendance(&self, log: NewAttendanceLog) -> RepositoryResult<AttendanceLog> {
        let mut state = self.state.lock();
        state.booking(log.booking_id, "append_attendance")?;
        let id = AttendanceLogId(state.next_id());
        let stored = log.into_log(id);
        state.attendance.push(stored.clone());
        Ok(stored)
    }

    async fn list_attendance(&self, booking_id: BookingId) -> RepositoryResult<Vec<AttendanceLog>> {
        let state = self.state.lock();
        let mut logs: Vec<AttendanceLog> = state
            .attendance
            .iter()
            .filter(|log| log.booking_id == booking_id)
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.timestamp, log.id));
        Ok(logs)
    }

    async fn attendance_counts(&self, student_id: UserId) -> RepositoryResult<AttendanceCounts> {
        let state = self.state.lock();
        let completed = state
            .bookings
            .values()
            .filter(|b| b.student_id == student_id && b.status == BookingStatus::Completed);
        let mut counts = AttendanceCounts::default();
        for booking in completed {
            counts.total_classes += 1;
            if booking.attended_at.is_some() {
                counts.attended_classes += 1;
            }
        }
        Ok(counts)
    }

    async fn upsert_student_stats(&self, stats: StudentStats) -> RepositoryResult<StudentStats> {
        self.state.lock().stats.insert(stats.student_id, stats.clone());
        Ok(stats)
    }

    async fn get_student_stats(&self, student_id: UserId) -> RepositoryResult<Option<StudentStats>> {
        Ok(self.state.lock().stats.get(&student_id).cloned())
    }
}

#[async_trait]
impl UserRepository for LocalRepository {
    async fn upsert_user(&self, user: User) -> RepositoryResult<User> {
        self.state.lock().users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let state = self.state.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn list_users_by_role(&self, role: Role) -> RepositoryResult<Vec<User>> {
        let state = self.state.lock();
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }
}
