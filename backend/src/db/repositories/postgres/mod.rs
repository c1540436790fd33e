//! Postgres repository implementation using Diesel.
//!
//! Tables are described in `schema.rs` and created by the embedded
//! migrations under `migrations/`. The server never applies them itself;
//! `lms-migrate` calls [`PostgresRepository::run_pending_migrations`].
//!
//! ## Atomic operations
//!
//! `reserve_slot`, `cancel_booking` and the availability writes run inside
//! SERIALIZABLE transactions and lock the rows they read with
//! `SELECT ... FOR UPDATE`. A serialization failure surfaces as a retryable
//! error and is replayed by [`PostgresRepository::with_conn`]. The partial
//! unique index `bookings_live_slot_unique` is the last line against a
//! student holding two live bookings for the same slot.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::upsert::excluded;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

use crate::db::repository::{
    AttendanceRepository, AvailabilityRepository, AvailabilityWrite, BookingRepository,
    CancellationOutcome, ErrorContext, PackageRepository, RepositoryError, RepositoryResult,
    ReservationOutcome, ReservationRules, TransitionOutcome, UserRepository,
};
use crate::models::{
    AttendanceCounts, AttendanceLog, Availability, AvailabilityChanges, AvailabilityId, Booking,
    BookingFilter, BookingId, BookingStatus, NewAttendanceLog, NewAvailability, NewBooking,
    NewPackage, Package, PackageId, PackageOverride, Role, SlotOccupancy, StudentStats, User,
    UserId,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(fallback)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;
        Ok(Self::with_url(database_url).apply_env())
    }

    /// Overlay `PG_*` tuning variables on top of `self`.
    pub fn apply_env(self) -> Self {
        Self {
            max_pool_size: env_or("PG_POOL_MAX", self.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", self.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", self.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", self.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", self.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", self.retry_delay_ms),
            ..self
        }
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Build the connection pool. Does not touch the schema.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        Ok(Self {
            pool,
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Apply every embedded migration not yet recorded in the database.
    /// Returns the versions that ran.
    pub async fn run_pending_migrations(&self) -> RepositoryResult<Vec<String>> {
        self.with_conn(|conn| {
            conn.run_pending_migrations(MIGRATIONS)
                .map(|versions| versions.iter().map(|v| v.to_string()).collect())
                .map_err(|e| {
                    RepositoryError::internal_with_context(
                        format!("Migration failed: {}", e),
                        ErrorContext::new("run_pending_migrations"),
                    )
                })
        })
        .await
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// Retries up to `max_retries` times on connection errors, timeouts and
    /// serialization failures, doubling the delay each time.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(attempt, "retrying database operation");
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::timeout_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Current pool state and query counters.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }

    pub async fn is_healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }

    /// Returns `(is_healthy, latency_ms, error_message)`.
    pub async fn health_check_detailed(&self) -> (bool, Option<u64>, Option<String>) {
        let start = Instant::now();
        match self.health_check().await {
            Ok(true) => (true, Some(start.elapsed().as_millis() as u64), None),
            Ok(false) => (
                false,
                Some(start.elapsed().as_millis() as u64),
                Some("Health check returned false".to_string()),
            ),
            Err(e) => (
                false,
                Some(start.elapsed().as_millis() as u64),
                Some(e.to_string()),
            ),
        }
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn not_found(entity: &str, id: i64, operation: &str) -> RepositoryError {
    let mut label = entity.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    RepositoryError::not_found_with_context(
        format!("{} {} not found", label, id),
        ErrorContext::new(operation)
            .with_entity(entity)
            .with_entity_id(id),
    )
}

fn load_booking(conn: &mut PgConnection, id: BookingId, lock: bool) -> RepositoryResult<Booking> {
    let query = bookings::table
        .find(id.value())
        .select(BookingRow::as_select());
    let row = if lock {
        query.for_update().first::<BookingRow>(conn).optional()
    } else {
        query.first::<BookingRow>(conn).optional()
    }
    .map_err(map_diesel_error)?;
    row.ok_or_else(|| not_found("booking", id.value(), "load_booking"))?
        .into_booking()
}

/// The student's active package, locked for the rest of the transaction.
fn lock_active_package(
    conn: &mut PgConnection,
    user_id: UserId,
    now: DateTime<Utc>,
) -> RepositoryResult<Option<Package>> {
    let row = packages::table
        .filter(packages::user_id.eq(user_id.value()))
        .filter(packages::valid_until.ge(now))
        .order((packages::created_at.desc(), packages::package_id.desc()))
        .select(PackageRow::as_select())
        .for_update()
        .first::<PackageRow>(conn)
        .optional()
        .map_err(map_diesel_error)?;
    Ok(row.map(Package::from))
}

fn store_package_counters(conn: &mut PgConnection, package: &Package) -> RepositoryResult<Package> {
    diesel::update(packages::table.find(package.id.value()))
        .set((
            packages::total_lessons.eq(package.total_lessons),
            packages::used_lessons.eq(package.used_lessons),
            packages::remaining_lessons.eq(package.remaining_lessons),
            packages::valid_until.eq(package.valid_until),
        ))
        .returning(PackageRow::as_returning())
        .get_result::<PackageRow>(conn)
        .map(Package::from)
        .map_err(map_diesel_error)
}

/// First active window of the same teacher and day overlapping `candidate`.
fn find_overlap(
    conn: &mut PgConnection,
    candidate: &Availability,
) -> RepositoryResult<Option<Availability>> {
    if !candidate.is_active {
        return Ok(None);
    }
    let rows = availability::table
        .filter(availability::teacher_id.eq(candidate.teacher_id.value()))
        .filter(availability::day_of_week.eq(i16::from(candidate.day_of_week.index())))
        .filter(availability::is_active.eq(true))
        .filter(availability::availability_id.ne(candidate.id.value()))
        .order(availability::start_time.asc())
        .select(AvailabilityRow::as_select())
        .for_update()
        .load::<AvailabilityRow>(conn)
        .map_err(map_diesel_error)?;
    for row in rows {
        let existing = row.into_availability()?;
        if existing.overlaps(candidate) {
            return Ok(Some(existing));
        }
    }
    Ok(None)
}

#[async_trait]
impl AvailabilityRepository for PostgresRepository {
    async fn insert_availability(
        &self,
        new_window: NewAvailability,
    ) -> RepositoryResult<AvailabilityWrite> {
        self.with_conn(move |conn| {
            conn.build_transaction().serializable().run(|tx| {
                let candidate = new_window.clone().into_availability(AvailabilityId(0));
                if let Some(existing) = find_overlap(tx, &candidate)? {
                    return Ok(AvailabilityWrite::Overlaps { existing });
                }
                let stored = diesel::insert_into(availability::table)
                    .values(NewAvailabilityRow::from(&new_window))
                    .returning(AvailabilityRow::as_returning())
                    .get_result::<AvailabilityRow>(tx)
                    .map_err(map_diesel_error)?
                    .into_availability()?;
                Ok(AvailabilityWrite::Saved(stored))
            })
        })
        .await
    }

    async fn update_availability(
        &self,
        id: AvailabilityId,
        changes: AvailabilityChanges,
    ) -> RepositoryResult<AvailabilityWrite> {
        self.with_conn(move |conn| {
            conn.build_transaction().serializable().run(|tx| {
                let current = availability::table
                    .find(id.value())
                    .select(AvailabilityRow::as_select())
                    .for_update()
                    .first::<AvailabilityRow>(tx)
                    .optional()
                    .map_err(map_diesel_error)?
                    .ok_or_else(|| not_found("availability", id.value(), "update_availability"))?
                    .into_availability()?;
                let updated = changes.apply(&current);
                if let Some(existing) = find_overlap(tx, &updated)? {
                    return Ok(AvailabilityWrite::Overlaps { existing });
                }
                let stored = diesel::update(availability::table.find(id.value()))
                    .set((
                        availability::start_time.eq(updated.start_time.as_naive()),
                        availability::end_time.eq(updated.end_time.as_naive()),
                        availability::is_active.eq(updated.is_active),
                    ))
                    .returning(AvailabilityRow::as_returning())
                    .get_result::<AvailabilityRow>(tx)
                    .map_err(map_diesel_error)?
                    .into_availability()?;
                Ok(AvailabilityWrite::Saved(stored))
            })
        })
        .await
    }

    async fn get_availability(&self, id: AvailabilityId) -> RepositoryResult<Availability> {
        self.with_conn(move |conn| {
            availability::table
                .find(id.value())
                .select(AvailabilityRow::as_select())
                .first::<AvailabilityRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or_else(|| not_found("availability", id.value(), "get_availability"))?
                .into_availability()
        })
        .await
    }

    async fn list_availability(
        &self,
        teacher_id: Option<UserId>,
        active_only: bool,
    ) -> RepositoryResult<Vec<Availability>> {
        self.with_conn(move |conn| {
            let mut query = availability::table.into_boxed();
            if let Some(teacher) = teacher_id {
                query = query.filter(availability::teacher_id.eq(teacher.value()));
            }
            if active_only {
                query = query.filter(availability::is_active.eq(true));
            }
            query
                .order((
                    availability::teacher_id.asc(),
                    availability::day_of_week.asc(),
                    availability::start_time.asc(),
                    availability::availability_id.asc(),
                ))
                .select(AvailabilityRow::as_select())
                .load::<AvailabilityRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(AvailabilityRow::into_availability)
                .collect()
        })
        .await
    }
}

#[async_trait]
impl BookingRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_booking(&self, id: BookingId) -> RepositoryResult<Booking> {
        self.with_conn(move |conn| load_booking(conn, id, false)).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> RepositoryResult<Vec<Booking>> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut query = bookings::table.into_boxed();
            if let Some(student) = filter.student_id {
                query = query.filter(bookings::student_id.eq(student.value()));
            }
            if let Some(teacher) = filter.teacher_id {
                query = query.filter(bookings::teacher_id.eq(teacher.value()));
            }
            if let Some(status) = filter.status {
                query = query.filter(bookings::status.eq(status.as_str()));
            }
            query
                .order((bookings::scheduled_at.asc(), bookings::booking_id.asc()))
                .select(BookingRow::as_select())
                .load::<BookingRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(BookingRow::into_booking)
                .collect()
        })
        .await
    }

    async fn fetch_slot_occupancy(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        teacher_id: Option<UserId>,
    ) -> RepositoryResult<Vec<SlotOccupancy>> {
        self.with_conn(move |conn| {
            let live = bookings::table
                .filter(bookings::status.ne(BookingStatus::Cancelled.as_str()))
                .filter(bookings::scheduled_at.ge(from))
                .filter(bookings::scheduled_at.lt(until));
            let rows = match teacher_id {
                Some(teacher) => live
                    .filter(bookings::teacher_id.eq(teacher.value()))
                    .group_by((bookings::teacher_id, bookings::scheduled_at))
                    .select((bookings::teacher_id, bookings::scheduled_at, count_star()))
                    .order((bookings::scheduled_at.asc(), bookings::teacher_id.asc()))
                    .load::<(i64, DateTime<Utc>, i64)>(conn),
                None => live
                    .group_by((bookings::teacher_id, bookings::scheduled_at))
                    .select((bookings::teacher_id, bookings::scheduled_at, count_star()))
                    .order((bookings::scheduled_at.asc(), bookings::teacher_id.asc()))
                    .load::<(i64, DateTime<Utc>, i64)>(conn),
            }
            .map_err(map_diesel_error)?;

            Ok(rows
                .into_iter()
                .map(|(teacher, scheduled_at, booked)| SlotOccupancy {
                    teacher_id: UserId(teacher),
                    scheduled_at,
                    booked: u32::try_from(booked).unwrap_or(u32::MAX),
                })
                .collect())
        })
        .await
    }

    async fn reserve_slot(
        &self,
        booking: NewBooking,
        rules: ReservationRules,
    ) -> RepositoryResult<ReservationOutcome> {
        self.with_conn(move |conn| {
            conn.build_transaction().serializable().run(|tx| {
                let live = bookings::table
                    .filter(bookings::teacher_id.eq(booking.teacher_id.value()))
                    .filter(bookings::scheduled_at.eq(booking.scheduled_at))
                    .filter(bookings::status.ne(BookingStatus::Cancelled.as_str()))
                    .select(BookingRow::as_select())
                    .for_update()
                    .load::<BookingRow>(tx)
                    .map_err(map_diesel_error)?;

                if let Some(existing) = live.iter().find(|row| {
                    row.student_id == booking.student_id.value()
                        && row.status == BookingStatus::Scheduled.as_str()
                }) {
                    return Ok(ReservationOutcome::AlreadyBooked {
                        existing: BookingId(existing.booking_id),
                    });
                }
                let booked = u32::try_from(live.len()).unwrap_or(u32::MAX);
                if booked >= rules.capacity {
                    return Ok(ReservationOutcome::SlotFull { booked });
                }

                let Some(mut package) = lock_active_package(tx, booking.student_id, rules.now)?
                else {
                    return Ok(ReservationOutcome::NoActivePackage);
                };
                if !package.has_credit() {
                    return Ok(ReservationOutcome::NoCredit { package });
                }
                package.debit();
                let package = store_package_counters(tx, &package)?;

                let stored = diesel::insert_into(bookings::table)
                    .values(NewBookingRow::new(&booking, rules.now))
                    .returning(BookingRow::as_returning())
                    .get_result::<BookingRow>(tx)
                    .map_err(map_diesel_error)?
                    .into_booking()?;

                Ok(ReservationOutcome::Reserved {
                    booking: stored,
                    package,
                })
            })
        })
        .await
    }

    async fn cancel_booking(
        &self,
        id: BookingId,
        now: DateTime<Utc>,
        refund: bool,
    ) -> RepositoryResult<CancellationOutcome> {
        self.with_conn(move |conn| {
            conn.build_transaction().serializable().run(|tx| {
                let current = load_booking(tx, id, true)?;
                if current.status.transition(BookingStatus::Cancelled).is_err() {
                    return Ok(CancellationOutcome::NotScheduled { booking: current });
                }

                let refunded = if refund {
                    match lock_active_package(tx, current.student_id, now)? {
                        Some(mut package) => {
                            package.refund();
                            Some(store_package_counters(tx, &package)?)
                        }
                        None => {
                            return Ok(CancellationOutcome::NoActivePackage { booking: current });
                        }
                    }
                } else {
                    None
                };

                let booking = diesel::update(bookings::table.find(id.value()))
                    .set((
                        bookings::status.eq(BookingStatus::Cancelled.as_str()),
                        bookings::cancelled_at.eq(Some(now)),
                    ))
                    .returning(BookingRow::as_returning())
                    .get_result::<BookingRow>(tx)
                    .map_err(map_diesel_error)?
                    .into_booking()?;

                Ok(CancellationOutcome::Cancelled { booking, refunded })
            })
        })
        .await
    }

    async fn complete_booking(&self, id: BookingId) -> RepositoryResult<TransitionOutcome> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let current = load_booking(tx, id, true)?;
                let next = match current.status.transition(BookingStatus::Completed) {
                    Ok(next) => next,
                    Err(_) => return Ok(TransitionOutcome::Rejected(current)),
                };
                let booking = diesel::update(bookings::table.find(id.value()))
                    .set(bookings::status.eq(next.as_str()))
                    .returning(BookingRow::as_returning())
                    .get_result::<BookingRow>(tx)
                    .map_err(map_diesel_error)?
                    .into_booking()?;
                Ok(TransitionOutcome::Applied(booking))
            })
        })
        .await
    }

    async fn mark_attended(&self, id: BookingId, at: DateTime<Utc>) -> RepositoryResult<Booking> {
        self.with_conn(move |conn| {
            diesel::update(
                bookings::table
                    .find(id.value())
                    .filter(bookings::attended_at.is_null()),
            )
            .set(bookings::attended_at.eq(Some(at)))
            .execute(conn)
            .map_err(map_diesel_error)?;
            load_booking(conn, id, false)
        })
        .await
    }

    async fn set_external_event_ref(
        &self,
        id: BookingId,
        event_ref: Option<String>,
    ) -> RepositoryResult<Booking> {
        self.with_conn(move |conn| {
            diesel::update(bookings::table.find(id.value()))
                .set(bookings::external_event_ref.eq(event_ref))
                .returning(BookingRow::as_returning())
                .get_result::<BookingRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .ok_or_else(|| not_found("booking", id.value(), "set_external_event_ref"))?
                .into_booking()
        })
        .await
    }

    async fn delete_booking(&self, id: BookingId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            // attendance_logs rows go with the booking through ON DELETE CASCADE
            let deleted = diesel::delete(bookings::table.find(id.value()))
                .execute(conn)
                .map_err(map_diesel_error)?;
            if deleted == 0 {
                return Err(not_found("booking", id.value(), "delete_booking"));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl PackageRepository for PostgresRepository {
    async fn insert_package(
        &self,
        package: NewPackage,
        created_at: DateTime<Utc>,
    ) -> RepositoryResult<Package> {
        self.with_conn(move |conn| {
            diesel::insert_into(packages::table)
                .values(NewPackageRow::new(&package, created_at))
                .returning(PackageRow::as_returning())
                .get_result::<PackageRow>(conn)
                .map(Package::from)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_package(&self, id: PackageId) -> RepositoryResult<Package> {
        self.with_conn(move |conn| {
            packages::table
                .find(id.value())
                .select(PackageRow::as_select())
                .first::<PackageRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(Package::from)
                .ok_or_else(|| not_found("package", id.value(), "get_package"))
        })
        .await
    }

    async fn list_packages(&self, user_id: UserId) -> RepositoryResult<Vec<Package>> {
        self.with_conn(move |conn| {
            packages::table
                .filter(packages::user_id.eq(user_id.value()))
                .order((packages::created_at.desc(), packages::package_id.desc()))
                .select(PackageRow::as_select())
                .load::<PackageRow>(conn)
                .map(|rows| rows.into_iter().map(Package::from).collect())
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn active_package(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Package>> {
        self.with_conn(move |conn| {
            packages::table
                .filter(packages::user_id.eq(user_id.value()))
                .filter(packages::valid_until.ge(now))
                .order((packages::created_at.desc(), packages::package_id.desc()))
                .select(PackageRow::as_select())
                .first::<PackageRow>(conn)
                .optional()
                .map(|row| row.map(Package::from))
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn override_package(
        &self,
        id: PackageId,
        changes: PackageOverride,
    ) -> RepositoryResult<Package> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let current = packages::table
                    .find(id.value())
                    .select(PackageRow::as_select())
                    .for_update()
                    .first::<PackageRow>(tx)
                    .optional()
                    .map_err(map_diesel_error)?
                    .map(Package::from)
                    .ok_or_else(|| not_found("package", id.value(), "override_package"))?;
                store_package_counters(tx, &changes.apply(&current))
            })
        })
        .await
    }
}

#[async_trait]
impl AttendanceRepository for PostgresRepository {
    async fn append_attendance(&self, log: NewAttendanceLog) -> RepositoryResult<AttendanceLog> {
        self.with_conn(move |conn| {
            diesel::insert_into(attendance_logs::table)
                .values(NewAttendanceLogRow::from(&log))
                .returning(AttendanceLogRow::as_returning())
                .get_result::<AttendanceLogRow>(conn)
                .map_err(|e| match e {
                    diesel::result::Error::DatabaseError(
                        diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                        _,
                    ) => not_found("booking", log.booking_id.value(), "append_attendance"),
                    other => map_diesel_error(other),
                })?
                .into_log()
        })
        .await
    }

    async fn list_attendance(&self, booking_id: BookingId) -> RepositoryResult<Vec<AttendanceLog>> {
        self.with_conn(move |conn| {
            attendance_logs::table
                .filter(attendance_logs::booking_id.eq(booking_id.value()))
                .order((
                    attendance_logs::logged_at.asc(),
                    attendance_logs::attendance_log_id.asc(),
                ))
                .select(AttendanceLogRow::as_select())
                .load::<AttendanceLogRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(AttendanceLogRow::into_log)
                .collect()
        })
        .await
    }

    async fn attendance_counts(&self, student_id: UserId) -> RepositoryResult<AttendanceCounts> {
        self.with_conn(move |conn| {
            let attended: Vec<Option<DateTime<Utc>>> = bookings::table
                .filter(bookings::student_id.eq(student_id.value()))
                .filter(bookings::status.eq(BookingStatus::Completed.as_str()))
                .select(bookings::attended_at)
                .load(conn)
                .map_err(map_diesel_error)?;
            Ok(AttendanceCounts {
                total_classes: attended.len() as i32,
                attended_classes: attended.iter().filter(|at| at.is_some()).count() as i32,
            })
        })
        .await
    }

    async fn upsert_student_stats(&self, stats: StudentStats) -> RepositoryResult<StudentStats> {
        self.with_conn(move |conn| {
            diesel::insert_into(student_stats::table)
                .values(StudentStatsRow::from(&stats))
                .on_conflict(student_stats::student_id)
                .do_update()
                .set((
                    student_stats::total_classes.eq(excluded(student_stats::total_classes)),
                    student_stats::attended_classes.eq(excluded(student_stats::attended_classes)),
                    student_stats::attendance_rate.eq(excluded(student_stats::attendance_rate)),
                    student_stats::updated_at.eq(excluded(student_stats::updated_at)),
                ))
                .returning(StudentStatsRow::as_returning())
                .get_result::<StudentStatsRow>(conn)
                .map(StudentStats::from)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn get_student_stats(&self, student_id: UserId) -> RepositoryResult<Option<StudentStats>> {
        self.with_conn(move |conn| {
            student_stats::table
                .find(student_id.value())
                .select(StudentStatsRow::as_select())
                .first::<StudentStatsRow>(conn)
                .optional()
                .map(|row| row.map(StudentStats::from))
                .map_err(map_diesel_error)
        })
        .await
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn upsert_user(&self, user: User) -> RepositoryResult<User> {
        self.with_conn(move |conn| {
            diesel::insert_into(users::table)
                .values(UserRow::from_user(&user))
                .on_conflict(users::user_id)
                .do_update()
                .set((
                    users::display_name.eq(excluded(users::display_name)),
                    users::role.eq(excluded(users::role)),
                ))
                .returning(UserRow::as_returning())
                .get_result::<UserRow>(conn)
                .map_err(map_diesel_error)?
                .into_user()
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        self.with_conn(move |conn| {
            users::table
                .find(id.value())
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()
                .map_err(map_diesel_error)?
                .map(UserRow::into_user)
                .transpose()
        })
        .await
    }

    async fn find_users(&self, ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let ids: Vec<i64> = ids.iter().map(UserId::value).collect();
        self.with_conn(move |conn| {
            users::table
                .filter(users::user_id.eq_any(&ids))
                .order(users::user_id.asc())
                .select(UserRow::as_select())
                .load::<UserRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(UserRow::into_user)
                .collect()
        })
        .await
    }

    async fn list_users_by_role(&self, role: Role) -> RepositoryResult<Vec<User>> {
        self.with_conn(move |conn| {
            users::table
                .filter(users::role.eq(role.as_str()))
                .order(users::user_id.asc())
                .select(UserRow::as_select())
                .load::<UserRow>(conn)
                .map_err(map_diesel_error)?
                .into_iter()
                .map(UserRow::into_user)
                .collect()
        })
        .await
    }
}
