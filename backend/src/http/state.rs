//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::services::{BookingPolicy, CalendarService, DisabledCalendar};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn FullRepository>,
    pub calendar: Arc<dyn CalendarService>,
    pub policy: Arc<BookingPolicy>,
    /// Length of the calendar event created for each booking.
    pub lesson_minutes: u32,
}

impl AppState {
    /// State with the default policy and no calendar integration.
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self {
            repository,
            calendar: Arc::new(DisabledCalendar),
            policy: Arc::new(BookingPolicy::default()),
            lesson_minutes: 60,
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarService>, lesson_minutes: u32) -> Self {
        self.calendar = calendar;
        self.lesson_minutes = lesson_minutes;
        self
    }

    pub fn with_policy(mut self, policy: BookingPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }
}
