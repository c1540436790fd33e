//! Ownership rules: who may act on which records.

use super::error::{ServiceError, ServiceResult};
use crate::models::{Actor, Booking, Role, UserId};

pub fn require_admin(actor: &Actor, action: &str) -> ServiceResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!("only admins may {}", action)))
    }
}

/// A student may only touch their own bookings, a teacher only their own
/// classes. Admins may touch anything.
pub fn ensure_booking_access(actor: &Actor, booking: &Booking) -> ServiceResult<()> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::Student => booking.student_id == actor.user_id,
        Role::Teacher => booking.teacher_id == actor.user_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "booking {} does not belong to user {}",
            booking.id, actor.user_id
        )))
    }
}

/// Teacher of the class or admin.
pub fn ensure_teaches(actor: &Actor, booking: &Booking) -> ServiceResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Teacher if booking.teacher_id == actor.user_id => Ok(()),
        _ => Err(ServiceError::forbidden(format!(
            "only the teacher of booking {} or an admin may do this",
            booking.id
        ))),
    }
}

/// Resolve whose availability a request edits: teachers edit their own,
/// admins must say which teacher.
pub fn resolve_teacher(actor: &Actor, requested: Option<UserId>) -> ServiceResult<UserId> {
    match actor.role {
        Role::Teacher => match requested {
            Some(id) if id != actor.user_id => Err(ServiceError::forbidden(
                "teachers may only manage their own availability",
            )),
            _ => Ok(actor.user_id),
        },
        Role::Admin => requested
            .ok_or_else(|| ServiceError::invalid_input("teacherId is required for admins")),
        Role::Student => Err(ServiceError::forbidden(
            "students cannot manage availability",
        )),
    }
}

/// Resolve which student a booking or stats request is for.
pub fn resolve_student(actor: &Actor, requested: Option<UserId>) -> ServiceResult<UserId> {
    match actor.role {
        Role::Student => match requested {
            Some(id) if id != actor.user_id => Err(ServiceError::forbidden(
                "students may only act for themselves",
            )),
            _ => Ok(actor.user_id),
        },
        Role::Admin => requested
            .ok_or_else(|| ServiceError::invalid_input("studentId is required for admins")),
        Role::Teacher => Err(ServiceError::forbidden("teachers cannot book lessons")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingId, BookingStatus, TopicId};
    use chrono::{TimeZone, Utc};

    fn booking() -> Booking {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        Booking {
            id: BookingId(1),
            student_id: UserId(10),
            teacher_id: UserId(20),
            topic_id: TopicId(1),
            scheduled_at: at,
            status: BookingStatus::Scheduled,
            attended_at: None,
            cancelled_at: None,
            external_event_ref: None,
            created_at: at,
        }
    }

    #[test]
    fn test_booking_access() {
        let b = booking();
        assert!(ensure_booking_access(&Actor::student(10), &b).is_ok());
        assert!(ensure_booking_access(&Actor::teacher(20), &b).is_ok());
        assert!(ensure_booking_access(&Actor::admin(1), &b).is_ok());
        assert!(ensure_booking_access(&Actor::student(11), &b).is_err());
        assert!(ensure_booking_access(&Actor::teacher(21), &b).is_err());
    }

    #[test]
    fn test_students_cannot_complete() {
        let b = booking();
        assert!(ensure_teaches(&Actor::student(10), &b).is_err());
        assert!(ensure_teaches(&Actor::teacher(20), &b).is_ok());
    }

    #[test]
    fn test_resolve_student() {
        assert_eq!(resolve_student(&Actor::student(5), None).unwrap(), UserId(5));
        assert!(resolve_student(&Actor::student(5), Some(UserId(6))).is_err());
        assert_eq!(
            resolve_student(&Actor::admin(1), Some(UserId(6))).unwrap(),
            UserId(6)
        );
        assert_eq!(
            resolve_student(&Actor::teacher(2), None).unwrap_err().code(),
            "FORBIDDEN"
        );
    }

    #[test]
    fn test_resolve_teacher() {
        assert_eq!(resolve_teacher(&Actor::teacher(2), None).unwrap(), UserId(2));
        assert!(resolve_teacher(&Actor::teacher(2), Some(UserId(3))).is_err());
        assert_eq!(
            resolve_teacher(&Actor::admin(1), None).unwrap_err().code(),
            "INVALID_INPUT"
        );
    }
}
