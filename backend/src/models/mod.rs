//! Domain records shared by the repository, service and HTTP layers.

pub mod attendance;
pub mod availability;
pub mod booking;
pub mod macros;
pub mod package;
pub mod time;
pub mod user;

pub use attendance::*;
pub use availability::*;
pub use booking::*;
pub use package::*;
pub use time::*;
pub use user::*;

crate::define_id_type!(i64, UserId);
crate::define_id_type!(i64, AvailabilityId);
crate::define_id_type!(i64, BookingId);
crate::define_id_type!(i64, PackageId);
crate::define_id_type!(i64, TopicId);
crate::define_id_type!(i64, AttendanceLogId);
