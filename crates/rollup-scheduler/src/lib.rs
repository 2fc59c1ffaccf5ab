//! `rollup-scheduler`: wall-clock daily trigger for scheduled rollups.
//!
//! A [`DailySchedule`] names a local time in an IANA zone. The
//! [`DailyTrigger`] sleeps until the next occurrence, invokes the job, and
//! repeats until its shutdown channel flips to `true`.
//!
//! Local times that fall into a DST gap fire at the first valid instant
//! after the gap; ambiguous times (DST fall-back) fire on the first of the
//! two occurrences, so the job runs exactly once per local day.

pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::DailyTrigger;
pub use error::{Result, SchedulerError};
pub use types::DailySchedule;
