//! Pure transformations behind the admission policy.
//!
//! Nothing in here performs I/O. The speed estimator and the admission state
//! machine are driven by the directory and engines in [`crate::effects`].

mod admission;
mod clock;
mod speed;

pub use admission::{AdmissionState, SpeedTrend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use speed::{SpeedSample, SpeedWindow, TickSampler, TransferMeter, aggregate_speed};
