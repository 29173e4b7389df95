//! Services separating I/O and reporting from pipeline logic

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    AcquisitionEvent, NoOpProgressReporter, ProgressReporter, TracingProgressReporter,
};
