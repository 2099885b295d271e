pub mod error;
pub mod interval;

pub use interval::TimeWindow;
