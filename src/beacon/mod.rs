pub mod indicator;
pub mod runner;

pub use indicator::{Indicator, Polarity};
pub use runner::{fault_forever, Beacon, BeaconSettings, BeaconState, Pacing};
