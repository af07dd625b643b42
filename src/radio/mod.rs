pub mod regs;
pub mod rfm69;
pub mod traits;

pub use rfm69::{Rfm69Driver, Rfm69Pins};
pub use traits::{configure, DataShaping, FskParams, FskRadio, RadioConfig, RadioError};
