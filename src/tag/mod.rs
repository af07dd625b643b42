pub mod encoder;
pub mod id;
pub mod packet;

pub use encoder::encode_id;
pub use id::{ConfigError, TagId};
pub use packet::Packet;
