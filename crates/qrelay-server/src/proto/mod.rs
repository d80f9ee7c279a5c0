mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod message;
pub use message::*;
