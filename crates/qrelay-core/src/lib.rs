pub mod client;
pub mod context;
pub mod log;
pub mod registry;
pub mod types;

pub use client::RtcClient;
pub use context::AppContext;
pub use registry::{ClientInfo, Registry, StoreInfo};
pub use types::{ChannelId, ClientId, QUARANTINE_CHANNEL};
