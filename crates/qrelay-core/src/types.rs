//! Identifiers shared by the registry and the connection handler.

/// Process-unique, monotonically assigned identifier for a connected client.
///
/// The first id handed out is `0`; subsequent ids increase by one and are
/// allowed to wrap on overflow.
pub type ClientId = u32;

/// A logical broadcast domain. Channels are created implicitly when the
/// first client joins and destroyed implicitly when the last one leaves.
pub type ChannelId = u32;

/// Channel 0 is a quarantine: clients on it neither send nor receive
/// anything externally.
pub const QUARANTINE_CHANNEL: ChannelId = 0;
