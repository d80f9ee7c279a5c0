pub mod auth;
pub mod client;
pub mod connection;
pub mod fanout;
pub mod listener;
pub mod proto;
pub mod tls;

pub type ClientRegistry = qrelay_core::Registry<client::Client>;

pub type Error = eyre::Report;
pub type Result<T> = eyre::Result<T>;
