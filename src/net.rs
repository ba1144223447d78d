//! Network access for the AVDECC stack.
//!
//! - [`transport`]: the [`NetIo`](transport::NetIo) trait every backend implements
//! - [`mock_transport`]: in-memory transport for tests (`std` feature)
//! - [`embassy_adapter`]: adapter over an `embassy-net-driver` Ethernet driver (`embassy` feature)

pub mod transport;

#[cfg(any(test, feature = "std"))]
pub mod mock_transport;

#[cfg(feature = "embassy")]
pub mod embassy_adapter;

pub use transport::NetIo;

#[cfg(any(test, feature = "std"))]
pub use mock_transport::MockNetIo;

#[cfg(feature = "embassy")]
pub use embassy_adapter::EmbassyNetIo;
