#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod channel;
mod clock;
mod config;
mod crc;
mod defer_queue;
mod diagnostics;
mod error;
mod layer;
mod limits;
mod message;
mod notifications;
mod received_buffer;
mod state_machine;
mod transport;

pub use clock::*;
pub use config::*;
pub use crc::*;
pub use defer_queue::*;
pub use diagnostics::*;
pub use error::*;
pub use layer::*;
pub use limits::*;
pub use message::*;
pub use notifications::*;
pub use received_buffer::*;
pub use state_machine::{ChannelEvent, ChannelState};
pub use transport::*;
