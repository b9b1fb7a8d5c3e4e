//! Protocol module - EZO command/response definitions.

pub mod address;
pub mod command;
pub mod constants;
pub mod frame;
pub mod info;
pub mod status;
pub mod timing;

pub use address::Address;
pub use command::Command;
pub use constants::*;
pub use frame::Framer;
pub use info::DeviceInfo;
pub use status::{Outcome, StatusCode, interpret, interpret_line};
pub use timing::{TimeoutClass, TimingPolicy, classify};
