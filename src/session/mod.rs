//! Host side of a room: lifecycle control and the runtime that hosts engines.

mod controller;
mod host;
pub mod room_code;

pub use self::{
    controller::SessionController,
    host::{DisplayEvent, HostOptions, HostRuntime},
};
