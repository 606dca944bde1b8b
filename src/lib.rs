mod errors;
pub use errors::*;
mod event;
pub use event::*;
mod route;
pub use route::*;
mod entity;
pub use entity::*;
mod config;
pub use config::*;
mod handler;
pub use handler::*;
mod catch_up;
pub use catch_up::*;

pub mod broker;
pub mod dispatchers;
pub use dispatchers::{Dispatcher, merge_streams};
pub mod read;

#[cfg(test)]
pub mod testing;
