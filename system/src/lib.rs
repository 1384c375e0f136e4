pub extern crate serde;
pub extern crate serde_json;
pub extern crate uuid;

mod connection_registry;
mod coordinator;
mod error;
mod message;
mod room_state;
mod traits;
mod types;

pub use connection_registry::*;
pub use coordinator::*;
pub use error::*;
pub use message::*;
pub use room_state::*;
pub use traits::*;
pub use types::*;
