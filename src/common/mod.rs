mod id;
mod messages;

pub use id::*;
pub use messages::*;
