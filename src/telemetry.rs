mod command;
mod payload;
mod reading;

pub use command::*;
pub use payload::*;
pub use reading::*;
