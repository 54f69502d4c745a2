//! Input events from the client to the renderer

pub mod event;
pub mod ring;

pub use event::{InputEvent, InputKind};
pub use ring::{InputConsumer, InputProducer, InputRing, InputStats};
