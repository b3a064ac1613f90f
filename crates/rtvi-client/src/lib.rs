mod client;

pub use client::{Client, Config, ConfigBuilder, EventRx};
pub use rtvi_types as types;
