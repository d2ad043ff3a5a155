// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod dump;
pub mod logging;
pub mod parser;
pub mod presets;
pub mod progress;
pub mod resolver;
pub mod runner;
pub mod schema;
pub mod store;
pub mod sync;
pub mod value;
pub mod watermark;
