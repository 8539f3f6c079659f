//! # fieldgraph command
//!
//! The textual face of the engine:
//!
//! - [`tokenize()`]: splits a command line, honouring quoted names and `#` comments
//! - [`CommandParser`]: turns the command strings printed by
//!   `Field::describe` back into fields of a module
//! - [`Scene`]: a TOML file holding a mesh, curves, time keepers and field
//!   commands, built into a [`LoadedScene`]

pub mod error;
pub mod parser;
pub mod scene;
pub mod tokenize;

pub use error::CommandError;
pub use parser::{CommandParser, ParsedCommand};
pub use scene::{CurveSpec, ElementSpec, LoadedScene, Scene, TimeKeeperSpec};
pub use tokenize::tokenize;
