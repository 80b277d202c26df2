// ABOUTME: known_hosts management core: line parsing, address index, mutations and persistence
// ABOUTME: Consumed by the command layer through parse_known_hosts and the Collection API

pub mod collection;
pub mod error;
pub mod parser;
pub mod store;

pub use collection::Collection;
pub use error::{ErrorKind, HostsError};
pub use parser::{HostEntry, parse_known_hosts};
