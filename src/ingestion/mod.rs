//! Reading delimited-text inputs.
//!
//! - [`dialect`]: delimiter sniffing and reader/writer builders
//! - [`csv`]: header resolution against a schema and typed loading of whole (shard) files

pub mod csv;
pub mod dialect;

pub use self::csv::{load_table, parse_typed_value, resolve_header};
pub use self::dialect::{sniff_dialect, Dialect};
