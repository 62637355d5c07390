//! Master data access: event and chapter calendars per server.

pub mod hashed_file;
pub mod parser;
pub mod remaining;

pub use hashed_file::{HashCachedFile, compute_hash};
pub use parser::MasterDataParser;
pub use remaining::format_remaining;
