//! Query-to-file export: read-only validation and delimited output.

mod validate;
mod writer;

pub use validate::is_read_only;
pub use writer::{DelimitedWriter, DELIMITER};
