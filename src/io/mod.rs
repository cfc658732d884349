mod csv;

/// DEXi-like model XML reader.
pub mod model_xml;

pub use csv::{read_options, write_options};
pub use model_xml::parse_model;
