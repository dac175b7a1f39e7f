pub mod counters;
pub mod registry;

pub use registry::gather_as_text;
