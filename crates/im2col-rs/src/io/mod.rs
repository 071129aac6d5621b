//! Cross-validation artifacts: raw f32 dumps plus a one-line shape description.

pub mod dump;

pub use dump::{read_f32_raw, write_dump, write_f32_raw, DumpMeta, DumpReport, DUMP_FILES};
