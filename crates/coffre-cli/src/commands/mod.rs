//! Subcommand implementations. Each writes its result to `out`.

pub mod analyze;
pub mod cipher;
pub mod documents;
pub mod generate;
pub mod health;
pub mod records;
