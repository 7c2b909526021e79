// ABOUTME: Command implementations for the loader
// ABOUTME: Exports the table-by-table load run and the row-count verify check

pub mod run;
pub mod verify;

pub use run::{run, TableReport};
pub use verify::{verify, TableCount};
