// ABOUTME: Library module for sqlite-to-postgres
// ABOUTME: Exports the record model, reader, writer and commands for the binary and tests

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod postgres;
pub mod sqlite;
pub mod utils;
