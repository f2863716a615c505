//! File output for the extracted and joined tables.

pub mod export;
