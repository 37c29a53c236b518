pub mod calc;
pub mod columns;
pub mod core;
pub mod export;
pub mod grid;
pub mod records;
pub mod reports;
pub mod setup;
pub mod students;
