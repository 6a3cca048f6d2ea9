//! Application services layer.

pub mod aggregates;
pub mod blog;
pub mod error;
pub mod repos;
pub mod site;
