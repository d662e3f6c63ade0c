pub mod schedule;
pub mod token;
