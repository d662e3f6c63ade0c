pub mod appointment_service;
pub mod error;
