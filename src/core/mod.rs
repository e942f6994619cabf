//! Core Module - Business Logic
//!
//! Workbook cleaning plus the upload/connection-test service built on the
//! Google clients.

pub mod cleaning;
pub mod uploads;

pub use cleaning::*;
pub use uploads::*;
