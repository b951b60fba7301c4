//! Request and response types of the read API.

pub mod common_dto;

pub use common_dto::{BorrowDetailQuery, HealthResponse};
