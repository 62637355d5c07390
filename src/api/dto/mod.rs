//! Data Transfer Objects for REST response serialization.

pub mod ranking_dto;

pub use ranking_dto::*;
