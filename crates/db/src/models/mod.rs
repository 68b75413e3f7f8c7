//! Row structs (`FromRow`) and create/update DTOs, one module per table.

pub mod character;
pub mod credit;
pub mod image_upload;
pub mod user;
pub mod waitlist;
