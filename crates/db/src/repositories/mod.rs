//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod character_repo;
pub mod credit_ledger_repo;
pub mod image_upload_repo;
pub mod user_repo;
pub mod waitlist_repo;

pub use character_repo::CharacterRepo;
pub use credit_ledger_repo::CreditLedgerRepo;
pub use image_upload_repo::ImageUploadRepo;
pub use user_repo::UserRepo;
pub use waitlist_repo::WaitlistRepo;
