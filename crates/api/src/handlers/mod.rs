pub mod characters;
pub mod credits;
pub mod gallery;
pub mod me;
pub mod waitlist;
pub mod webhooks;
