pub mod chat;
pub mod license;
pub mod verification;
