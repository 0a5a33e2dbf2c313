pub mod profile;
pub mod transcript;
pub mod user;
