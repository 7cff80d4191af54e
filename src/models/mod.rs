pub mod chat;
pub mod message;
pub mod profile;
pub mod requests;
