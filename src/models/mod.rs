pub mod command;
pub mod session;
pub mod upload;
pub mod user;
