pub mod auth;
pub mod hec;
pub mod jsonapi;
pub mod users;
