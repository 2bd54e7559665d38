pub mod audit;
pub mod auth;
pub mod hec;
pub mod users;
