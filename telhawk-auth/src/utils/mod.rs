pub mod ids;
pub mod password;

pub use ids::new_id;
pub use password::{hash_password, verify_password, Password, PasswordHashString};
