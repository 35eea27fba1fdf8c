pub mod extractors;
pub mod password;

pub use extractors::{
    clear_session_cookie, session_cookie, session_token, AdminUser, CurrentUser, OptionalUser,
};
pub use password::{hash_password, verify_password, PasswordError};
