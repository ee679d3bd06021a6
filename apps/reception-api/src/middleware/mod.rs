pub mod auth;

pub use auth::{
    bearer_token, ensure_practice, request_context, require_permission, require_practice_scope,
    require_staff, verify_staff_token,
};
