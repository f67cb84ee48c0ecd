use crate::models::{Session, User};
use crate::ApiError;
use axum::Json;

/// Look up a user by name.
pub async fn get(name: String, verbose: Option<bool>) -> Json<User> {
    todo!()
}

/// Replace a user.
///
/// @operationId replaceUser
pub async fn put(name: String, Json(user): Json<User>, session: Session) -> Result<Json<User>, ApiError> {
    todo!()
}

pub fn helper() {}
