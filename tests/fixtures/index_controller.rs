use crate::models::{Node, Page, User};
use axum::Json;

/// Category tree of the whole site.
pub async fn get() -> Json<Node> {
    todo!()
}

/// Import several users at once.
pub async fn post(users: Vec<User>) -> Json<Page<User>> {
    todo!()
}

fn not_exported() {}
