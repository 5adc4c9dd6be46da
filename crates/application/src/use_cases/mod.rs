//! Application use cases over the user and session repositories.

mod delete_current_user;
mod find_user;
mod get_current_user;

pub use delete_current_user::DeleteCurrentUser;
pub use find_user::FindUserByExternalId;
pub use get_current_user::GetCurrentUser;
