// Authentication module
// Guards the admin endpoints with JWT role checks and the scheduler endpoint with a shared secret

pub mod error;
pub mod middleware;
pub mod models;
pub mod token;

pub use error::AuthError;
pub use middleware::{AdminUser, CronCaller, CronSecret};
pub use models::Role;
pub use token::{Claims, TokenService};
