pub mod error;
pub mod gate;
pub mod session;
pub mod state;
pub mod token;

pub use error::AuthError;
pub use session::{AuthEvent, AuthStep, Session};
pub use state::{AuthConfig, AuthState};
