mod middleware;
mod session;
mod token;

pub use middleware::{AuthError, RequireRefresh, RequireUser};
pub use session::{TokenPair, TokenTtl, authenticate, issue_token_pair, validate_token};
pub use token::{TokenGenerator, parse_token};
