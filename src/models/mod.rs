// Models module - Database entity representations

pub mod check_in_token;
pub mod roster_entry;
pub mod user;

pub use check_in_token::CheckInToken;
pub use roster_entry::RosterEntry;
pub use user::{Role, User};
