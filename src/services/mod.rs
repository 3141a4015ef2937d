// Services module - Business logic

pub mod attendance;
pub mod bearer;
pub mod check_in;
pub mod identity;
pub mod password;
pub mod qr_generator;
pub mod roster;
