pub mod admin;
pub mod codes;
pub mod session;
pub mod webauthn;
