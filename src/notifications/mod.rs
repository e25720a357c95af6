//! Outbound notifications.
//!
//! Currently this is email only: the instructor gets a message when a new
//! lead arrives through the public contact form.

pub mod email;

pub use email::EmailService;
