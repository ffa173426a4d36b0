//! Outgoing email: composition and delivery.
//!
//! [`EmailComposer`] renders the contact, enhanced-contact, processing and
//! admin messages; a [`Mailer`] delivers them. The default [`OutboxMailer`]
//! records messages in the database outbox.

pub mod compose;
pub mod mailer;

pub use compose::{EmailComposer, EmailMessage, ProcessingUpdate};
pub use mailer::{Mailer, OutboxMailer};
