//! Outreach — personalized text campaigns over Messages.app.
//!
//! Sends each contact an initial message plus scheduled follow-ups, and
//! permanently stops following up the moment the contact replies.

pub mod config;
pub mod contacts;
pub mod engine;
pub mod error;
pub mod phone;
pub mod rate;
pub mod reply;
pub mod send;
pub mod store;
pub mod template;
