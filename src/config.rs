//! Run configuration.

use crate::phone::PhoneKey;

/// Policy when the reply lookup cannot be reached mid-run.
///
/// The engine must not send unless it can attest "no reply", so the safe
/// default is to stop the run. Fail-open behavior is an explicit opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupFailurePolicy {
    /// Abort the whole run with a diagnostic.
    #[default]
    Abort,
    /// Treat the contact as possibly-replied for this run only: skip the
    /// send, persist nothing, continue with the next contact.
    AssumeReplied,
}

/// Options for one campaign run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Log intended sends instead of sending; the store is never written.
    pub dry_run: bool,
    /// Restrict the run to a single contact.
    pub only: Option<PhoneKey>,
    /// Outbound messages per minute.
    pub rate_per_minute: u32,
    pub on_lookup_failure: LookupFailurePolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            only: None,
            rate_per_minute: 8,
            on_lookup_failure: LookupFailurePolicy::default(),
        }
    }
}
