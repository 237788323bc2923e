//! Campaign engine — the per-run state machine.
//!
//! One invocation walks the contact list in order and, for each contact,
//! decides between exactly three actions: send the initial message, send
//! the single most overdue unsent follow-up, or do nothing. A detected
//! reply halts a contact permanently before any send is attempted.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::{LookupFailurePolicy, RunOptions};
use crate::contacts::{Contact, Step};
use crate::error::{Error, Result};
use crate::rate::RateLimiter;
use crate::reply::ReplySource;
use crate::send::MessageSender;
use crate::store::{ProgressRecord, Records, StateStore};
use crate::template;

/// Where a contact stands in the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactState {
    /// Never contacted; no `started_at`.
    New,
    /// Campaign started, steps remaining, no reply seen.
    Active,
    /// Reply detected; permanently suppressed.
    Halted,
    /// Every defined step sent. Inert, kept for audit.
    Complete,
}

impl ContactState {
    /// Derive the state of `record` against a campaign of `step_count` steps.
    pub fn of(record: &ProgressRecord, step_count: usize) -> Self {
        if record.halted {
            Self::Halted
        } else if record.started_at.is_none() {
            Self::New
        } else if (0..step_count).all(|i| record.sent_steps.contains(&i)) {
            Self::Complete
        } else {
            Self::Active
        }
    }

    /// Terminal states never leave without manual record deletion.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Halted | Self::Complete)
    }
}

impl std::fmt::Display for ContactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Active => "active",
            Self::Halted => "halted",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// Counters for one run, logged at the end and returned to the caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Contacts that passed the `--only` filter.
    pub examined: usize,
    /// Messages sent (or, in dry-run, that would have been sent).
    pub sent: usize,
    /// Contacts newly halted by a detected reply.
    pub halted: usize,
    /// Contact-scoped failures left for the next run.
    pub errors: usize,
}

/// Drives one campaign run over the contact list.
pub struct CampaignEngine {
    store: StateStore,
    replies: Arc<dyn ReplySource>,
    sender: Arc<dyn MessageSender>,
    limiter: RateLimiter,
    opts: RunOptions,
}

impl CampaignEngine {
    pub fn new(
        store: StateStore,
        replies: Arc<dyn ReplySource>,
        sender: Arc<dyn MessageSender>,
        opts: RunOptions,
    ) -> Self {
        Self {
            store,
            replies,
            sender,
            limiter: RateLimiter::new(opts.rate_per_minute),
            opts,
        }
    }

    /// Run the state machine once, now.
    pub async fn run(&mut self, contacts: &[Contact]) -> Result<RunSummary> {
        self.run_at(contacts, Utc::now()).await
    }

    /// Run the state machine once with an explicit `now`, so schedule logic
    /// is testable without waiting out real days.
    pub async fn run_at(&mut self, contacts: &[Contact], now: DateTime<Utc>) -> Result<RunSummary> {
        let mut records = self.store.load().await?;
        let mut summary = RunSummary::default();

        for contact in contacts {
            if let Some(only) = &self.opts.only {
                if contact.key != *only {
                    continue;
                }
            }
            summary.examined += 1;
            self.process_contact(contact, &mut records, now, &mut summary)
                .await?;
        }

        if !self.opts.dry_run {
            self.store.save(&records).await?;
        }
        tracing::info!(
            examined = summary.examined,
            sent = summary.sent,
            halted = summary.halted,
            errors = summary.errors,
            dry_run = self.opts.dry_run,
            "Run complete"
        );
        Ok(summary)
    }

    async fn process_contact(
        &mut self,
        contact: &Contact,
        records: &mut Records,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut record = self.store.get_or_create(records, &contact.key).clone();

        let state = ContactState::of(&record, contact.steps.len());
        if state.is_terminal() {
            tracing::debug!(contact = %contact.key, %state, "Nothing to do");
            return Ok(());
        }

        // Reply gating: checked before any send attempt, every run.
        if let Some(started_at) = record.started_at {
            match self.replies.last_inbound_at(&contact.key).await {
                Ok(Some(replied_at)) if replied_at >= started_at => {
                    summary.halted += 1;
                    if self.opts.dry_run {
                        tracing::info!(contact = %contact.key, %replied_at, "[DRY RUN] reply detected; would halt");
                        return Ok(());
                    }
                    tracing::info!(contact = %contact.key, %replied_at, "Reply detected; halting follow-ups");
                    record.halt(now, format!("reply detected at {replied_at}"));
                    self.commit(records, contact, record).await?;
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => match self.opts.on_lookup_failure {
                    LookupFailurePolicy::AssumeReplied => {
                        tracing::warn!(
                            contact = %contact.key,
                            error = %e,
                            "Reply lookup failed; assuming possible reply, skipping this run"
                        );
                        summary.errors += 1;
                        return Ok(());
                    }
                    LookupFailurePolicy::Abort => {
                        tracing::error!(
                            contact = %contact.key,
                            error = %e,
                            "Reply lookup failed; aborting run rather than risk over-sending"
                        );
                        return Err(Error::Reply(e));
                    }
                },
            }
        }

        // At most one newly-sent step per contact per run: the most overdue
        // unsent step. Later due steps wait for the next invocation, so a
        // contact never gets machine-gunned after skipped runs.
        let Some((idx, step)) = next_due_step(contact, &record, now) else {
            return Ok(());
        };

        let text = match template::render(&step.template, &contact.attrs) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(
                    contact = %contact.key,
                    step = idx,
                    error = %e,
                    "Template render failed; step left for next run"
                );
                summary.errors += 1;
                return Ok(());
            }
        };

        if !self.opts.dry_run {
            self.limiter.throttle().await;
        }
        match self.sender.send(&contact.phone, &text).await {
            Ok(()) => {
                summary.sent += 1;
                if !self.opts.dry_run {
                    record.mark_sent(idx, now);
                    tracing::info!(contact = %contact.key, step = idx, "Sent step");
                    self.commit(records, contact, record).await?;
                }
            }
            Err(e) => {
                summary.errors += 1;
                tracing::error!(
                    contact = %contact.key,
                    step = idx,
                    error = %e,
                    "Send failed; step will be retried next run"
                );
            }
        }
        Ok(())
    }

    /// Write the mutated record back and checkpoint the store immediately,
    /// so a kill mid-run never leaves a sent message unrecorded.
    async fn commit(
        &self,
        records: &mut Records,
        contact: &Contact,
        record: ProgressRecord,
    ) -> Result<()> {
        records.insert(contact.key.as_str().to_string(), record);
        self.store.save(records).await?;
        Ok(())
    }
}

/// Pick the unsent step with the earliest elapsed due time, if any.
///
/// The initial step is due immediately; follow-ups are due `delay_days`
/// after `started_at` and cannot be scheduled before the initial send.
fn next_due_step<'a>(
    contact: &'a Contact,
    record: &ProgressRecord,
    now: DateTime<Utc>,
) -> Option<(usize, &'a Step)> {
    let mut best: Option<(DateTime<Utc>, usize, &Step)> = None;
    for (idx, step) in contact.steps.iter().enumerate() {
        if record.sent_steps.contains(&idx) {
            continue;
        }
        let due_at = if idx == 0 {
            record.started_at.unwrap_or(now)
        } else {
            match record.started_at {
                Some(started_at) => started_at + Duration::days(step.delay_days),
                None => continue,
            }
        };
        if due_at > now {
            continue;
        }
        if best.is_none_or(|(best_due, _, _)| due_at < best_due) {
            best = Some((due_at, idx, step));
        }
    }
    best.map(|(_, idx, step)| (idx, step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::Step;

    fn contact(steps: Vec<Step>) -> Contact {
        Contact {
            phone: "+19195550123".to_string(),
            key: crate::phone::PhoneKey::parse("+19195550123").unwrap(),
            attrs: Default::default(),
            steps,
        }
    }

    fn steps() -> Vec<Step> {
        vec![
            Step {
                delay_days: 0,
                template: "hi".into(),
            },
            Step {
                delay_days: 2,
                template: "fup1".into(),
            },
            Step {
                delay_days: 5,
                template: "fup2".into(),
            },
        ]
    }

    #[test]
    fn state_derivation() {
        let mut rec = ProgressRecord::default();
        assert_eq!(ContactState::of(&rec, 3), ContactState::New);

        let now = Utc::now();
        rec.mark_sent(0, now);
        assert_eq!(ContactState::of(&rec, 3), ContactState::Active);

        rec.mark_sent(1, now);
        rec.mark_sent(2, now);
        assert_eq!(ContactState::of(&rec, 3), ContactState::Complete);

        rec.halt(now, "reply");
        assert_eq!(ContactState::of(&rec, 3), ContactState::Halted);
        assert!(ContactState::Halted.is_terminal());
        assert!(ContactState::Complete.is_terminal());
        assert!(!ContactState::Active.is_terminal());
    }

    #[test]
    fn initial_step_is_due_immediately() {
        let c = contact(steps());
        let rec = ProgressRecord::default();
        let (idx, _) = next_due_step(&c, &rec, Utc::now()).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn followup_waits_for_delay() {
        let c = contact(steps());
        let day0 = Utc::now();
        let mut rec = ProgressRecord::default();
        rec.mark_sent(0, day0);

        assert!(next_due_step(&c, &rec, day0 + Duration::days(1)).is_none());
        let (idx, _) = next_due_step(&c, &rec, day0 + Duration::days(2)).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn only_most_overdue_step_is_picked() {
        // Both follow-ups are overdue after a week; only the earliest goes.
        let c = contact(steps());
        let day0 = Utc::now();
        let mut rec = ProgressRecord::default();
        rec.mark_sent(0, day0);

        let (idx, _) = next_due_step(&c, &rec, day0 + Duration::days(7)).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn followup_never_schedules_before_initial_send() {
        let c = contact(steps());
        // Hand-edited record: step 0 marked sent but started_at cleared.
        let rec = ProgressRecord {
            sent_steps: [0].into_iter().collect(),
            ..Default::default()
        };
        assert!(next_due_step(&c, &rec, Utc::now() + Duration::days(30)).is_none());
    }
}
