//! Failure-driven admission control.
//!
//! Each [`CooldownTable`] tracks consecutive failures per identity (client
//! IP). Reaching the threshold puts the identity in a cooldown during which
//! every attempt is denied. The auth check and job submission each own a
//! separate table.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after_minutes: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CooldownRecord {
    failure_count: u32,
    cooldown_until: DateTime<Utc>,
}

impl Default for CooldownRecord {
    fn default() -> Self {
        Self {
            failure_count: 0,
            cooldown_until: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl CooldownRecord {
    fn cooling(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until > now
    }
}

/// Per-identity failure counters with cooldown.
pub struct CooldownTable {
    name: &'static str,
    threshold: u32,
    cooldown: chrono::Duration,
    records: Mutex<HashMap<String, CooldownRecord>>,
}

impl CooldownTable {
    pub fn new(name: &'static str, threshold: u32, cooldown: Duration) -> Self {
        Self {
            name,
            threshold: threshold.max(1),
            cooldown: chrono::Duration::from_std(cooldown)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn check(&self, identity: &str) -> Admission {
        self.check_at(identity, Utc::now())
    }

    pub fn record_success(&self, identity: &str) {
        self.record_success_at(identity, Utc::now())
    }

    /// Returns true when this failure started a cooldown.
    pub fn record_failure(&self, identity: &str) -> bool {
        self.record_failure_at(identity, Utc::now())
    }

    /// Drop records that hold no state. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Utc::now())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CooldownRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_at(&self, identity: &str, now: DateTime<Utc>) -> Admission {
        let records = self.lock();
        match records.get(identity) {
            Some(record) if record.cooling(now) => {
                let remaining_ms = (record.cooldown_until - now).num_milliseconds().max(1);
                Admission::Denied {
                    retry_after_minutes: (remaining_ms + 59_999) / 60_000,
                }
            }
            _ => Admission::Allowed,
        }
    }

    fn record_success_at(&self, identity: &str, now: DateTime<Utc>) {
        let mut records = self.lock();
        let cooling = match records.get_mut(identity) {
            Some(record) => {
                record.failure_count = 0;
                record.cooling(now)
            }
            None => return,
        };
        // An active cooldown outlives a success that raced past the check.
        if !cooling {
            records.remove(identity);
        }
    }

    fn record_failure_at(&self, identity: &str, now: DateTime<Utc>) -> bool {
        let mut records = self.lock();
        let record = records.entry(identity.to_string()).or_default();

        if record.cooling(now) {
            return false;
        }

        record.failure_count += 1;
        if record.failure_count >= self.threshold {
            record.cooldown_until = now
                .checked_add_signed(self.cooldown)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.failure_count = 0;
            tracing::warn!(
                table = self.name,
                identity,
                cooldown_until = %record.cooldown_until,
                "Failure threshold reached, cooldown started"
            );
            metrics::counter!("admission_cooldowns_total", "table" => self.name).increment(1);
            return true;
        }

        false
    }

    fn prune_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| record.failure_count > 0 || record.cooling(now));
        before - records.len()
    }

    #[cfg(test)]
    fn snapshot(&self, identity: &str) -> Option<CooldownRecord> {
        self.lock().get(identity).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    fn table() -> CooldownTable {
        CooldownTable::new("test", 3, TEN_MINUTES)
    }

    #[test]
    fn test_unseen_identity_is_allowed() {
        assert_eq!(table().check("10.0.0.1"), Admission::Allowed);
    }

    #[test]
    fn test_threshold_failures_deny_for_cooldown() {
        let table = table();
        let now = Utc::now();

        assert!(!table.record_failure_at("10.0.0.1", now));
        assert!(!table.record_failure_at("10.0.0.1", now));
        assert_eq!(table.check_at("10.0.0.1", now), Admission::Allowed);
        assert!(table.record_failure_at("10.0.0.1", now));

        assert_eq!(
            table.check_at("10.0.0.1", now),
            Admission::Denied { retry_after_minutes: 10 }
        );
        assert_eq!(table.snapshot("10.0.0.1").unwrap().failure_count, 0);
    }

    #[test]
    fn test_retry_minutes_round_up() {
        let table = table();
        let now = Utc::now();
        for _ in 0..3 {
            table.record_failure_at("ip", now);
        }

        let later = now + chrono::Duration::seconds(9 * 60 + 1);
        assert_eq!(
            table.check_at("ip", later),
            Admission::Denied { retry_after_minutes: 1 }
        );
        let later = now + chrono::Duration::seconds(4 * 60 + 30);
        assert_eq!(
            table.check_at("ip", later),
            Admission::Denied { retry_after_minutes: 6 }
        );
    }

    #[test]
    fn test_allowed_again_after_expiry() {
        let table = table();
        let now = Utc::now();
        for _ in 0..3 {
            table.record_failure_at("ip", now);
        }

        let expired = now + chrono::Duration::minutes(10);
        assert_eq!(table.check_at("ip", expired), Admission::Allowed);

        // A fresh period starts counting from zero.
        assert!(!table.record_failure_at("ip", expired));
        assert_eq!(table.snapshot("ip").unwrap().failure_count, 1);
    }

    #[test]
    fn test_success_resets_counter() {
        let table = table();
        let now = Utc::now();
        table.record_failure_at("ip", now);
        table.record_failure_at("ip", now);
        table.record_success_at("ip", now);
        assert!(table.snapshot("ip").is_none());

        table.record_failure_at("ip", now);
        table.record_failure_at("ip", now);
        assert_eq!(table.check_at("ip", now), Admission::Allowed);
    }

    #[test]
    fn test_success_does_not_lift_active_cooldown() {
        let table = table();
        let now = Utc::now();
        for _ in 0..3 {
            table.record_failure_at("ip", now);
        }
        let until = table.snapshot("ip").unwrap().cooldown_until;

        table.record_success_at("ip", now);
        let record = table.snapshot("ip").unwrap();
        assert_eq!(record.cooldown_until, until);
        assert_eq!(record.failure_count, 0);
        assert!(matches!(table.check_at("ip", now), Admission::Denied { .. }));
    }

    #[test]
    fn test_failures_during_cooldown_do_not_extend_it() {
        let table = table();
        let now = Utc::now();
        for _ in 0..3 {
            table.record_failure_at("ip", now);
        }
        let until = table.snapshot("ip").unwrap().cooldown_until;

        let later = now + chrono::Duration::minutes(1);
        for _ in 0..5 {
            assert!(!table.record_failure_at("ip", later));
        }
        let record = table.snapshot("ip").unwrap();
        assert_eq!(record.cooldown_until, until);
        assert_eq!(record.failure_count, 0);
    }

    #[test]
    fn test_tables_are_independent() {
        let auth = CooldownTable::new("auth", 3, TEN_MINUTES);
        let submit = CooldownTable::new("submit", 3, TEN_MINUTES);
        for _ in 0..3 {
            auth.record_failure("ip");
        }

        assert!(matches!(auth.check("ip"), Admission::Denied { .. }));
        assert_eq!(submit.check("ip"), Admission::Allowed);
        assert!(submit.snapshot("ip").is_none());
    }

    #[test]
    fn test_identities_are_independent() {
        let table = table();
        for _ in 0..3 {
            table.record_failure("a");
        }
        assert!(matches!(table.check("a"), Admission::Denied { .. }));
        assert_eq!(table.check("b"), Admission::Allowed);
    }

    #[test]
    fn test_prune_keeps_live_records() {
        let table = table();
        let now = Utc::now();
        table.record_failure_at("counting", now);
        for _ in 0..3 {
            table.record_failure_at("cooling", now);
        }
        for _ in 0..3 {
            table.record_failure_at("expired", now - chrono::Duration::minutes(20));
        }

        assert_eq!(table.prune_at(now), 1);
        assert!(table.snapshot("counting").is_some());
        assert!(table.snapshot("cooling").is_some());
        assert!(table.snapshot("expired").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_activate_one_cooldown() {
        let table = Arc::new(table());
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let table = Arc::clone(&table);
                tokio::spawn(async move { table.record_failure("ip") })
            })
            .collect();

        let activations = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|started| *started.as_ref().unwrap())
            .count();

        assert_eq!(activations, 1);
        match table.check("ip") {
            Admission::Denied { retry_after_minutes } => assert_eq!(retry_after_minutes, 10),
            Admission::Allowed => panic!("identity should be cooling down"),
        }
    }

    #[test]
    fn test_short_cooldown_expires_in_real_time() {
        let table = CooldownTable::new("test", 1, Duration::from_millis(20));
        table.record_failure("ip");
        assert_eq!(table.check("ip"), Admission::Denied { retry_after_minutes: 1 });
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(table.check("ip"), Admission::Allowed);
    }
}
