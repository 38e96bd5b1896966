//! Lease Registry (§4.5): tracks active client leases with TTL-based
//! reaping and records the last moment the registry was empty, which the
//! idle reaper uses to gate teardown (I3).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Lease {
    pub lease_id: String,
    pub meta: Value,
    pub last_seen: Instant,
}

pub struct AcquiredLease {
    pub lease_id: String,
    pub heartbeat_s: u64,
    pub lease_ttl_s: u64,
}

pub enum HeartbeatOutcome {
    Ok,
    Unknown,
}

pub enum ReleaseOutcome {
    Ok,
    Unknown,
}

/// All mutation is funneled through `&mut self` methods so callers that
/// wrap this in a single mutex (the "supervisor mutex" of §5) get
/// serialized, totally-ordered updates for free.
pub struct LeaseRegistry {
    leases: HashMap<String, Lease>,
    last_zero_lease_time: Instant,
    lease_ttl: Duration,
    heartbeat_s: u64,
}

impl LeaseRegistry {
    pub fn new(lease_ttl: Duration, heartbeat_s: u64) -> Self {
        Self {
            leases: HashMap::new(),
            last_zero_lease_time: Instant::now(),
            lease_ttl,
            heartbeat_s,
        }
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub fn last_zero_lease_time(&self) -> Instant {
        self.last_zero_lease_time
    }

    /// `acquire(meta) -> (lease_id, heartbeat_s, lease_ttl_s)`. Generates a
    /// UUIDv4 lease id (see Design Notes: preferred over a wall-clock +
    /// pid + thread-id prefix, which the original used and which risks
    /// collision under rapid reacquisition). Resets the idle grace clock so
    /// it starts counting only once leases drain again.
    pub fn acquire(&mut self, meta: Value) -> AcquiredLease {
        let lease_id = format!("lease_{}", Uuid::new_v4());
        let now = Instant::now();
        self.leases.insert(
            lease_id.clone(),
            Lease {
                lease_id: lease_id.clone(),
                meta,
                last_seen: now,
            },
        );
        self.last_zero_lease_time = now;
        AcquiredLease {
            lease_id,
            heartbeat_s: self.heartbeat_s,
            lease_ttl_s: self.lease_ttl.as_secs(),
        }
    }

    /// `heartbeat(lease_id) -> ok | unknown` (I5: never resurrects an
    /// unknown id).
    pub fn heartbeat(&mut self, lease_id: &str) -> HeartbeatOutcome {
        match self.leases.get_mut(lease_id) {
            Some(lease) => {
                lease.last_seen = Instant::now();
                HeartbeatOutcome::Ok
            }
            None => HeartbeatOutcome::Unknown,
        }
    }

    /// `release(lease_id) -> ok | unknown`. If the registry becomes empty,
    /// starts the idle grace clock.
    pub fn release(&mut self, lease_id: &str) -> ReleaseOutcome {
        match self.leases.remove(lease_id) {
            Some(_) => {
                if self.leases.is_empty() {
                    self.last_zero_lease_time = Instant::now();
                }
                ReleaseOutcome::Ok
            }
            None => ReleaseOutcome::Unknown,
        }
    }

    /// Expire leases whose `last_seen` is older than the configured TTL.
    /// Returns the ids that were expired. If this drains the registry,
    /// starts the idle grace clock.
    pub fn expire_stale(&mut self) -> Vec<String> {
        let now = Instant::now();
        let ttl = self.lease_ttl;
        let expired: Vec<String> = self
            .leases
            .iter()
            .filter(|(_, lease)| now.duration_since(lease.last_seen) > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.leases.remove(id);
        }
        if !expired.is_empty() && self.leases.is_empty() {
            self.last_zero_lease_time = now;
        }
        expired
    }

    /// Reaper tick step 3: while at least one lease is held, keep bumping
    /// the idle clock forward so future grace periods always start fresh
    /// once leases do drain.
    pub fn refresh_activity(&mut self) {
        if !self.leases.is_empty() {
            self.last_zero_lease_time = Instant::now();
        }
    }

    /// Whether the registry has been continuously empty for at least
    /// `idle_timeout`, as of `now` (I3).
    pub fn idle_for_at_least(&self, idle_timeout: Duration, now: Instant) -> bool {
        self.leases.is_empty() && now.duration_since(self.last_zero_lease_time) >= idle_timeout
    }

    /// Reset the idle grace clock to `now` (§4.6 step 5, run by teardown).
    pub fn reset_idle_clock(&mut self, now: Instant) {
        self.last_zero_lease_time = now;
    }
}
