//! Real-time parking-lot occupancy tracker.
//!
//! Grounded on the `carpark.py` reference: exact current occupancy is a `HashSet<car_id>` guarded
//! by a sharded lock per lot, while historical occupancy-change rate is answered from a pair of
//! [`windowed_analytics::RingBuffer`]s (enter events, exit events) per lot -- the same ring
//! primitive the core crate uses for its own sketches, reused here directly since carpark rate
//! queries need exact counts, not approximate ones.

use std::sync::atomic::{AtomicI64, Ordering};

use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use tracing::trace;
use windowed_analytics::{RingBuffer, ShardedLockMap};

/// Whether a recorded event is a car entering or leaving a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarparkEvent {
    Enter,
    Exit,
}

struct LotState {
    capacity: u32,
    occupants: Mutex<HashSet<String>>,
    enter_buckets: RingBuffer,
    exit_buckets: RingBuffer,
    snapshots: Mutex<Vec<(i64, i64)>>,
}

/// Tracks per-lot occupancy and occupancy-change rate across a fixed set of parking lots.
///
/// Lots are fixed at construction time, matching the source system's `capacities` map: there is
/// no API to add a lot afterwards, so the per-lot state map never grows and needs no lock of its
/// own.
pub struct CarparkTracker {
    max_delay: i64,
    window_seconds: i64,
    bucket_size: i64,
    current_time: AtomicI64,
    lots: HashMap<String, LotState>,
    shards: ShardedLockMap,
}

impl CarparkTracker {
    /// Creates a tracker for the given lots (`lot_id -> capacity`) with the reference system's
    /// defaults: events up to 30 seconds late are still accepted, over a 1-hour window at
    /// 10-second bucket granularity.
    pub fn new(capacities: HashMap<String, u32>) -> Self {
        Self::with_config(capacities, 30, 3_600, 10)
    }

    /// Creates a tracker with explicit lateness tolerance, window, and bucket size.
    pub fn with_config(
        capacities: HashMap<String, u32>,
        max_delay: i64,
        window_seconds: i64,
        bucket_size: i64,
    ) -> Self {
        let lots = capacities
            .into_iter()
            .map(|(lot_id, capacity)| {
                let state = LotState {
                    capacity,
                    occupants: Mutex::new(HashSet::new()),
                    enter_buckets: RingBuffer::new(window_seconds, bucket_size),
                    exit_buckets: RingBuffer::new(window_seconds, bucket_size),
                    snapshots: Mutex::new(Vec::new()),
                };
                (lot_id, state)
            })
            .collect();
        CarparkTracker {
            max_delay,
            window_seconds,
            bucket_size,
            current_time: AtomicI64::new(0),
            lots,
            shards: ShardedLockMap::new(128),
        }
    }

    /// Records that `car_id` entered or exited `lot_id` at `timestamp`. Events may arrive
    /// slightly out of order, up to `max_delay` seconds behind the latest-seen timestamp.
    ///
    /// Returns `false` (a silent no-op) if the lot is unknown, the event is too stale, entering a
    /// full or already-occupied lot, or exiting a lot the car wasn't recorded as being in.
    pub fn record_event(&self, lot_id: &str, car_id: &str, event: CarparkEvent, timestamp: i64) -> bool {
        let Some(lot) = self.lots.get(lot_id) else {
            trace!(lot_id, "unknown lot");
            return false;
        };
        if timestamp < self.current_time.load(Ordering::Acquire) - self.max_delay {
            return false;
        }

        let applied = self.shards.with_lock(&lot_id.to_string(), || {
            let mut occupants = lot.occupants.lock();
            match event {
                CarparkEvent::Enter => {
                    if occupants.len() as u32 >= lot.capacity || occupants.contains(car_id) {
                        return false;
                    }
                    occupants.insert(car_id.to_string());
                    true
                }
                CarparkEvent::Exit => {
                    if !occupants.remove(car_id) {
                        return false;
                    }
                    true
                }
            }
        });
        if !applied {
            return false;
        }

        if timestamp % 60 == 0 {
            self.record_snapshot(lot_id, lot, timestamp);
        }
        match event {
            CarparkEvent::Enter => lot.enter_buckets.add(timestamp, 1),
            CarparkEvent::Exit => lot.exit_buckets.add(timestamp, 1),
        }
        self.current_time.fetch_max(timestamp, Ordering::AcqRel);
        true
    }

    fn record_snapshot(&self, lot_id: &str, lot: &LotState, timestamp: i64) {
        self.shards.with_lock(&lot_id.to_string(), || {
            let occupancy = lot.occupants.lock().len() as i64;
            let mut snapshots = lot.snapshots.lock();
            snapshots.push((timestamp, occupancy));
            let cutoff = self.current_time.load(Ordering::Acquire) - self.window_seconds;
            snapshots.retain(|(ts, _)| *ts > cutoff);
        });
    }

    /// Number of cars currently recorded as inside `lot_id`. `0` for an unknown lot.
    pub fn get_current_occupancy(&self, lot_id: &str) -> usize {
        match self.lots.get(lot_id) {
            Some(lot) => lot.occupants.lock().len(),
            None => 0,
        }
    }

    /// Average occupancy, as a fraction of capacity, over the trailing `last_t_seconds`,
    /// reconstructed by walking the enter/exit ring buffers backward from the current occupancy.
    ///
    /// Clamped to `[bucket_size, window_seconds]`; `0.0` for an unknown lot.
    pub fn get_occupancy_rate_rb(&self, lot_id: &str, last_t_seconds: i64) -> f64 {
        let Some(lot) = self.lots.get(lot_id) else {
            return 0.0;
        };
        let now = self.current_time.load(Ordering::Acquire);
        let last_t_seconds = last_t_seconds.max(self.bucket_size).min(self.window_seconds);
        let cutoff = now - last_t_seconds;

        let mut window_occupancies = vec![lot.occupants.lock().len() as i64];
        let mut prev_change: i64 = 0;
        let mut curr = now;
        while curr - self.bucket_size >= cutoff {
            let curr_change =
                lot.enter_buckets.sum_since(curr) as i64 - lot.exit_buckets.sum_since(curr) as i64;
            let diff = curr_change - prev_change;
            let last = *window_occupancies.last().unwrap();
            window_occupancies.push((last - diff).max(0));
            prev_change = curr_change;
            curr -= self.bucket_size;
        }

        let sum: i64 = window_occupancies.iter().sum();
        let average = sum as f64 / window_occupancies.len() as f64;
        average / lot.capacity as f64
    }

    /// Top `k` lots by magnitude of net occupancy change (entries minus exits) over the trailing
    /// `last_t_seconds`, regardless of direction.
    pub fn get_citywide_trending_lots(&self, last_t_seconds: i64, k: usize) -> Vec<String> {
        let last_t_seconds = last_t_seconds.max(self.bucket_size).min(self.window_seconds);
        let now = self.current_time.load(Ordering::Acquire);
        let cutoff = now - last_t_seconds;

        let mut rates: Vec<(String, f64)> = self
            .lots
            .iter()
            .map(|(lot_id, lot)| {
                let net_change =
                    lot.enter_buckets.sum_since(cutoff) as i64 - lot.exit_buckets.sum_since(cutoff) as i64;
                (lot_id.clone(), net_change as f64 / last_t_seconds as f64)
            })
            .collect();
        rates.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap());
        rates.truncate(k);
        rates.into_iter().map(|(lot_id, _)| lot_id).collect()
    }
}
