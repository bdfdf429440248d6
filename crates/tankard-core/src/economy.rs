//! Tavern economy: integer basis-point pricing, expiring market modifiers,
//! and the job table. All arithmetic is integral; drift and market events
//! sample from the session seed.

use std::collections::BTreeMap;

use contracts::{clock_stamp, EconomyRecord, EconomyView, JobDefinition, PriceModifier};

use crate::seed::{mix_seed, sample_range_i64};

/// 10_000 bps == a 1.0x multiplier.
pub const PAR_BPS: i64 = 10_000;

const DRIFT_FLOOR_BPS: i64 = 7_000;
const DRIFT_CEIL_BPS: i64 = 14_000;

// Stream salts keep the daily rolls independent of each other.
const STREAM_DRIFT: u64 = 0x5eed_0001;
const STREAM_EVENT_ROLL: u64 = 0x5eed_0002;
const STREAM_EVENT_STRENGTH: u64 = 0x5eed_0003;
const STREAM_EVENT_DURATION: u64 = 0x5eed_0004;

#[derive(Debug)]
pub struct Economy {
    base_multiplier_bps: i64,
    modifiers: Vec<PriceModifier>,
    jobs: BTreeMap<String, JobDefinition>,
}

impl Economy {
    pub fn new(jobs: impl IntoIterator<Item = JobDefinition>) -> Self {
        Self {
            base_multiplier_bps: PAR_BPS,
            modifiers: Vec::new(),
            jobs: jobs.into_iter().map(|job| (job.id.clone(), job)).collect(),
        }
    }

    pub fn restore(record: &EconomyRecord, jobs: impl IntoIterator<Item = JobDefinition>) -> Self {
        let mut economy = Self::new(jobs);
        economy.base_multiplier_bps = record
            .base_multiplier_bps
            .clamp(DRIFT_FLOOR_BPS, DRIFT_CEIL_BPS);
        economy.modifiers = record.modifiers.clone();
        economy
    }

    pub fn record(&self) -> EconomyRecord {
        EconomyRecord {
            base_multiplier_bps: self.base_multiplier_bps,
            modifiers: self.modifiers.clone(),
        }
    }

    /// Effective multiplier: the base drift compounded with every active
    /// modifier.
    pub fn multiplier_bps(&self) -> i64 {
        self.modifiers
            .iter()
            .fold(self.base_multiplier_bps, |acc, modifier| {
                acc * modifier.multiplier_bps / PAR_BPS
            })
    }

    /// Current price for a base price, never below 1 gold.
    pub fn price_of(&self, base_price: i64) -> i64 {
        (base_price * self.multiplier_bps() / PAR_BPS).max(1)
    }

    pub fn job(&self, job_id: &str) -> Option<&JobDefinition> {
        self.jobs.get(job_id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.values()
    }

    /// Drop modifiers whose expiry has passed; returns them for event
    /// emission.
    pub fn expire_modifiers(&mut self, now: f64) -> Vec<PriceModifier> {
        let (expired, live): (Vec<_>, Vec<_>) = self
            .modifiers
            .drain(..)
            .partition(|modifier| modifier.expires_at_hour <= now);
        self.modifiers = live;
        expired
    }

    /// Daily seeded random walk of the base multiplier, clamped to a sane
    /// band. Returns the new base.
    pub fn drift_for_day(&mut self, seed: u64, day: u64) -> i64 {
        let delta = sample_range_i64(mix_seed(seed, STREAM_DRIFT), day, -400, 500);
        self.base_multiplier_bps =
            (self.base_multiplier_bps + delta).clamp(DRIFT_FLOOR_BPS, DRIFT_CEIL_BPS);
        self.base_multiplier_bps
    }

    /// Roughly one day in four spawns a market event (a festival surge or a
    /// supply glut) as an expiring modifier. Deterministic per (seed, day).
    pub fn spawn_daily_event(&mut self, seed: u64, day: u64, now: f64) -> Option<PriceModifier> {
        let roll = sample_range_i64(mix_seed(seed, STREAM_EVENT_ROLL), day, 0, 99);
        if roll >= 25 {
            return None;
        }

        let multiplier_bps =
            sample_range_i64(mix_seed(seed, STREAM_EVENT_STRENGTH), day, 8_500, 12_500);
        let duration = sample_range_i64(mix_seed(seed, STREAM_EVENT_DURATION), day, 6, 18) as f64;
        let modifier = PriceModifier {
            modifier_id: format!("market:{}", clock_stamp(now)),
            multiplier_bps,
            expires_at_hour: now + duration,
        };
        self.modifiers.push(modifier.clone());
        Some(modifier)
    }

    pub fn view(&self) -> EconomyView {
        EconomyView {
            price_multiplier_bps: self.multiplier_bps(),
            active_modifiers: self.modifiers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, wage: i64) -> JobDefinition {
        JobDefinition {
            id: id.to_string(),
            name: id.to_string(),
            wage,
            duration_hours: 2.0,
        }
    }

    #[test]
    fn price_at_par_is_the_base_price() {
        let economy = Economy::new(vec![job("wash_dishes", 3)]);
        assert_eq!(economy.price_of(4), 4);
        assert_eq!(economy.multiplier_bps(), PAR_BPS);
    }

    #[test]
    fn modifiers_compound_and_expire() {
        let mut economy = Economy::new(Vec::new());
        economy.modifiers.push(PriceModifier {
            modifier_id: "m1".to_string(),
            multiplier_bps: 12_000,
            expires_at_hour: 10.0,
        });
        assert_eq!(economy.price_of(10), 12);

        let expired = economy.expire_modifiers(9.0);
        assert!(expired.is_empty());
        let expired = economy.expire_modifiers(10.0);
        assert_eq!(expired.len(), 1);
        assert_eq!(economy.price_of(10), 10);
    }

    #[test]
    fn price_never_drops_below_one() {
        let mut economy = Economy::new(Vec::new());
        economy.base_multiplier_bps = DRIFT_FLOOR_BPS;
        assert_eq!(economy.price_of(1), 1);
    }

    #[test]
    fn drift_is_deterministic_and_clamped() {
        let mut economy_one = Economy::new(Vec::new());
        let mut economy_two = Economy::new(Vec::new());
        for day in 0..400 {
            let a = economy_one.drift_for_day(1337, day);
            let b = economy_two.drift_for_day(1337, day);
            assert_eq!(a, b);
            assert!((DRIFT_FLOOR_BPS..=DRIFT_CEIL_BPS).contains(&a));
        }
    }

    #[test]
    fn daily_event_is_deterministic_per_day() {
        let mut economy_one = Economy::new(Vec::new());
        let mut economy_two = Economy::new(Vec::new());
        for day in 0..40 {
            let now = day as f64 * 24.0;
            let a = economy_one.spawn_daily_event(99, day, now);
            let b = economy_two.spawn_daily_event(99, day, now);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn record_round_trips() {
        let mut economy = Economy::new(vec![job("cellar_shift", 8)]);
        economy.drift_for_day(7, 0);
        economy.spawn_daily_event(7, 0, 24.0);
        let record = economy.record();

        let restored = Economy::restore(&record, vec![job("cellar_shift", 8)]);
        assert_eq!(restored.multiplier_bps(), economy.multiplier_bps());
    }
}
