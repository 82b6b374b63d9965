//! In-process `FastCache` implementation.
//!
//! Mirrors the Redis semantics the engine relies on: sorted sets order by
//! score, then member bytes; rank ranges are inclusive and accept negative
//! indices. Used by the `memory` storage backend and the test suite.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::FastCache;
use crate::shared::error::AppError;

/// Score wrapper with a total order.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    ordered: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) -> bool {
        let previous = self.scores.insert(member.to_string(), score);
        if let Some(old) = previous {
            self.ordered.remove(&(Score(old), member.to_string()));
        }
        self.ordered.insert((Score(score), member.to_string()));
        previous.is_none()
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(Score(score), member.to_string()));
                true
            }
            None => false,
        }
    }

    fn range(&self, start: isize, stop: isize) -> Vec<String> {
        let len = self.ordered.len() as isize;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Vec::new();
        }

        self.ordered
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn range_by_score(&self, min: f64, max: f64) -> Vec<String> {
        self.ordered
            .iter()
            .filter(|(score, _)| score.0 >= min && score.0 <= max)
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<i64>>,
    sorted_sets: HashMap<String, SortedSet>,
}

impl Keyspace {
    fn remove(&mut self, key: &str) -> bool {
        let string = self.strings.remove(key).is_some();
        let hash = self.hashes.remove(key).is_some();
        let set = self.sets.remove(key).is_some();
        let sorted = self.sorted_sets.remove(key).is_some();
        string || hash || set || sorted
    }
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    keyspace: RwLock<Keyspace>,
    unavailable: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every operation fails with `AppError::Cache`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(AppError::Cache("cache unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FastCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.check()?;
        Ok(self.keyspace.read().strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.check()?;
        self.keyspace
            .write()
            .strings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, AppError> {
        self.check()?;
        let mut keyspace = self.keyspace.write();
        Ok(keys.iter().filter(|key| keyspace.remove(key)).count() as u64)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .read()
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), AppError> {
        self.check()?;
        self.keyspace
            .write()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, AppError> {
        self.check()?;
        let mut keyspace = self.keyspace.write();
        let Some(hash) = keyspace.hashes.get_mut(key) else {
            return Ok(false);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            keyspace.hashes.remove(key);
        }
        Ok(removed)
    }

    async fn sadd(&self, key: &str, member: i64) -> Result<bool, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .write()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member))
    }

    async fn srem(&self, key: &str, member: i64) -> Result<bool, AppError> {
        self.check()?;
        let mut keyspace = self.keyspace.write();
        let Some(set) = keyspace.sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(&member);
        if set.is_empty() {
            keyspace.sets.remove(key);
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<i64>, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .read()
            .sets
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn sismember(&self, key: &str, member: i64) -> Result<bool, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .read()
            .sets
            .get(key)
            .is_some_and(|set| set.contains(&member)))
    }

    async fn scard(&self, key: &str) -> Result<u64, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .read()
            .sets
            .get(key)
            .map_or(0, |set| set.len() as u64))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .write()
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member, score))
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<u64, AppError> {
        self.check()?;
        let mut keyspace = self.keyspace.write();
        let Some(zset) = keyspace.sorted_sets.get_mut(key) else {
            return Ok(0);
        };
        let removed = members.iter().filter(|m| zset.remove(m)).count() as u64;
        if zset.is_empty() {
            keyspace.sorted_sets.remove(key);
        }
        Ok(removed)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .read()
            .sorted_sets
            .get(key)
            .and_then(|zset| zset.scores.get(member).copied()))
    }

    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .read()
            .sorted_sets
            .get(key)
            .map(|zset| zset.range(start, stop))
            .unwrap_or_default())
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, AppError> {
        self.check()?;
        Ok(self
            .keyspace
            .read()
            .sorted_sets
            .get(key)
            .map(|zset| zset.range_by_score(min, max))
            .unwrap_or_default())
    }

    async fn flush(&self) -> Result<(), AppError> {
        self.check()?;
        *self.keyspace.write() = Keyspace::default();
        Ok(())
    }
}
