//! A per-session cache in front of the suggestion engine. While the user
//! keeps typing the same token, the last computed list is narrowed instead of
//! asking the (possibly slow) completion providers again.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{self, RecvTimeoutError, Sender};

use crate::config::CacheConfig;
use crate::worker::{self, Work};

/// Drops the last `delta` characters of `partial`.
pub fn cutoff(partial: &str, delta: usize) -> &str {
    let keep = partial.chars().count().saturating_sub(delta);
    match partial.char_indices().nth(keep) {
        Some((at, _)) => &partial[..at],
        None => partial,
    }
}

fn narrow(candidates: &[String], partial: &str) -> Vec<String> {
    candidates
        .iter()
        .filter(|candidate| candidate.starts_with(partial))
        .cloned()
        .collect()
}

#[derive(Debug, Clone)]
struct Entry {
    token_count: usize,
    scope: String,
    /// The truncated partial value `candidates` was computed for.
    baseline: String,
    candidates: Vec<String>,
    touched: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.touched) >= ttl
    }

    fn covers(&self, token_count: usize, scope: &str, partial: &str) -> bool {
        self.token_count == token_count && self.scope == scope && partial.starts_with(&self.baseline)
    }
}

struct Inner<K> {
    config: CacheConfig,
    entries: Mutex<HashMap<K, Entry>>,
    /// The last deferred computation of each session. Finished ones are
    /// replaced or swept lazily.
    pending: Mutex<HashMap<K, Work>>,
}

impl<K: Hash + Eq + Clone> Inner<K> {
    fn entries(&self) -> MutexGuard<HashMap<K, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pending(&self) -> MutexGuard<HashMap<K, Work>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Narrows a live entry covering the request.
    fn lookup(&self, key: &K, token_count: usize, scope: &str, partial: &str) -> Option<Vec<String>> {
        let now = Instant::now();
        let ttl = self.config.time_to_live();
        let mut entries = self.entries();
        let entry = entries.get_mut(key)?;
        if entry.is_expired(now, ttl) {
            trace!("cache: expired entry");
            entries.remove(key);
            return None;
        }

        if !entry.covers(token_count, scope, partial) {
            return None;
        }

        if self.config.refresh_on_read {
            entry.touched = now;
        }

        trace!("cache: hit for `{}' (baseline `{}')", partial, entry.baseline);
        Some(narrow(&entry.candidates, partial))
    }

    fn install(&self, key: K, entry: Entry) {
        let mut entries = self.entries();
        entries.insert(key, entry);
        if self.config.reclaimable {
            Inner::reclaim(&mut entries, self.config.max_entries);
        }
    }

    /// Drops the least recently touched entries until at most `max` remain.
    fn reclaim(entries: &mut HashMap<K, Entry>, max: usize) {
        if entries.len() <= max {
            return;
        }

        let mut by_age: Vec<(Instant, K)> = entries
            .iter()
            .map(|(key, entry)| (entry.touched, key.clone()))
            .collect();
        by_age.sort_by_key(|(touched, _)| *touched);
        let excess = entries.len() - max;
        for (_, key) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }
        debug!("cache: reclaimed {} entries", excess);
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.config.time_to_live();
        self.pending().retain(|_, work| !work.is_done());

        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, ttl));
        if self.config.reclaimable {
            Inner::reclaim(&mut entries, self.config.max_entries);
        }
        before - entries.len()
    }
}

/// Keeps the sweeper thread alive. Dropping it disconnects the channel and
/// the thread exits at its next wakeup.
struct Sweeper {
    _shutdown: Sender<()>,
}

fn start_sweeper<K>(inner: Weak<Inner<K>>, interval: Duration) -> Option<Sweeper>
where
    K: Hash + Eq + Clone + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded::<()>(0);
    let spawned = thread::Builder::new()
        .name("cmdtree-cache-sweeper".to_owned())
        .spawn(move || loop {
            match rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => match inner.upgrade() {
                    Some(inner) => {
                        let removed = inner.sweep();
                        if removed > 0 {
                            trace!("cache: swept {} entries", removed);
                        }
                    }
                    None => break,
                },
                _ => break,
            }
        });

    match spawned {
        Ok(_) => Some(Sweeper { _shutdown: tx }),
        Err(err) => {
            warn!("cache: failed to start the sweeper: {}", err);
            None
        }
    }
}

/// The suggestion cache, keyed by session (usually the issuer's name).
pub struct SuggestionCache<K> {
    inner: Arc<Inner<K>>,
    _sweeper: Option<Sweeper>,
}

impl<K> SuggestionCache<K>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> SuggestionCache<K> {
        let interval = config.sweep_interval();
        let inner = Arc::new(Inner {
            config,
            entries: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        });

        let sweeper = interval.and_then(|interval| start_sweeper(Arc::downgrade(&inner), interval));
        SuggestionCache {
            inner,
            _sweeper: sweeper,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the candidates for `partial`, the value being typed as the
    /// `token_count`-th token.
    ///
    /// If the session's last computation was for the same token count and
    /// `partial` still extends its baseline, the retained list is narrowed
    /// without calling `compute`. Otherwise `compute` is called with
    /// `partial` minus its last `cutoff_delta` characters; the result becomes
    /// the new baseline and is returned narrowed to `partial`.
    pub fn get<F>(&self, key: &K, token_count: usize, partial: &str, compute: F) -> Vec<String>
    where
        F: FnOnce(&str) -> Vec<String>,
    {
        self.get_scoped(key, token_count, "", partial, compute)
    }

    /// Like [`get`](Self::get), but an entry only serves requests with the
    /// same `scope` (e.g. the completion context and the tokens before the
    /// one being typed).
    pub fn get_scoped<F>(
        &self,
        key: &K,
        token_count: usize,
        scope: &str,
        partial: &str,
        compute: F,
    ) -> Vec<String>
    where
        F: FnOnce(&str) -> Vec<String>,
    {
        if let Some(candidates) = self.inner.lookup(key, token_count, scope, partial) {
            return candidates;
        }

        let baseline = cutoff(partial, self.inner.config.cutoff_delta);
        trace!("cache: miss for `{}', computing `{}'", partial, baseline);
        let candidates = compute(baseline);
        let narrowed = narrow(&candidates, partial);
        self.inner.install(
            key.clone(),
            Entry {
                token_count,
                scope: scope.to_owned(),
                baseline: baseline.to_owned(),
                candidates,
                touched: Instant::now(),
            },
        );
        narrowed
    }

    /// The deferred variant of [`get_scoped`](Self::get_scoped). Never
    /// blocks: on a miss `compute` is queued on the worker pool (unless one
    /// is already in flight for `key`) and an empty list is returned. The
    /// result is installed when the computation completes, so a later
    /// request can be narrowed from it.
    pub fn get_async<F>(
        &self,
        key: &K,
        token_count: usize,
        scope: &str,
        partial: &str,
        compute: F,
    ) -> Vec<String>
    where
        F: FnOnce(&str) -> Vec<String> + Send + 'static,
    {
        if let Some(candidates) = self.inner.lookup(key, token_count, scope, partial) {
            return candidates;
        }

        // Held across the submission so that two requests cannot both queue
        // a computation for the same session.
        let mut pending = self.inner.pending();
        if pending.get(key).map_or(false, |work| !work.is_done()) {
            trace!("cache: computation already in flight");
            return Vec::new();
        }

        let inner = self.inner.clone();
        let installed_key = key.clone();
        let scope = scope.to_owned();
        let baseline = cutoff(partial, self.inner.config.cutoff_delta).to_owned();
        let work = worker::spawn(move || {
            let candidates = compute(&baseline);
            // Installed even if the session has moved on; the last completed
            // computation wins.
            inner.install(
                installed_key,
                Entry {
                    token_count,
                    scope,
                    baseline,
                    candidates,
                    touched: Instant::now(),
                },
            );
        });
        pending.insert(key.clone(), work);

        Vec::new()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.inner
            .pending()
            .get(key)
            .map_or(false, |work| !work.is_done())
    }

    /// Waits until no deferred computation is in flight for `key`. Returns
    /// `false` on timeout.
    pub fn wait_pending(&self, key: &K, timeout: Duration) -> bool {
        let work = match self.inner.pending().get(key) {
            Some(work) => work.clone(),
            None => return true,
        };
        work.wait_timeout(timeout)
    }

    /// Forgets the entry of `key`.
    pub fn invalidate(&self, key: &K) {
        self.inner.entries().remove(key);
    }

    /// Removes expired entries now. The background sweeper calls this
    /// periodically.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    const NAMES: &[&str] = &["alex", "alice", "alfred", "bob", "bobby", "pim", "pimmetje"];

    fn compute(prefix: &str) -> Vec<String> {
        NAMES
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| (*name).to_owned())
            .collect()
    }

    fn quiet_config() -> CacheConfig {
        CacheConfig {
            sweep_interval_ms: 0,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn cutoffs() {
        assert_eq!(cutoff("abcd", 2), "ab");
        assert_eq!(cutoff("a", 2), "");
        assert_eq!(cutoff("", 2), "");
        assert_eq!(cutoff("äöü", 1), "äö");
        assert_eq!(cutoff("abc", 0), "abc");
    }

    #[test]
    fn narrowing_matches_direct_computation() {
        let cache = SuggestionCache::new(quiet_config());
        let calls = Cell::new(0);
        let key = "session".to_owned();

        for partial in &["a", "al", "ali", "alic", "alice"] {
            let result = cache.get(&key, 3, partial, |prefix| {
                calls.set(calls.get() + 1);
                compute(prefix)
            });
            assert_eq!(result, compute(partial));
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn backtracking() {
        let cache = SuggestionCache::new(quiet_config());
        let calls = Cell::new(0);
        let key = "session".to_owned();
        let get = |partial: &str| {
            cache.get(&key, 1, partial, |prefix| {
                calls.set(calls.get() + 1);
                compute(prefix)
            })
        };

        assert_eq!(get("bobb"), vec!["bobby"]);
        // One character back still extends the baseline `bo`.
        assert_eq!(get("bob"), vec!["bob", "bobby"]);
        assert_eq!(calls.get(), 1);
        // A different token invalidates.
        assert_eq!(get("pi"), vec!["pim", "pimmetje"]);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn token_count_and_scope() {
        let cache = SuggestionCache::new(quiet_config());
        let calls = Cell::new(0);
        let key = 7u32;
        let counting = |prefix: &str| {
            calls.set(calls.get() + 1);
            compute(prefix)
        };

        cache.get(&key, 1, "al", counting);
        cache.get(&key, 2, "al", counting);
        assert_eq!(calls.get(), 2);
        cache.get_scoped(&key, 2, "value:-p", "al", counting);
        assert_eq!(calls.get(), 3);
        cache.get_scoped(&key, 2, "value:-p", "ale", counting);
        assert_eq!(calls.get(), 3);
        cache.get(&7u32, 2, "ale", counting);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn sessions_are_independent() {
        let cache = SuggestionCache::new(quiet_config());
        let calls = Cell::new(0);
        let counting = |prefix: &str| {
            calls.set(calls.get() + 1);
            compute(prefix)
        };

        cache.get(&"alice", 1, "b", counting);
        cache.get(&"bob", 1, "b", counting);
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);
        cache.invalidate(&"alice");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expiry() {
        let cache = SuggestionCache::new(CacheConfig {
            time_to_live_ms: 0,
            ..quiet_config()
        });
        let calls = Cell::new(0);
        let counting = |prefix: &str| {
            calls.set(calls.get() + 1);
            compute(prefix)
        };

        cache.get(&1, 1, "al", counting);
        cache.get(&1, 1, "ali", counting);
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn background_sweep() {
        let cache = SuggestionCache::new(CacheConfig {
            time_to_live_ms: 10,
            sweep_interval_ms: 5,
            ..CacheConfig::default()
        });
        cache.get(&1, 1, "al", compute);
        assert_eq!(cache.len(), 1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !cache.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn reclaimable() {
        let cache = SuggestionCache::new(CacheConfig {
            reclaimable: true,
            max_entries: 2,
            ..quiet_config()
        });
        for key in 0..5 {
            cache.get(&key, 1, "a", compute);
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(cache.len(), 2);

        let calls = Cell::new(0);
        cache.get(&4, 1, "al", |prefix| {
            calls.set(calls.get() + 1);
            compute(prefix)
        });
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn deferred() {
        let cache = SuggestionCache::new(quiet_config());
        let key = "session".to_owned();

        let first = cache.get_async(&key, 2, "", "al", |prefix| {
            thread::sleep(Duration::from_millis(20));
            compute(prefix)
        });
        assert!(first.is_empty());
        // A second request while the first is in flight does not queue more
        // work and does not block.
        let second = cache.get_async(&key, 2, "", "ali", |_| panic!("must not run"));
        assert!(second.is_empty());

        assert!(cache.wait_pending(&key, Duration::from_secs(5)));
        assert!(!cache.is_pending(&key));
        let landed = cache.get_async(&key, 2, "", "ali", |_| panic!("must not run"));
        assert_eq!(landed, vec!["alice"]);
    }

    #[test]
    fn reads_extend_lifetime() {
        let ttl = CacheConfig {
            time_to_live_ms: 300,
            ..quiet_config()
        };
        let calls = Cell::new(0);
        let counting = |prefix: &str| {
            calls.set(calls.get() + 1);
            compute(prefix)
        };

        let refreshing = SuggestionCache::new(ttl.clone());
        refreshing.get(&1, 1, "a", counting);
        thread::sleep(Duration::from_millis(200));
        refreshing.get(&1, 1, "al", counting);
        thread::sleep(Duration::from_millis(200));
        // 400ms after the write, but only 200ms after the last read.
        assert_eq!(refreshing.get(&1, 1, "ali", counting), vec!["alice"]);
        assert_eq!(calls.get(), 1);

        calls.set(0);
        let fixed = SuggestionCache::new(CacheConfig {
            refresh_on_read: false,
            ..ttl
        });
        fixed.get(&1, 1, "a", counting);
        thread::sleep(Duration::from_millis(200));
        fixed.get(&1, 1, "al", counting);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fixed.get(&1, 1, "ali", counting), vec!["alice"]);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn superseded_computation_still_lands() {
        let cache = SuggestionCache::new(quiet_config());
        let key = "session".to_owned();
        let (tx, rx) = crossbeam_channel::bounded::<()>(0);

        let first = cache.get_async(&key, 2, "value", "al", move |prefix| {
            rx.recv().ok();
            compute(prefix)
        });
        assert!(first.is_empty());

        // The session moved on to another token; nothing new is queued while
        // the first computation runs.
        let moved_on = cache.get_async(&key, 3, "positional", "b", |_| panic!("must not run"));
        assert!(moved_on.is_empty());
        assert!(!cache.wait_pending(&key, Duration::from_millis(10)));

        tx.send(()).unwrap();
        assert!(cache.wait_pending(&key, Duration::from_secs(u64::MAX)));
        assert_eq!(cache.len(), 1);
        let narrowed = cache.get_async(&key, 2, "value", "ali", |_| panic!("must not run"));
        assert_eq!(narrowed, vec!["alice"]);
    }

    #[test]
    fn wait_without_pending_work() {
        let cache: SuggestionCache<u8> = SuggestionCache::new(quiet_config());
        assert!(cache.wait_pending(&1, Duration::from_secs(u64::MAX)));
        assert!(!cache.is_pending(&1));
    }

    #[test]
    fn deferred_panic_clears_pending() {
        let cache = SuggestionCache::new(quiet_config());
        let key = 1u8;
        cache.get_async(&key, 1, "", "x", |_| panic!("provider failed"));
        assert!(cache.wait_pending(&key, Duration::from_secs(5)));
        assert!(cache.is_empty());
    }
}
