use parking_lot::Mutex;
use profscope_model::Profile;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct CacheState {
    profiles: BTreeMap<String, Arc<Profile>>,
    capturing: bool,
}

/// A named, in-memory history of captured profiles.
///
/// Profile names start with the capture timestamp, so sorting them in descending order lists
/// the newest profile first. The cache also owns the flag that allows only one capture at a
/// time; both are guarded by the same lock.
#[derive(Debug, Default)]
pub struct ProfileCache {
    state: Mutex<CacheState>,
}

impl ProfileCache {
    /// Adds a profile, replacing any profile with the same name.
    pub fn insert(&self, name: impl Into<String>, profile: Arc<Profile>) {
        self.state.lock().profiles.insert(name.into(), profile);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Profile>> {
        self.state.lock().profiles.get(name).cloned()
    }

    /// All profile names, newest first.
    pub fn names(&self) -> Vec<String> {
        self.state.lock().profiles.keys().rev().cloned().collect()
    }

    /// The profile with the greatest name.
    pub fn most_recent(&self) -> Option<(String, Arc<Profile>)> {
        self.state
            .lock()
            .profiles
            .last_key_value()
            .map(|(name, profile)| (name.clone(), Arc::clone(profile)))
    }

    /// Removes a profile. Unknown names are ignored.
    pub fn evict(&self, name: &str) {
        self.state.lock().profiles.remove(name);
    }

    pub fn clear(&self) {
        self.state.lock().profiles.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().profiles.is_empty()
    }

    /// Whether a capture currently holds a [CaptureGuard].
    pub fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    /// Marks the start of a capture. Returns [None] if another capture is running.
    ///
    /// The capture ends when the returned guard is dropped.
    pub fn try_begin_capture(&self) -> Option<CaptureGuard<'_>> {
        let mut state = self.state.lock();
        if state.capturing {
            return None;
        }
        state.capturing = true;
        Some(CaptureGuard { cache: self })
    }
}

/// Proof of an ongoing capture, see [ProfileCache::try_begin_capture].
#[derive(Debug)]
#[must_use = "the capture ends when the guard is dropped"]
pub struct CaptureGuard<'cache> {
    cache: &'cache ProfileCache,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.cache.state.lock().capturing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profscope_model::ProfileBuilder;

    fn profile() -> Arc<Profile> {
        Arc::new(ProfileBuilder::new(Vec::new()).build())
    }

    #[test]
    fn lists_names_newest_first() {
        let cache = ProfileCache::default();
        cache.insert("2024-05-01T10:00:00-5Seconds-cpu", profile());
        cache.insert("2024-05-01T10:00:10-5Seconds-heap", profile());
        cache.insert("2024-05-01T09:59:00-30Seconds-cpu", profile());

        assert_eq!(
            cache.names(),
            [
                "2024-05-01T10:00:10-5Seconds-heap",
                "2024-05-01T10:00:00-5Seconds-cpu",
                "2024-05-01T09:59:00-30Seconds-cpu",
            ]
        );
        let (name, _) = cache.most_recent().unwrap();
        assert_eq!(name, "2024-05-01T10:00:10-5Seconds-heap");
    }

    #[test]
    fn most_recent_is_the_greatest_name() {
        let cache = ProfileCache::default();
        assert!(cache.most_recent().is_none());
        for name in ["B", "C", "A"] {
            cache.insert(name, profile());
        }
        assert_eq!(cache.most_recent().unwrap().0, "C");
    }

    #[test]
    fn overwrites_and_evicts() {
        let cache = ProfileCache::default();
        let first = profile();
        let second = profile();
        cache.insert("a", Arc::clone(&first));
        cache.insert("a", Arc::clone(&second));
        cache.insert("b", profile());
        assert_eq!(cache.len(), 2);
        assert!(Arc::ptr_eq(&cache.lookup("a").unwrap(), &second));

        cache.evict("missing");
        cache.evict("a");
        assert_eq!(cache.names(), ["b"]);
        assert!(cache.lookup("a").is_none());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn allows_one_capture_at_a_time() {
        let cache = ProfileCache::default();
        let guard = cache.try_begin_capture();
        assert!(guard.is_some());
        assert!(cache.is_capturing());
        assert!(cache.try_begin_capture().is_none());

        drop(guard);
        assert!(!cache.is_capturing());
        assert!(cache.try_begin_capture().is_some());
        assert!(!cache.is_capturing());
    }
}
