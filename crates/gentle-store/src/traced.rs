use std::sync::Arc;

use gentle_types::{ContentId, Identifier, PointerId};
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::{ContentStore, DataStore, PointerStore};

/// Log target used for every traced operation.
pub const TRACE_TARGET: &str = "gentle::trace";

/// A [`DataStore`] that logs every content and pointer operation at `debug`
/// before handing it to the wrapped store.
pub struct TracedStore<S> {
    content: TracedContent<S>,
    pointers: TracedPointers<S>,
}

impl<S: DataStore> TracedStore<S> {
    pub fn new(inner: S) -> Self {
        let inner = Arc::new(inner);
        Self {
            content: TracedContent(Arc::clone(&inner)),
            pointers: TracedPointers(inner),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.content.0
    }
}

struct TracedContent<S>(Arc<S>);

struct TracedPointers<S>(Arc<S>);

fn outcome<T>(result: &StoreResult<T>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "error"
    }
}

impl<S: DataStore> ContentStore for TracedContent<S> {
    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        let result = self.0.content().put(data);
        debug!(target: TRACE_TARGET, op = "content.put", bytes = data.len(),
            id = ?result.as_ref().ok(), "{}", outcome(&result));
        result
    }

    fn get(&self, id: &ContentId) -> StoreResult<Vec<u8>> {
        let result = self.0.content().get(id);
        debug!(target: TRACE_TARGET, op = "content.get", %id,
            bytes = result.as_ref().map_or(0, Vec::len), "{}", outcome(&result));
        result
    }

    fn contains(&self, id: &ContentId) -> StoreResult<bool> {
        let result = self.0.content().contains(id);
        debug!(target: TRACE_TARGET, op = "content.contains", %id,
            found = ?result.as_ref().ok(), "{}", outcome(&result));
        result
    }

    fn delete(&self, id: &ContentId) -> StoreResult<()> {
        let result = self.0.content().delete(id);
        debug!(target: TRACE_TARGET, op = "content.delete", %id, "{}", outcome(&result));
        result
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<ContentId>> {
        let result = self.0.content().find(prefix);
        debug!(target: TRACE_TARGET, op = "content.find", prefix,
            count = result.as_ref().map_or(0, Vec::len), "{}", outcome(&result));
        result
    }
}

impl<S: DataStore> PointerStore for TracedPointers<S> {
    fn set(&self, id: &PointerId, target: &ContentId) -> StoreResult<()> {
        let result = self.0.pointers().set(id, target);
        debug!(target: TRACE_TARGET, op = "pointer.set", %id, %target, "{}", outcome(&result));
        result
    }

    fn get(&self, id: &PointerId) -> StoreResult<ContentId> {
        let result = self.0.pointers().get(id);
        debug!(target: TRACE_TARGET, op = "pointer.get", %id,
            target = ?result.as_ref().ok(), "{}", outcome(&result));
        result
    }

    fn contains(&self, id: &PointerId) -> StoreResult<bool> {
        let result = self.0.pointers().contains(id);
        debug!(target: TRACE_TARGET, op = "pointer.contains", %id,
            found = ?result.as_ref().ok(), "{}", outcome(&result));
        result
    }

    fn delete(&self, id: &PointerId) -> StoreResult<()> {
        let result = self.0.pointers().delete(id);
        debug!(target: TRACE_TARGET, op = "pointer.delete", %id, "{}", outcome(&result));
        result
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<PointerId>> {
        let result = self.0.pointers().find(prefix);
        debug!(target: TRACE_TARGET, op = "pointer.find", prefix,
            count = result.as_ref().map_or(0, Vec::len), "{}", outcome(&result));
        result
    }

    fn compare_and_set(
        &self,
        id: &PointerId,
        expected: Option<&ContentId>,
        new: &ContentId,
    ) -> StoreResult<()> {
        let result = self.0.pointers().compare_and_set(id, expected, new);
        debug!(target: TRACE_TARGET, op = "pointer.compare_and_set", %id,
            ?expected, %new, "{}", outcome(&result));
        result
    }
}

impl<S: DataStore> DataStore for TracedStore<S> {
    fn content(&self) -> &dyn ContentStore {
        &self.content
    }

    fn pointers(&self) -> &dyn PointerStore {
        &self.pointers
    }

    /// Handed to the wrapped store whole, so a backend that reads both
    /// spaces from one snapshot keeps doing so.
    fn find(&self, prefix: &str) -> StoreResult<Vec<Identifier>> {
        let result = DataStore::find(self.inner(), prefix);
        debug!(target: TRACE_TARGET, op = "find", prefix,
            count = result.as_ref().map_or(0, Vec::len), "{}", outcome(&result));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDataStore;
    use std::io;
    use std::sync::Mutex;

    /// Collects formatted log lines.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run `f` with debug logging captured, returning what was logged.
    fn capture(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.text()
    }

    #[test]
    fn traced_store_passes_through() {
        let store = TracedStore::new(InMemoryDataStore::new());
        let id = store.content().put(b"traced").unwrap();
        assert_eq!(store.content().get(&id).unwrap(), b"traced");
        let p = store.new_pointer(&id).unwrap();
        assert_eq!(store.get_pointer(&p).unwrap(), id);
        assert_eq!(store.find("").unwrap().len(), 2);

        // Writes land in the wrapped store.
        assert!(store.inner().content().contains(&id).unwrap());
        assert!(store.inner().pointers().contains(&p).unwrap());
    }

    #[test]
    fn traced_store_passes_errors_through() {
        let store = TracedStore::new(InMemoryDataStore::new());
        let missing = ContentId::digest(b"missing");
        assert!(store.content().get(&missing).unwrap_err().is_not_found());
        assert!(store.content().delete(&missing).is_err());
    }

    #[test]
    fn every_operation_is_logged_under_the_trace_target() {
        let store = TracedStore::new(InMemoryDataStore::new());
        let mut id = None;
        let logged = capture(|| {
            let c = store.content().put(b"logged").unwrap();
            store.new_pointer(&c).unwrap();
            id = Some(c);
        });
        let id = id.unwrap();

        let lines: Vec<&str> = logged.lines().collect();
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|line| line.contains(TRACE_TARGET)));
        for op in ["content.put", "content.contains", "pointer.compare_and_set"] {
            assert!(logged.contains(op), "no {op} line in:\n{logged}");
        }
        assert!(logged.contains(&id.to_hex()));
        assert!(!logged.contains("error"));

        let logged = capture(|| {
            assert_eq!(store.find("").unwrap().len(), 2);
        });
        assert_eq!(logged.lines().count(), 1);
        assert!(logged.contains("count=2"));
    }

    #[test]
    fn failures_are_logged_as_errors() {
        let store = TracedStore::new(InMemoryDataStore::new());
        let missing = ContentId::digest(b"missing");
        let logged = capture(|| {
            assert!(store.content().get(&missing).is_err());
        });
        let line = logged
            .lines()
            .find(|line| line.contains("content.get"))
            .unwrap();
        assert!(line.contains("error"));
        assert!(line.contains(&missing.to_hex()));
    }
}
