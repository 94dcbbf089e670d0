//! Store wrappers that count or fail calls on top of `InMemoryStore`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use storeflow::{
    ChangeSet, InMemoryStore, ObjectId, Outcome, PersistenceStore, Query, Record, RequestError,
};

/// Counts every store call and forwards it.
#[derive(Clone, Default)]
pub struct SpyStore {
    pub inner: InMemoryStore,
    calls: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl SpyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call, reads and writes.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl PersistenceStore for SpyStore {
    fn fetch(&self, query: &Query) -> Outcome<Vec<Record>> {
        self.touch();
        self.inner.fetch(query)
    }

    fn commit(&self, changes: ChangeSet) -> Outcome<()> {
        self.touch();
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit(changes)
    }

    fn next_object_id(&self) -> Outcome<ObjectId> {
        self.touch();
        self.inner.next_object_id()
    }

    fn persist_to_durable(&self) -> Outcome<()> {
        self.touch();
        self.inner.persist_to_durable()
    }
}

/// Fails the first `failures` commits with a persistence error.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    failures: usize,
    attempts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            failures,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PersistenceStore for FlakyStore {
    fn fetch(&self, query: &Query) -> Outcome<Vec<Record>> {
        self.inner.fetch(query)
    }

    fn commit(&self, changes: ChangeSet) -> Outcome<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(RequestError::persistence(format!("disk busy (attempt {})", attempt)));
        }
        self.inner.commit(changes)
    }

    fn next_object_id(&self) -> Outcome<ObjectId> {
        self.inner.next_object_id()
    }

    fn persist_to_durable(&self) -> Outcome<()> {
        self.inner.persist_to_durable()
    }
}

/// Blocks every fetch until `open` is called.
#[derive(Clone, Default)]
pub struct GateStore {
    pub inner: InMemoryStore,
    gate: Arc<(std::sync::Mutex<bool>, std::sync::Condvar)>,
}

impl GateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, opened) = &*self.gate;
        *lock.lock().unwrap() = true;
        opened.notify_all();
    }

    fn wait_open(&self) {
        let (lock, opened) = &*self.gate;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = opened.wait(open).unwrap();
        }
    }
}

impl PersistenceStore for GateStore {
    fn fetch(&self, query: &Query) -> Outcome<Vec<Record>> {
        self.wait_open();
        self.inner.fetch(query)
    }

    fn commit(&self, changes: ChangeSet) -> Outcome<()> {
        self.inner.commit(changes)
    }

    fn next_object_id(&self) -> Outcome<ObjectId> {
        self.inner.next_object_id()
    }

    fn persist_to_durable(&self) -> Outcome<()> {
        self.inner.persist_to_durable()
    }
}
