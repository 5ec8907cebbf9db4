//! Debug service hooks
//!
//! Every domain owns a `DebugService`. It remembers which thread was tagged as
//! the main thread and fans domain exceptions out to registered observers.
//! An observer that panics is logged and skipped; `report` itself never
//! unwinds.

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

/// One frame of a domain stack trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Declaring type
    pub type_name: String,
    /// Method name
    pub method: String,
    /// Source file and line, when symbols are loaded
    pub location: Option<(String, u32)>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}::{}", self.type_name, self.method)?;
        if let Some((file, line)) = &self.location {
            write!(f, " ({}:{})", file, line)?;
        }
        Ok(())
    }
}

/// An exception raised inside the execution domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainException {
    /// Exception kind, e.g. `NativeError` or `Panic`
    pub kind: String,
    /// Message
    pub message: String,
    /// Domain stack, innermost frame first
    pub stack: Vec<StackFrame>,
}

impl DomainException {
    /// Create an exception with an empty stack
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Append a frame
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.stack.push(frame);
        self
    }

    /// Multi-line report: kind and message, then one line per frame
    pub fn report(&self) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        for frame in &self.stack {
            out.push_str("\n  ");
            out.push_str(&frame.to_string());
        }
        out
    }
}

impl fmt::Display for DomainException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DomainException {}

/// Callback receiving domain exceptions
pub type ExceptionObserver = Arc<dyn Fn(&DomainException) + Send + Sync>;

/// Handle for removing a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Per-domain debugging hooks
#[derive(Default)]
pub struct DebugService {
    main_thread: Mutex<Option<ThreadId>>,
    observers: RwLock<Vec<(ObserverId, ExceptionObserver)>>,
    next_observer: AtomicU64,
    reported: AtomicU64,
}

impl fmt::Debug for DebugService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugService")
            .field("main_thread", &*self.main_thread.lock())
            .field("observers", &self.observers.read().len())
            .field("reported", &self.reported.load(Ordering::Relaxed))
            .finish()
    }
}

impl DebugService {
    /// Create a service with no observers
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the calling thread as the domain's main thread
    pub fn tag_main_thread(&self) {
        *self.main_thread.lock() = Some(std::thread::current().id());
    }

    /// Thread tagged as main, if any
    pub fn main_thread(&self) -> Option<ThreadId> {
        *self.main_thread.lock()
    }

    /// Whether the calling thread is the tagged main thread
    pub fn is_main_thread(&self) -> bool {
        self.main_thread() == Some(std::thread::current().id())
    }

    /// Register an exception observer
    pub fn add_exception_observer(
        &self,
        observer: impl Fn(&DomainException) + Send + Sync + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Remove one observer. Returns whether it was registered.
    pub fn remove_exception_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(registered, _)| *registered != id);
        observers.len() != before
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Drop all observers
    pub fn clear_observers(&self) {
        self.observers.write().clear();
    }

    /// Total exceptions reported through this service
    pub fn reported_count(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    /// Deliver an exception to every observer.
    ///
    /// Returns how many observers completed without panicking.
    pub fn report(&self, exception: &DomainException) -> usize {
        self.reported.fetch_add(1, Ordering::Relaxed);
        // Observers run outside the lock so they may register further observers.
        let observers: Vec<ExceptionObserver> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        let mut delivered = 0;
        for observer in observers {
            match catch_unwind(AssertUnwindSafe(|| observer(exception))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(kind = %exception.kind, "exception observer panicked");
                }
            }
        }
        delivered
    }
}
