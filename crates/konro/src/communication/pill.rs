use std::thread;

/// A poison pill that surfaces panics from the background admission task.
///
/// The admission loop runs detached from every caller. If it panics, the
/// requests it owns would otherwise wait forever on streams nobody will
/// ever feed. A `Pill` moved into the task detects, via
/// `thread::panicking()` in its `Drop`, that it is being dropped during
/// unwinding and re-panics, turning a silent hang into a loud failure.
pub(crate) struct Pill {}

impl Pill {
    pub fn new() -> Self {
        Self {}
    }
}

impl Drop for Pill {
    fn drop(&mut self) {
        if thread::panicking() {
            panic!("admission task panicked - propagating");
        }
    }
}
