use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces a unique string per call.
///
/// Pools consult their generator once per submitted job; the same id is
/// stamped on the resulting output.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn generate(&self) -> String;
}

/// Default generator: a prefix followed by a zero-padded counter.
#[derive(Debug)]
pub struct Sequential {
    prefix: String,
    width: usize,
    id: AtomicU64,
}

impl Sequential {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_width(prefix, 6)
    }

    /// `width` is the minimum number of digits; longer counters are not truncated.
    pub fn with_width(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
            id: AtomicU64::new(0),
        }
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.id.load(Ordering::Relaxed)
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new("JOB-")
    }
}

impl IdGenerator for Sequential {
    fn generate(&self) -> String {
        let n = self.id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{:0width$}", self.prefix, n, width = self.width)
    }
}
