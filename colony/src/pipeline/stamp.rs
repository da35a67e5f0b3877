use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use colony_api::{IdGenerator, Job};

/// Wraps inputs into [`Job`]s with a fresh id and the next sequence number.
pub(crate) struct JobStamper {
    sequence: AtomicU64,
    generator: Arc<dyn IdGenerator>,
}

impl JobStamper {
    pub(crate) fn new(generator: Arc<dyn IdGenerator>) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            generator,
        }
    }

    /// Sequence numbers start at 1 and follow submission order.
    pub(crate) fn stamp<I>(&self, input: I) -> Job<I> {
        let sequence_no = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        Job::new(self.generator.generate(), sequence_no, input)
    }

    /// Number of jobs stamped so far.
    pub(crate) fn issued(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}

impl fmt::Debug for JobStamper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobStamper")
            .field("sequence", &self.issued())
            .field("generator", &self.generator)
            .finish()
    }
}
