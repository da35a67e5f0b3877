use std::fmt;

/// Identifier of the worker that executed a job.
///
/// Ids are recycled: once a worker exits its id returns to the pool's free
/// list and may be handed to a later worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// A unit of work submitted to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<I> {
    /// Unique identifier produced by the pool's id generator
    pub id: String,

    /// Submission order within the pool, starting at 1. Used for correlation
    /// and tracing only, never for execution order.
    pub sequence_no: u64,

    /// The input handed to the executive function
    pub input: I,
}

impl<I> Job<I> {
    pub fn new(id: impl Into<String>, sequence_no: u64, input: I) -> Self {
        Self {
            id: id.into(),
            sequence_no,
            input,
        }
    }
}

/// The result of executing a [`Job`].
///
/// `id` and `sequence_no` are copied verbatim from the originating job.
#[derive(Debug)]
pub struct JobOutput<O> {
    pub id: String,
    pub sequence_no: u64,
    pub worker_id: WorkerId,
    pub outcome: anyhow::Result<O>,
}

impl<O> JobOutput<O> {
    /// Builds the output of the job identified by `id` and `sequence_no`.
    ///
    /// The input was consumed by the executive function, so only the
    /// correlation data of the job is carried over.
    pub fn new(id: impl Into<String>, sequence_no: u64, worker_id: WorkerId, outcome: anyhow::Result<O>) -> Self {
        Self {
            id: id.into(),
            sequence_no,
            worker_id,
            outcome,
        }
    }

    /// The produced payload, if the executive function succeeded.
    pub fn payload(&self) -> Option<&O> {
        self.outcome.as_ref().ok()
    }

    /// The error returned by the executive function, if any.
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_payload(self) -> anyhow::Result<O> {
        self.outcome
    }
}
