//! Candidate buffer
//!
//! Holds candidates that arrived before the endpoint had a remote
//! description. Arrival order is preserved and nothing is dropped; the
//! buffer is drained exactly once per applied description.

use crate::domain::negotiation::entity::Candidate;
use crate::domain::shared::error::NegotiationError;
use crate::domain::shared::result::Result;
use std::collections::VecDeque;
use std::future::Future;

/// One candidate the transport refused during a drain
#[derive(Debug, Clone)]
pub struct DrainFailure {
    pub candidate: Candidate,
    pub error: NegotiationError,
}

/// Outcome of draining the buffer through the transport
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    pub applied: usize,
    pub failures: Vec<DrainFailure>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.applied + self.failures.len()
    }
}

/// FIFO buffer of not-yet-applicable candidates
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    queue: VecDeque<Candidate>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append a candidate, preserving arrival order
    pub fn enqueue(&mut self, candidate: Candidate) {
        self.queue.push_back(candidate);
    }

    /// Apply every buffered candidate in arrival order, leaving the buffer
    /// empty. Each application is independent: a failure is recorded in the
    /// report and does not block the candidates behind it.
    pub async fn drain_into<F, Fut>(&mut self, mut apply: F) -> DrainReport
    where
        F: FnMut(Candidate) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut report = DrainReport::default();

        while let Some(candidate) = self.queue.pop_front() {
            match apply(candidate.clone()).await {
                Ok(()) => report.applied += 1,
                Err(error) => report.failures.push(DrainFailure { candidate, error }),
            }
        }

        report
    }

    /// Discard everything without applying
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::value_objects::EndpointId;
    use std::sync::{Arc, Mutex};

    fn candidate(origin: EndpointId, tag: usize) -> Candidate {
        Candidate::new(origin, format!("candidate-{}", tag))
    }

    #[tokio::test]
    async fn test_drain_applies_in_arrival_order() {
        let origin = EndpointId::new();
        let mut buffer = CandidateBuffer::new();
        for i in 0..4 {
            buffer.enqueue(candidate(origin, i));
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let report = buffer
            .drain_into(move |c| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(c.payload().to_string());
                    Ok::<(), NegotiationError>(())
                }
            })
            .await;

        assert_eq!(report.applied, 4);
        assert!(report.is_clean());
        assert!(buffer.is_empty());

        let seen = seen.lock().unwrap();
        let expected: Vec<String> = (0..4).map(|i| format!("candidate-{}", i)).collect();
        assert_eq!(*seen, expected);
    }

    #[tokio::test]
    async fn test_failures_do_not_block_later_candidates() {
        let origin = EndpointId::new();
        let mut buffer = CandidateBuffer::new();
        for i in 0..3 {
            buffer.enqueue(candidate(origin, i));
        }

        // Reject the middle candidate only
        let report = buffer
            .drain_into(|c| async move {
                if c.payload().ends_with('1') {
                    Err(NegotiationError::transport_candidate("refused"))
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(report.applied, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.failures[0].candidate.payload(), "candidate-1");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_clear_discards_without_applying() {
        let origin = EndpointId::new();
        let mut buffer = CandidateBuffer::new();
        buffer.enqueue(candidate(origin, 0));
        buffer.enqueue(candidate(origin, 1));
        assert_eq!(buffer.len(), 2);

        buffer.clear();
        assert!(buffer.is_empty());

        let report = buffer
            .drain_into(|_| async move { Ok::<(), NegotiationError>(()) })
            .await;
        assert_eq!(report.attempted(), 0);
    }
}
