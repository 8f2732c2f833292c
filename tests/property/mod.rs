//! Property-based tests for queue ordering and claim guarantees

mod queue_ordering;
