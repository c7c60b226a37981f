//! Application layer: the asynchronous payment pipeline.
//!
//! `PaymentIntake` persists a pending payment and hands a job to the
//! `WorkQueue`; the queue runs `PaymentProcessor` jobs with bounded
//! concurrency, and the processor moves each row through the
//! `TransitionOperator`.

pub mod intake;
pub mod processor;
pub mod queue;
pub mod recovery;
pub mod transition;
