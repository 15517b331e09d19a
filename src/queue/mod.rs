//! The two queues behind a [`Dispatcher`](crate::dispatcher::Dispatcher):
//! a bounded, suspendable execution pool and a single ordered response worker.
//! They share nothing but the [`QueueMetrics`] and the response sender the
//! execution workers hand their outcomes to.

mod execution;
mod metrics;
mod response;

pub use execution::ExecutionConfig;
pub use metrics::QueueMetrics;

pub(crate) use execution::{parse_stack_size, ExecutionQueue, DEFAULT_STACK_SIZE};
pub(crate) use response::ResponseQueue;
