//! Internal building blocks.

mod fixed_queue;

pub(crate) use fixed_queue::FixedQueue;
