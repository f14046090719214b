pub mod jobs;
mod retry;
mod scheduler;

pub use retry::{run_with_policy, RetryPolicy};
pub use scheduler::CronScheduler;
