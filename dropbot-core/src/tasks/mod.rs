pub mod clip_drop;
pub mod scheduler;

pub use clip_drop::ClipDropTask;
pub use scheduler::{ScheduledTask, Scheduler};
