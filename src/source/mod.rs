//! Network sources feeding the aggregator.
//!
//! Both sources run as independent tasks and push [`Update`](crate::Update)
//! messages; failures become status updates rather than errors.

mod history;
mod live;

pub use history::{spawn_history, HistoryClient};
pub use live::{read_feed, LiveSubscriber};
