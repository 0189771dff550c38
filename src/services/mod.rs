pub mod aggregator;
pub mod cataloguer;
pub mod crawler;
pub mod droid;
#[cfg(test)]
pub mod fake_droid;
pub mod interaction;
pub mod pagination;
pub mod table_extractor;
pub mod validator;
pub mod work_queue;

pub use aggregator::*;
pub use cataloguer::*;
pub use crawler::*;
pub use droid::*;
pub use validator::*;
pub use work_queue::*;
