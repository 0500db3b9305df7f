pub mod diff;
pub mod metadata;
pub mod queue_entry;
pub mod site;
pub mod snapshot;

pub use diff::{Diff, NewDiff, Significance};
pub use metadata::MetadataMap;
pub use queue_entry::{NewQueueEntry, Operation, QueueEntry, QueueStatus};
pub use site::{NewSite, Site};
pub use snapshot::{NewSnapshot, Snapshot};
