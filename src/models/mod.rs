pub mod batch;
pub mod checkpoint;
pub mod loaders;
pub mod question;
pub mod speed_profile;
pub mod workload;

pub use batch::{BatchDescriptor, BatchKey, BatchResult, BatchStatus};
pub use checkpoint::CheckpointRecord;
pub use loaders::{category_from_url, load_categories};
pub use question::{QuestionKind, QuestionRecord};
pub use speed_profile::{ProfileOverrides, SpeedProfile};
pub use workload::{CategorySelection, WorkloadSpec};
