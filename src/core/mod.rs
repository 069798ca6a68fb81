pub mod etl;
pub mod evaluation;
pub mod extraction;
pub mod json_path;
pub mod json_source;
pub mod pairing;
pub mod remote;
pub mod report;

pub use crate::domain::model::{ApplicationRecord, ExtractedRecord, PatternTable, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, RepositorySource, Storage};
pub use crate::utils::error::Result;
