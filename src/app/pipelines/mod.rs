pub mod application_pipeline;

pub use application_pipeline::ApplicationPipeline;
