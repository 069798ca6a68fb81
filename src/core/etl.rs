use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::StageMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: StageMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: StageMonitor::new(monitor_enabled),
        }
    }

    /// Runs extract, transform and load in order and returns the report location.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting ETL process");
        self.monitor.log_stage("start");

        let applications = self.pipeline.extract().await?;
        tracing::info!("Extracted {} applications", applications.len());
        self.monitor.log_stage("extract");

        let result = self.pipeline.transform(applications).await?;
        tracing::info!(
            "Transformed {} records into {} report rows",
            result.extracted.len(),
            result.report.len()
        );
        self.monitor.log_stage("transform");

        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_stage("load");
        self.monitor.log_summary();

        Ok(output_path)
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ApplicationData, ApplicationRecord, ReportTable, TransformResult};
    use crate::utils::error::EtlError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        loads: AtomicUsize,
        fail_transform: bool,
    }

    #[async_trait::async_trait]
    impl Pipeline for CountingPipeline {
        async fn extract(&self) -> Result<Vec<ApplicationRecord>> {
            Ok(vec![ApplicationRecord {
                application_id: "1".to_string(),
                application_data: ApplicationData { data: json!({}) },
                image_path: "https://raw.example.com/1.jpeg".to_string(),
            }])
        }

        async fn transform(&self, _data: Vec<ApplicationRecord>) -> Result<TransformResult> {
            if self.fail_transform {
                return Err(EtlError::ProcessingError {
                    message: "boom".to_string(),
                });
            }
            Ok(TransformResult {
                extracted: Vec::new(),
                report: ReportTable::default(),
            })
        }

        async fn load(&self, _result: TransformResult) -> Result<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok("out/dataset.jsonl".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_returns_load_location() {
        let engine = EtlEngine::new(CountingPipeline {
            loads: AtomicUsize::new(0),
            fail_transform: false,
        });

        assert_eq!(engine.run().await.unwrap(), "out/dataset.jsonl");
        assert_eq!(engine.pipeline().loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transform_failure_skips_load() {
        let engine = EtlEngine::new(CountingPipeline {
            loads: AtomicUsize::new(0),
            fail_transform: true,
        });

        assert!(engine.run().await.is_err());
        assert_eq!(engine.pipeline().loads.load(Ordering::SeqCst), 0);
    }
}
