//! Running a pipeline over many labels.
//!
//! Labels are isolated from each other: an error in one label is logged,
//! appended to the [`FailureLog`] and the batch moves on to the next label.

use std::path::{Path, PathBuf};

use crate::acquisition::AcquisitionPipeline;
use crate::config::Settings;
use crate::error::SlidegrabError;
use crate::failure_log::{FailureLog, FailureRecord, Stage};
use crate::layout::{LabelContext, LabelRecord};
use crate::recorder::Recorder;
use crate::slideshow::SlideshowPipeline;

/// Outcome of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Labels that completed every attempted stage.
    pub succeeded: Vec<String>,
    /// One record per failed stage, in processing order.
    pub failures: Vec<FailureRecord>,
    /// Labels whose recording was skipped because acquisition failed.
    pub skipped_recordings: Vec<String>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed_labels().len()
    }

    /// Distinct labels with at least one failure.
    pub fn failed_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for record in &self.failures {
            if !labels.contains(&record.label.as_str()) {
                labels.push(&record.label);
            }
        }
        labels
    }
}

/// Drives a pipeline label by label.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    data_dir: PathBuf,
    failure_log: FailureLog,
}

impl BatchRunner {
    pub fn new<P: Into<PathBuf>>(data_dir: P, failure_log: FailureLog) -> Self {
        Self {
            data_dir: data_dir.into(),
            failure_log,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.data_dir.clone(),
            FailureLog::new(settings.failure_log_path()),
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn failure_log(&self) -> &FailureLog {
        &self.failure_log
    }

    /// Extract slides for every record.
    pub fn run_slideshow(
        &self,
        pipeline: &SlideshowPipeline,
        records: &[LabelRecord],
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for record in records {
            log_title(record);
            let outcome = self.run_stage(&mut summary, &record.label, Stage::Slideshow, |context| {
                pipeline.run(context)
            });
            if outcome.is_some() {
                summary.succeeded.push(record.label.clone());
            }
        }
        summary
    }

    /// Acquire every record, then record it with `recorder` when given.
    ///
    /// Recording is skipped for labels whose acquisition failed.
    pub fn run_acquisition(
        &self,
        pipeline: &AcquisitionPipeline,
        recorder: Option<&dyn Recorder>,
        records: &[LabelRecord],
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for record in records {
            log_title(record);
            let acquired = self.run_stage(&mut summary, &record.label, Stage::Acquisition, |context| {
                let url = record.manifest_url.as_deref().ok_or_else(|| {
                    SlidegrabError::InvalidConfig(format!(
                        "label `{}` has no manifest URL",
                        context.label()
                    ))
                })?;
                pipeline.acquire(context, url)
            });

            let Some(acquired) = acquired else {
                if recorder.is_some() {
                    log::warn!("{}: recording skipped, acquisition failed", record.label);
                    summary.skipped_recordings.push(record.label.clone());
                }
                continue;
            };

            if let Some(recorder) = recorder {
                let recorded = self.run_stage(&mut summary, &record.label, Stage::Recording, |context| {
                    recorder.record(&acquired.adjusted_manifest, &context.video())
                });
                if recorded.is_none() {
                    continue;
                }
            }
            summary.succeeded.push(record.label.clone());
        }
        summary
    }

    /// Run one stage for one label, turning any error into a failure record.
    fn run_stage<T, F>(
        &self,
        summary: &mut BatchSummary,
        label: &str,
        stage: Stage,
        operation: F,
    ) -> Option<T>
    where
        F: FnOnce(&LabelContext) -> Result<T, SlidegrabError>,
    {
        let result = LabelContext::new(&self.data_dir, label).and_then(|context| operation(&context));
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                log::error!("{label}: {stage} failed: {error}");
                let record = FailureRecord::new(label, stage, &error);
                if let Err(log_error) = self.failure_log.append(&record) {
                    log::error!(
                        "cannot append to {}: {log_error}",
                        self.failure_log.path().display()
                    );
                }
                summary.failures.push(record);
                None
            }
        }
    }
}

fn log_title(record: &LabelRecord) {
    match &record.title {
        Some(title) => log::info!("{}: {title}", record.label),
        None => log::info!("{}", record.label),
    }
}
