// Batch scanning - one blocking unit per document, store writes under one lock
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ScanConfig;
use crate::pdf_extraction::{DocumentLoader, ExtractedTable, PageProcessor};
use crate::storage::{AnnotationOutcome, AnnotationWriter, ReferenceStore};
use crate::types::{Result, ScanError};
use crate::validation::{RowVerdict, ValidationEngine};

/// Shared stop request. Units check it before each stage that precedes the store lock.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub table: ExtractedTable,
    pub auxiliary_text: String,
    pub verdicts: Vec<RowVerdict>,
    pub annotations: Vec<AnnotationOutcome>,
    /// Every row matched a record and every field passed.
    pub all_passed: bool,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed(DocumentReport),
    Failed { reason: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl DocumentOutcome {
    pub fn report(&self) -> Option<&DocumentReport> {
        match &self.status {
            OutcomeStatus::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Everything one unit of work needs, cheap to clone into a blocking task.
#[derive(Clone)]
struct Pipeline {
    processor: Arc<PageProcessor>,
    engine: Arc<ValidationEngine>,
    writer: Arc<AnnotationWriter>,
    store: Arc<Mutex<ReferenceStore>>,
    loader: Arc<dyn DocumentLoader>,
    cancel: CancelFlag,
}

impl Pipeline {
    fn run(&self, path: &Path) -> DocumentOutcome {
        let status = match self.process(path) {
            Ok(report) => OutcomeStatus::Completed(report),
            Err(ScanError::Cancelled) => {
                tracing::info!(path = %path.display(), "document abandoned before annotation");
                OutcomeStatus::Cancelled
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "document failed");
                OutcomeStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        DocumentOutcome {
            path: path.to_path_buf(),
            status,
        }
    }

    fn process(&self, path: &Path) -> Result<DocumentReport> {
        self.cancel.check()?;
        let document = self.loader.open(path)?;

        self.cancel.check()?;
        let processed = self.processor.process(document.as_ref())?;

        // Past this point the unit owns the store and runs to completion
        self.cancel.check()?;
        let mut store = self.store.lock().map_err(|_| ScanError::StorePoisoned)?;

        let verdicts =
            self.engine
                .validate_table(&processed.table, store.table(), &processed.auxiliary_text)?;

        let annotations = self.writer.annotate_all(&mut store, &verdicts)?;
        drop(store);

        let all_passed = !verdicts.is_empty() && verdicts.iter().all(|r| r.verdict.all_passed());
        tracing::info!(
            path = %path.display(),
            rows = verdicts.len(),
            all_passed,
            "document validated"
        );

        Ok(DocumentReport {
            table: processed.table,
            auxiliary_text: processed.auxiliary_text,
            verdicts,
            annotations,
            all_passed,
            processing_time_ms: processed.processing_time_ms,
        })
    }
}

pub struct Scanner {
    pipeline: Pipeline,
    permits: Arc<Semaphore>,
}

impl Scanner {
    pub fn new(config: &ScanConfig, store: ReferenceStore, loader: Arc<dyn DocumentLoader>) -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            pipeline: Pipeline {
                processor: Arc::new(PageProcessor::new(config)),
                engine: Arc::new(ValidationEngine::new(config)),
                writer: Arc::new(AnnotationWriter::new(config)),
                store: Arc::new(Mutex::new(store)),
                loader,
                cancel: CancelFlag::new(),
            },
            permits: Arc::new(Semaphore::new(jobs)),
        }
    }

    /// Cap the number of documents processed at once.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(jobs.max(1)));
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.pipeline.cancel.clone()
    }

    pub fn store(&self) -> Arc<Mutex<ReferenceStore>> {
        self.pipeline.store.clone()
    }

    /// Process every document; outcomes come back in input order.
    /// A failed document never stops the others.
    pub async fn scan(&self, paths: Vec<PathBuf>) -> Vec<DocumentOutcome> {
        tracing::info!(documents = paths.len(), "starting scan");

        let handles: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let pipeline = self.pipeline.clone();
                let permits = self.permits.clone();
                let task_path = path.clone();
                let handle = tokio::spawn(async move {
                    let _permit = acquire(permits).await?;
                    tokio::task::spawn_blocking(move || pipeline.run(&task_path))
                        .await
                        .map_err(|e| ScanError::Worker(format!("document task stopped: {}", e)))
                });
                (path, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => failed(path, e.to_string()),
                Err(e) => failed(path, ScanError::Worker(format!("scan task stopped: {}", e)).to_string()),
            };
            outcomes.push(outcome);
        }

        let completed = outcomes.iter().filter(|o| o.report().is_some()).count();
        tracing::info!(documents = outcomes.len(), completed, "scan finished");
        outcomes
    }

    /// Run one document on the current thread.
    pub fn scan_one(&self, path: &Path) -> DocumentOutcome {
        self.pipeline.run(path)
    }
}

async fn acquire(permits: Arc<Semaphore>) -> Result<OwnedSemaphorePermit> {
    permits
        .acquire_owned()
        .await
        .map_err(|e| ScanError::Worker(format!("job slots unavailable: {}", e)))
}

fn failed(path: PathBuf, reason: String) -> DocumentOutcome {
    tracing::warn!(path = %path.display(), reason = %reason, "document worker failed");
    DocumentOutcome {
        path,
        status: OutcomeStatus::Failed { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());

        other.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.check(), Err(ScanError::Cancelled)));
    }

    #[tokio::test]
    async fn test_closed_job_slots_are_worker_errors() {
        let permits = Arc::new(Semaphore::new(1));
        assert!(acquire(permits.clone()).await.is_ok());

        permits.close();
        let err = acquire(permits).await.unwrap_err();
        assert!(matches!(err, ScanError::Worker(ref m) if m.contains("job slots")));
        assert!(err.to_string().starts_with("worker error"));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = DocumentOutcome {
            path: PathBuf::from("a.pdf"),
            status: OutcomeStatus::Failed {
                reason: "no pages".into(),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "no pages");
        assert_eq!(json["path"], "a.pdf");
    }
}
