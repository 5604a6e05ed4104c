//! Per-photo generation tasks.
//!
//! Tasks live in an id-keyed store. A batch flips every pending or failed task
//! to `generating` under one lock, then fans the remote calls out concurrently;
//! each call writes back only to its own entry.

use crate::{
    ark::{extract_image, ArkClient},
    error::Result,
    logger,
    models::{
        GenerationRequest, GenerationTask, ImageInput, ResponseFormat, SequentialMode, TaskId,
        TaskStatus,
    },
    preprocess,
};
use async_trait::async_trait;
use futures::{future::join_all, stream, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Settings shared by every task in a batch.
#[derive(Debug, Clone, Default)]
pub struct GenerationSettings {
    pub prompt: String,
    pub size: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl GenerationSettings {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    fn to_request(&self, image: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt.clone(),
            size: self.size.clone(),
            model: self.model.clone(),
            sequential: Some(SequentialMode::Disabled),
            response_format: Some(ResponseFormat::Url),
            watermark: None,
            n: None,
            image: Some(ImageInput::Single(image.to_string())),
        }
    }
}

/// Produces a result image reference for one prepared source image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, image: &str, settings: &GenerationSettings) -> Result<String>;
}

#[async_trait]
impl ImageGenerator for ArkClient {
    async fn generate(&self, image: &str, settings: &GenerationSettings) -> Result<String> {
        let request = settings.to_request(image);
        let response = self
            .generate_image_to_image(&request, settings.api_key.as_deref())
            .await?;

        if let Some(err) = &response.error {
            log::warn!(
                "Ark reported an error: {} {}",
                err.code.as_deref().unwrap_or("-"),
                err.message.as_deref().unwrap_or("-")
            );
        }

        extract_image(&response)
    }
}

/// A local photo awaiting preparation.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Results that arrived for tasks removed mid-batch.
    pub discarded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Failed,
    Discarded,
}

#[derive(Default)]
struct TaskStore {
    order: Vec<TaskId>,
    by_id: HashMap<TaskId, GenerationTask>,
}

#[derive(Clone)]
pub struct TaskTracker {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<Mutex<TaskStore>>,
    max_concurrency: Option<usize>,
}

impl TaskTracker {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            generator,
            store: Arc::new(Mutex::new(TaskStore::default())),
            max_concurrency: None,
        }
    }

    /// Cap simultaneous remote calls; `None` keeps unbounded fan-out.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.filter(|n| *n > 0);
        self
    }

    fn lock(&self) -> MutexGuard<'_, TaskStore> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Prepare each photo and queue it as a pending task.
    ///
    /// Photos that fail preparation are logged and left out of the batch;
    /// they never become error tasks.
    pub fn add_tasks(&self, files: Vec<SourceImage>) -> Vec<TaskId> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            match preprocess::prepare(&file.bytes) {
                Ok(data_url) => ids.push(self.add_prepared(file.name, data_url)),
                Err(e) => log::warn!("Skipping {}: {}", file.name, e),
            }
        }
        ids
    }

    pub fn add_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<TaskId> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match std::fs::read(path) {
                Ok(bytes) => files.push(SourceImage::new(path.display().to_string(), bytes)),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        self.add_tasks(files)
    }

    /// Like `add_paths`, but reads and prepares each photo on tokio's
    /// blocking pool so decoding and re-encoding stay off the runtime threads.
    pub async fn load_paths(&self, paths: Vec<PathBuf>) -> Vec<TaskId> {
        let jobs = paths.into_iter().map(|path| {
            tokio::task::spawn_blocking(move || {
                let outcome = preprocess::prepare_file(&path);
                (path.display().to_string(), outcome)
            })
        });

        let mut ids = Vec::new();
        for joined in join_all(jobs).await {
            match joined {
                Ok((name, Ok(data_url))) => ids.push(self.add_prepared(name, data_url)),
                Ok((name, Err(e))) => log::warn!("Skipping {}: {}", name, e),
                Err(e) => log::error!("Image preparation task failed: {}", e),
            }
        }
        ids
    }

    pub fn add_prepared(&self, name: impl Into<String>, data_url: impl Into<String>) -> TaskId {
        let task = GenerationTask::new(name, data_url);
        let id = task.id.clone();
        log::debug!("Queued task {} ({})", id, task.source_name);

        let mut store = self.lock();
        store.order.push(id.clone());
        store.by_id.insert(id.clone(), task);
        id
    }

    /// Drop a task from the working set. A call already in flight for it
    /// still runs; its result is discarded.
    pub fn remove_task(&self, id: &str) -> bool {
        let mut store = self.lock();
        let removed = store.by_id.remove(id).is_some();
        if removed {
            store.order.retain(|t| t != id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<GenerationTask> {
        self.lock().by_id.get(id).cloned()
    }

    /// All tasks in insertion order.
    pub fn snapshot(&self) -> Vec<GenerationTask> {
        let store = self.lock();
        store
            .order
            .iter()
            .filter_map(|id| store.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        self.lock()
            .by_id
            .values()
            .filter(|t| t.status == status)
            .count()
    }

    /// Callers use this to avoid starting a second batch on top of a running one.
    pub fn is_generating(&self) -> bool {
        self.count_by_status(TaskStatus::Generating) > 0
    }

    /// Run every pending or failed task. Individual failures end up on the
    /// task itself; the batch as a whole never fails.
    pub async fn generate_all(&self, settings: &GenerationSettings) -> BatchSummary {
        let selected = self.begin_batch();
        if selected.is_empty() {
            return BatchSummary::default();
        }

        let attempted = selected.len();
        let _timer = logger::timer(&format!("generate batch of {}", attempted));

        let calls = selected
            .into_iter()
            .map(|(id, image)| self.run_one(id, image, settings));

        let outcomes: Vec<Outcome> = match self.max_concurrency {
            Some(limit) => stream::iter(calls).buffer_unordered(limit).collect().await,
            None => join_all(calls).await,
        };

        let count = |wanted: Outcome| outcomes.iter().filter(|o| **o == wanted).count();
        let summary = BatchSummary {
            attempted,
            succeeded: count(Outcome::Succeeded),
            failed: count(Outcome::Failed),
            discarded: count(Outcome::Discarded),
        };
        log::info!(
            "Batch finished: {} succeeded, {} failed, {} discarded",
            summary.succeeded,
            summary.failed,
            summary.discarded
        );
        summary
    }

    // One lock for the whole selection so no selected task is observed in a
    // stale pending/error state once the batch has started.
    fn begin_batch(&self) -> Vec<(TaskId, String)> {
        let mut guard = self.lock();
        let store = &mut *guard;
        let mut selected = Vec::new();
        for id in &store.order {
            if let Some(task) = store.by_id.get_mut(id) {
                if task.status.is_runnable() {
                    task.status = TaskStatus::Generating;
                    task.error_message = None;
                    selected.push((id.clone(), task.preview_data_url.clone()));
                }
            }
        }
        selected
    }

    async fn run_one(&self, id: TaskId, image: String, settings: &GenerationSettings) -> Outcome {
        let outcome = self.generator.generate(&image, settings).await;

        let mut store = self.lock();
        let Some(task) = store.by_id.get_mut(&id) else {
            log::debug!("Task {} was removed, dropping its result", id);
            return Outcome::Discarded;
        };

        match outcome {
            Ok(result_url) => {
                log::info!("Task {} succeeded", id);
                task.status = TaskStatus::Success;
                task.result_url = Some(result_url);
                task.error_message = None;
                Outcome::Succeeded
            }
            Err(e) => {
                log::error!("Task {} failed: {}", id, e);
                task.status = TaskStatus::Error;
                task.error_message = Some(e.to_string());
                Outcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ark::client::{Transport, TransportResponse};
    use crate::config::ArkConfig;
    use crate::error::MagicError;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use tokio::sync::oneshot;

    /// Answers by the image each request carries.
    struct RoutingTransport;

    #[async_trait]
    impl Transport for RoutingTransport {
        async fn post_json(
            &self,
            _url: &str,
            _bearer: &str,
            body: &serde_json::Value,
        ) -> Result<TransportResponse> {
            let (status, body) = match body["image"].as_str() {
                Some("data:a") => (200, r#"{"data":[{"url":"https://cdn/a.png"}]}"#),
                Some("data:b") => (500, "internal failure"),
                _ => (200, r#"{"usage":{}}"#),
            };
            Ok(TransportResponse {
                status,
                body: body.to_string(),
            })
        }
    }

    fn ark_tracker() -> TaskTracker {
        let client = ArkClient::with_transport(
            ArkConfig::new().with_api_key("k"),
            Arc::new(RoutingTransport),
        );
        TaskTracker::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let tracker = ark_tracker();
        let a = tracker.add_prepared("a.jpg", "data:a");
        let b = tracker.add_prepared("b.jpg", "data:b");
        let c = tracker.add_prepared("c.jpg", "data:c");

        let summary = tracker.generate_all(&GenerationSettings::new("xmas")).await;
        assert_eq!(
            summary,
            BatchSummary {
                attempted: 3,
                succeeded: 1,
                failed: 2,
                discarded: 0,
            }
        );

        let a = tracker.get(&a).unwrap();
        assert_eq!(a.status, TaskStatus::Success);
        assert_eq!(a.result_url.as_deref(), Some("https://cdn/a.png"));

        let b = tracker.get(&b).unwrap();
        assert_eq!(b.status, TaskStatus::Error);
        assert_eq!(
            b.error_message.as_deref(),
            Some("ark http 500 internal failure")
        );

        let c = tracker.get(&c).unwrap();
        assert_eq!(c.status, TaskStatus::Error);
        assert_eq!(c.error_message.as_deref(), Some("no image returned"));
        assert!(!tracker.is_generating());
    }

    /// "a" succeeds at once, "b" waits for a signal then fails, others find
    /// no image.
    struct ScriptedGenerator {
        release_b: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn generate(&self, image: &str, _settings: &GenerationSettings) -> Result<String> {
            match image {
                "a" => Ok("https://cdn/a.png".to_string()),
                "b" => {
                    let rx = self.release_b.lock().unwrap().take();
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Err(MagicError::RemoteHttp {
                        status: 500,
                        body: String::new(),
                    })
                }
                _ => Err(MagicError::NoImageReturned),
            }
        }
    }

    #[tokio::test]
    async fn test_success_visible_before_slow_sibling_settles() {
        let (tx, rx) = oneshot::channel();
        let tracker = TaskTracker::new(Arc::new(ScriptedGenerator {
            release_b: Mutex::new(Some(rx)),
        }));
        let a = tracker.add_prepared("a", "a");
        let b = tracker.add_prepared("b", "b");
        let c = tracker.add_prepared("c", "c");

        let settings = GenerationSettings::new("xmas");
        let watcher = async {
            loop {
                if tracker.get(&a).unwrap().status == TaskStatus::Success {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert_eq!(tracker.get(&b).unwrap().status, TaskStatus::Generating);
            assert!(tracker.is_generating());
            tx.send(()).unwrap();
        };

        let (summary, _) = tokio::join!(tracker.generate_all(&settings), watcher);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(tracker.get(&b).unwrap().status, TaskStatus::Error);
        assert_eq!(tracker.get(&c).unwrap().status, TaskStatus::Error);
    }

    #[tokio::test]
    async fn test_all_selected_flip_to_generating_together() {
        let (tx, rx) = oneshot::channel();
        let tracker = TaskTracker::new(Arc::new(ScriptedGenerator {
            release_b: Mutex::new(Some(rx)),
        }));
        let b = tracker.add_prepared("b", "b");
        let c = tracker.add_prepared("c", "c");

        let settings = GenerationSettings::new("xmas");
        let watcher = async {
            // The first poll of the batch has already marked both tasks.
            tokio::task::yield_now().await;
            assert_eq!(tracker.count_by_status(TaskStatus::Pending), 0);
            assert_eq!(tracker.get(&b).unwrap().status, TaskStatus::Generating);
            tx.send(()).unwrap();
        };
        tokio::join!(tracker.generate_all(&settings), watcher);

        assert_eq!(tracker.get(&c).unwrap().status, TaskStatus::Error);
    }

    #[tokio::test]
    async fn test_failed_tasks_are_retried_and_successes_kept() {
        let tracker = TaskTracker::new(Arc::new(ScriptedGenerator {
            release_b: Mutex::new(None),
        }));
        let a = tracker.add_prepared("a", "a");
        let c = tracker.add_prepared("c", "c");

        let first = tracker.generate_all(&GenerationSettings::new("x")).await;
        assert_eq!(first.attempted, 2);

        let second = tracker.generate_all(&GenerationSettings::new("x")).await;
        assert_eq!(second.attempted, 1);
        assert_eq!(tracker.get(&a).unwrap().status, TaskStatus::Success);
        assert_eq!(tracker.get(&c).unwrap().status, TaskStatus::Error);

        assert_eq!(
            tracker.generate_all(&GenerationSettings::new("x")).await.attempted,
            1
        );
    }

    #[tokio::test]
    async fn test_removed_task_ignores_late_result() {
        let (tx, rx) = oneshot::channel();
        let tracker = TaskTracker::new(Arc::new(ScriptedGenerator {
            release_b: Mutex::new(Some(rx)),
        }));
        let b = tracker.add_prepared("b", "b");

        let settings = GenerationSettings::new("xmas");
        let remover = async {
            tokio::task::yield_now().await;
            assert!(tracker.remove_task(&b));
            tx.send(()).unwrap();
        };
        let (summary, _) = tokio::join!(tracker.generate_all(&settings), remover);

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.discarded, 1);
        assert!(tracker.get(&b).is_none());
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_capped_concurrency_still_runs_everything() {
        let tracker = ark_tracker().with_max_concurrency(Some(1));
        for name in ["data:a", "data:c", "data:a"] {
            tracker.add_prepared(name, name);
        }
        let summary = tracker.generate_all(&GenerationSettings::new("x")).await;
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(tracker.count_by_status(TaskStatus::Success), 2);
    }

    #[test]
    fn test_unpreparable_files_are_dropped() {
        let tracker = ark_tracker();

        let mut png = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(32, 32)
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();

        let ids = tracker.add_tasks(vec![
            SourceImage::new("broken.jpg", b"garbage".to_vec()),
            SourceImage::new("ok.png", png.into_inner()),
        ]);

        assert_eq!(ids.len(), 1);
        let tasks = tracker.snapshot();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].source_name, "ok.png");
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert!(tasks[0]
            .preview_data_url
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(tracker.count_by_status(TaskStatus::Error), 0);
    }

    #[tokio::test]
    async fn test_load_paths_prepares_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("tree.png");
        DynamicImage::new_rgb8(24, 24).save(&good).unwrap();
        let broken = dir.path().join("broken.jpg");
        std::fs::write(&broken, b"garbage").unwrap();
        let missing = dir.path().join("missing.png");

        let tracker = ark_tracker();
        let ids = tracker.load_paths(vec![broken, good.clone(), missing]).await;

        assert_eq!(ids.len(), 1);
        let task = tracker.get(&ids[0]).unwrap();
        assert_eq!(task.source_name, good.display().to_string());
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.preview_data_url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let tracker = ark_tracker();
        assert_eq!(
            tracker.generate_all(&GenerationSettings::new("x")).await,
            BatchSummary::default()
        );
    }
}
