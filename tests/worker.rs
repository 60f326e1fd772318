//! Worker loop tests over an in-memory store with scripted generators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use zeus::config::settings::GenerationSettings;
use zeus::infrastructure::memory::MemoryJobStore;
use zeus::infrastructure::store::JobStore;
use zeus::modules::files::resolver::{OutputResolver, ResolveError};
use zeus::modules::jobs::model::{JobDescriptor, JobStatus};
use zeus::workers::generator::{
    GenerationError, GenerationRequest, ProgressReporter, VideoGenerator,
};
use zeus::workers::inference::{InferenceWorker, JobOutcome};

enum Ending {
    Succeed,
    Fail,
    Panic,
}

/// Reports a fixed sequence of percentages, then ends as configured.
struct ScriptedGenerator {
    steps: Vec<i64>,
    ending: Ending,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedGenerator {
    fn new(steps: &[i64], ending: Ending) -> Self {
        Self {
            steps: steps.to_vec(),
            ending,
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> HashMap<String, usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), GenerationError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.job_id.to_string())
            .or_default() += 1;

        for step in &self.steps {
            progress.report(*step).await;
        }
        tokio::time::sleep(self.delay).await;

        match self.ending {
            Ending::Succeed => {
                tokio::fs::write(request.output_path, b"video").await?;
                Ok(())
            }
            Ending::Fail => Err(GenerationError::Failed("out of GPU memory".into())),
            Ending::Panic => panic!("generator crashed"),
        }
    }
}

struct Fixture {
    store: Arc<MemoryJobStore>,
    resolver: OutputResolver,
    settings: GenerationSettings,
    _dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = GenerationSettings {
            model_path: dir.path().to_path_buf(),
            device: "cpu".into(),
            frames: 9,
            fps: 8,
            height: 64,
            width: 64,
            inference_steps: 2,
        };
        Self {
            store: Arc::new(MemoryJobStore::new()),
            resolver: OutputResolver::new(dir.path().join("generated")),
            settings,
            _dir: dir,
        }
    }

    fn worker(&self, name: &str, generator: Arc<dyn VideoGenerator>) -> InferenceWorker {
        InferenceWorker::new(
            name,
            self.store.clone(),
            generator,
            self.resolver.clone(),
            self.settings.clone(),
            Duration::from_millis(10),
        )
    }

    async fn submit(&self, job_id: &str) -> JobDescriptor {
        let job = JobDescriptor {
            job_id: job_id.to_string(),
            prompt: "a cat".to_string(),
            handled_by: Some("web-1".to_string()),
        };
        self.store.publish(&job, &JobStatus::queued()).await.unwrap();
        job
    }

    async fn wait_for_terminal(&self, job_id: &str) -> String {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(raw) = self.store.status(job_id).await.unwrap() {
                    if JobStatus::decode(&raw).state.is_terminal() {
                        return raw;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not reach a terminal status")
    }
}

#[tokio::test]
async fn progress_is_published_in_order_then_completed() {
    let fx = Fixture::new();
    let generator = Arc::new(ScriptedGenerator::new(&[10, 55, 99], Ending::Succeed));
    let worker = fx.worker("worker-1", generator);

    let job = fx.submit("job-c").await;
    let payload = fx.store.pop().await.unwrap().unwrap();
    let outcome = worker.handle_payload(&payload).await;

    assert_eq!(outcome, Some(JobOutcome::Completed));
    assert_eq!(
        fx.store.history(&job.job_id).await,
        vec![
            "queued:0",
            "running:0",
            "running:10",
            "running:55",
            "running:99",
            "completed:100"
        ]
    );
    assert!(fx.resolver.resolve(&job.job_id).await.is_ok());
    assert_eq!(
        fx.store.handler(&job.job_id).await.unwrap().as_deref(),
        Some("web-1")
    );
}

#[tokio::test]
async fn failure_records_last_percent_and_leaves_no_artifact() {
    let fx = Fixture::new();
    let generator = Arc::new(ScriptedGenerator::new(&[10, 40], Ending::Fail));
    let worker = fx.worker("worker-1", generator);

    let job = fx.submit("job-d").await;
    let outcome = worker.process_job(job.clone()).await;

    match outcome {
        JobOutcome::Failed { percent, reason } => {
            assert_eq!(percent, 40);
            assert!(reason.contains("out of GPU memory"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        fx.store.status(&job.job_id).await.unwrap().as_deref(),
        Some("failed:40")
    );
    assert_eq!(
        fx.resolver.resolve(&job.job_id).await,
        Err(ResolveError::NotFound)
    );
}

#[tokio::test]
async fn panicking_generator_fails_the_job_only() {
    let fx = Fixture::new();
    let worker = fx.worker(
        "worker-1",
        Arc::new(ScriptedGenerator::new(&[25], Ending::Panic)),
    );

    let job = fx.submit("job-panic").await;
    let outcome = worker.process_job(job.clone()).await;

    assert!(matches!(outcome, JobOutcome::Failed { percent: 25, .. }));
    assert_eq!(
        fx.store.status(&job.job_id).await.unwrap().as_deref(),
        Some("failed:25")
    );
}

#[tokio::test]
async fn two_workers_process_each_job_exactly_once() {
    let fx = Fixture::new();
    let generator = Arc::new(
        ScriptedGenerator::new(&[50], Ending::Succeed).with_delay(Duration::from_millis(50)),
    );
    let shutdown = CancellationToken::new();

    let mut handles = Vec::new();
    for name in ["worker-a", "worker-b"] {
        let worker = fx.worker(name, generator.clone());
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move { worker.run(token).await }));
    }

    fx.submit("job-1").await;
    fx.submit("job-2").await;

    assert_eq!(fx.wait_for_terminal("job-1").await, "completed:100");
    assert_eq!(fx.wait_for_terminal("job-2").await, "completed:100");

    shutdown.cancel();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.values().all(|count| *count == 1));
    assert_eq!(fx.store.queue_len().await, 0);
}

#[tokio::test]
async fn malformed_payloads_are_discarded_and_loop_continues() {
    let fx = Fixture::new();
    let worker = fx.worker(
        "worker-1",
        Arc::new(ScriptedGenerator::new(&[], Ending::Succeed)),
    );
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let token = shutdown.clone();
        async move { worker.run(token).await }
    });

    fx.store.push_raw("{not json").await;
    fx.store.push_raw(r#"{"prompt":"no id"}"#).await;
    fx.submit("job-ok").await;

    assert_eq!(fx.wait_for_terminal("job-ok").await, "completed:100");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn store_outage_pauses_the_loop_instead_of_exiting() {
    let fx = Fixture::new();
    let worker = fx.worker(
        "worker-1",
        Arc::new(ScriptedGenerator::new(&[], Ending::Succeed)),
    );
    fx.store.set_unavailable(true).await;

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let token = shutdown.clone();
        async move { worker.run(token).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    fx.store.set_unavailable(false).await;
    fx.submit("job-after-outage").await;
    assert_eq!(fx.wait_for_terminal("job-after-outage").await, "completed:100");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn shutdown_stops_an_idle_worker() {
    let fx = Fixture::new();
    let worker = fx.worker(
        "worker-1",
        Arc::new(ScriptedGenerator::new(&[], Ending::Succeed)),
    );
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let token = shutdown.clone();
        async move { worker.run(token).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[cfg(unix)]
mod command_generator {
    use std::path::Path;

    use super::*;
    use zeus::workers::generator::CommandGenerator;

    fn script(dir: &Path, body: &str) -> Arc<dyn VideoGenerator> {
        let path = dir.join("generate.sh");
        std::fs::write(&path, body).unwrap();
        Arc::new(CommandGenerator::new(
            "sh",
            vec![path.to_string_lossy().into_owned()],
        ))
    }

    #[tokio::test]
    async fn follows_progress_from_stdout() {
        let fx = Fixture::new();
        let generator = script(
            &fx.settings.model_path,
            "echo 'loading model'\n\
             echo 'progress: 25'\n\
             echo 'progress=60'\n\
             printf 'mp4' > \"$GENERATION_OUTPUT\"\n",
        );
        let worker = fx.worker("worker-1", generator);

        let job = fx.submit("job-cmd").await;
        let outcome = worker.process_job(job.clone()).await;

        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(
            fx.store.history(&job.job_id).await,
            vec![
                "queued:0",
                "running:0",
                "running:25",
                "running:60",
                "running:99",
                "completed:100"
            ]
        );
        let path = fx.resolver.resolve(&job.job_id).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"mp4");
    }

    #[tokio::test]
    async fn binary_output_on_stdout_is_not_a_fault() {
        let fx = Fixture::new();
        let generator = script(
            &fx.settings.model_path,
            "echo 'progress: 20'\n\
             printf '\\377\\376 frame\\n'\n\
             echo 'progress: 70'\n\
             printf 'mp4' > \"$GENERATION_OUTPUT\"\n",
        );
        let worker = fx.worker("worker-1", generator);

        let job = fx.submit("job-binary").await;
        let outcome = worker.process_job(job.clone()).await;

        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(
            fx.store.history(&job.job_id).await,
            vec![
                "queued:0",
                "running:0",
                "running:20",
                "running:70",
                "running:99",
                "completed:100"
            ]
        );
    }

    #[tokio::test]
    async fn non_zero_exit_fails_the_job() {
        let fx = Fixture::new();
        let generator = script(&fx.settings.model_path, "echo 'progress: 30'\nexit 3\n");
        let worker = fx.worker("worker-1", generator);

        let job = fx.submit("job-exit").await;
        let outcome = worker.process_job(job.clone()).await;

        assert!(matches!(outcome, JobOutcome::Failed { percent: 30, .. }));
        assert_eq!(
            fx.store.status(&job.job_id).await.unwrap().as_deref(),
            Some("failed:30")
        );
    }

    #[tokio::test]
    async fn missing_output_fails_the_job() {
        let fx = Fixture::new();
        let generator = script(&fx.settings.model_path, "echo 'progress: 80'\n");
        let worker = fx.worker("worker-1", generator);

        let job = fx.submit("job-no-output").await;
        match worker.process_job(job).await {
            JobOutcome::Failed { percent, reason } => {
                assert_eq!(percent, 80);
                assert!(reason.contains("without writing"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_fails_the_job() {
        let fx = Fixture::new();
        let generator: Arc<dyn VideoGenerator> = Arc::new(CommandGenerator::new(
            "/nonexistent/generator",
            Vec::new(),
        ));
        let worker = fx.worker("worker-1", generator);

        let job = fx.submit("job-spawn").await;
        assert!(matches!(
            worker.process_job(job).await,
            JobOutcome::Failed { percent: 0, .. }
        ));
    }
}
