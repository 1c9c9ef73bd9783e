//! DRMAA Executor
//!
//! A minimal host that runs shell scripts through the executor on the local
//! machine. Every script becomes one job: it is wrapped into a jobscript,
//! submitted, and polled until it finishes. Ctrl-C cancels outstanding jobs.

use anyhow::{Context, Result};
use clap::Parser;
use drmaa_client::LocalSession;
use drmaa_core::{JobHandle, JobSpec, SubmittedJob, WorkflowJob};
use drmaa_executor::{DrmaaExecutor, ExecutorSettings, JobReporter, shell_quote};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "drmaa-executor")]
#[command(about = "Run shell scripts as DRMAA jobs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: ExecutorSettings,

    /// Seconds between status polls
    #[arg(long, env = "DRMAA_POLL_INTERVAL", default_value_t = 1)]
    poll_interval: u64,

    /// Directory for generated jobscripts
    #[arg(long, env = "DRMAA_JOBSCRIPT_DIR", default_value = ".drmaa-jobs")]
    jobscript_dir: PathBuf,

    /// Scripts to run
    #[arg(required = true)]
    scripts: Vec<PathBuf>,
}

/// Logs job outcomes and counts failures
#[derive(Default)]
struct ConsoleReporter {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl JobReporter for ConsoleReporter {
    fn report_job_submission(&self, job: &SubmittedJob) {
        info!("Job {} submitted as {}", job.jobid(), job.external_jobid());
    }

    fn report_job_success(&self, job: &SubmittedJob) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        info!("Job {} finished", job.jobid());
    }

    fn report_job_error(&self, job: &dyn WorkflowJob, msg: Option<&str>) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        match msg {
            Some(msg) => error!("Job {} ({}) failed: {}", job.jobid(), job.rule(), msg),
            None => error!("Job {} ({}) failed", job.jobid(), job.rule()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drmaa_executor=info,drmaa_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("Starting DRMAA executor for {} script(s)", cli.scripts.len());

    std::fs::create_dir_all(&cli.jobscript_dir).with_context(|| {
        format!(
            "Failed to create jobscript directory {}",
            cli.jobscript_dir.display()
        )
    })?;

    let reporter = Arc::new(ConsoleReporter::default());
    let executor = DrmaaExecutor::new(
        cli.settings.clone(),
        Arc::new(LocalSession::new()),
        reporter.clone(),
    )
    .context("Failed to start DRMAA executor")?;

    let result = run(&executor, &reporter, &cli).await;
    executor
        .shutdown()
        .context("Failed to shut down DRMAA executor")?;
    result?;

    // Only removed when every jobscript is gone
    if let Err(e) = std::fs::remove_dir(&cli.jobscript_dir) {
        debug!(
            "Keeping jobscript directory {}: {}",
            cli.jobscript_dir.display(),
            e
        );
    }

    let failed = reporter.failed.load(Ordering::Relaxed);
    info!(
        "{} job(s) finished, {} failed",
        reporter.succeeded.load(Ordering::Relaxed),
        failed
    );
    if failed > 0 {
        anyhow::bail!("{} job(s) failed", failed);
    }
    Ok(())
}

/// Submits every script and polls until all jobs are done or Ctrl-C arrives
async fn run(executor: &DrmaaExecutor, reporter: &ConsoleReporter, cli: &Cli) -> Result<()> {
    let prefix = executor.job_exec_prefix();
    let mut active = Vec::new();

    for (jobid, script) in (1..).zip(&cli.scripts) {
        let job: JobHandle = Arc::new(job_for(jobid, script)?);
        let jobscript = write_jobscript(&cli.jobscript_dir, jobid, &prefix, script)?;

        match executor.run_job(job.clone(), jobscript) {
            Ok(submitted) => active.push(submitted),
            Err(e) if e.is_task_scoped() => {
                // Rule errors are not reported by the executor
                if matches!(e, drmaa_executor::ExecutorError::Workflow { .. }) {
                    reporter.report_job_error(job.as_ref(), Some(&e.to_string()));
                }
            }
            Err(e) => {
                cancel(executor, active)?;
                return Err(e).context("Failed to submit job");
            }
        }
    }

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let period = Duration::from_secs(cli.poll_interval.max(1));
    track(executor, active, period, interrupt).await
}

/// Polls `active` every `period` until all jobs are done or `interrupt` fires
///
/// The interrupt future lives across poll cycles, so an interrupt that
/// arrives while a cycle is running is seen as soon as the cycle ends.
async fn track<F>(
    executor: &DrmaaExecutor,
    mut active: Vec<SubmittedJob>,
    period: Duration,
    interrupt: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut interval = time::interval(period);

    while !active.is_empty() {
        tokio::select! {
            _ = &mut interrupt => {
                warn!("Interrupted, cancelling {} job(s)", active.len());
                let count = active.len();
                cancel(executor, std::mem::take(&mut active))?;
                anyhow::bail!("Interrupted with {} job(s) still running", count);
            }
            _ = interval.tick() => {
                let outcome = executor.poll_active_jobs(std::mem::take(&mut active)).await;
                active = outcome.active;
                for e in outcome.errors {
                    if !e.is_task_scoped() {
                        cancel(executor, std::mem::take(&mut active))?;
                        return Err(e).context("Failed to check job status");
                    }
                    warn!("{}", e);
                }
            }
        }
    }

    Ok(())
}

/// Terminates `active` and removes their jobscripts
fn cancel(executor: &DrmaaExecutor, active: Vec<SubmittedJob>) -> Result<()> {
    let jobscripts: Vec<PathBuf> = active.iter().map(|j| j.jobscript().to_path_buf()).collect();
    executor
        .cancel_jobs(active)
        .context("Failed to cancel jobs")?;
    for jobscript in jobscripts {
        if let Err(e) = std::fs::remove_file(&jobscript) {
            warn!("Failed to remove jobscript {}: {}", jobscript.display(), e);
        }
    }
    Ok(())
}

/// Describes `script` as a host job named after its file
fn job_for(jobid: u64, script: &Path) -> Result<JobSpec> {
    let rule = script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .with_context(|| format!("Not a script file: {}", script.display()))?;
    let script = std::path::absolute(script)
        .with_context(|| format!("Failed to resolve {}", script.display()))?;

    Ok(JobSpec::new(jobid, rule).with_input(script.to_string_lossy()))
}

/// Writes the jobscript that runs `script` and returns its path
fn write_jobscript(dir: &Path, jobid: u64, prefix: &str, script: &Path) -> Result<PathBuf> {
    let script = std::path::absolute(script)
        .with_context(|| format!("Failed to resolve {}", script.display()))?;
    let jobscript = std::path::absolute(dir.join(format!("drmaajob.{}.sh", jobid)))
        .context("Failed to resolve jobscript directory")?;

    let mut body = String::from("#!/bin/sh\n");
    if !prefix.is_empty() {
        body.push_str(prefix);
        body.push_str(" || exit 1\n");
    }
    body.push_str(&format!("exec /bin/sh {}\n", shell_quote(&script.to_string_lossy())));

    std::fs::write(&jobscript, body)
        .with_context(|| format!("Failed to write jobscript {}", jobscript.display()))?;
    Ok(jobscript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drmaa_client::testing::ScriptedSession;
    use drmaa_core::{JobControlAction, JobState, RemoteJobId};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Fires an interrupt from inside the poll cycle once a job succeeds
    struct InterruptOnSuccess {
        trigger: Mutex<Option<oneshot::Sender<()>>>,
    }

    impl JobReporter for InterruptOnSuccess {
        fn report_job_submission(&self, _job: &SubmittedJob) {}

        fn report_job_success(&self, _job: &SubmittedJob) {
            if let Some(trigger) = self.trigger.lock().unwrap().take() {
                let _ = trigger.send(());
            }
        }

        fn report_job_error(&self, _job: &dyn WorkflowJob, _msg: Option<&str>) {}
    }

    fn submit(executor: &DrmaaExecutor, dir: &Path, jobid: u64) -> SubmittedJob {
        let jobscript = dir.join(format!("drmaajob.{}.sh", jobid));
        std::fs::write(&jobscript, "#!/bin/sh\ntrue\n").unwrap();
        executor
            .run_job(Arc::new(JobSpec::new(jobid, "map")), jobscript)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_poll_cancels_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (trigger, interrupted) = oneshot::channel();
        let session = Arc::new(ScriptedSession::new());
        let reporter = Arc::new(InterruptOnSuccess {
            trigger: Mutex::new(Some(trigger)),
        });
        let executor =
            DrmaaExecutor::new(ExecutorSettings::new(), session.clone(), reporter).unwrap();

        let first = submit(&executor, dir.path(), 1);
        let second = submit(&executor, dir.path(), 2);
        session.push_statuses(first.external_jobid(), [Ok(JobState::Done)]);

        let tracking = track(
            &executor,
            vec![first, second],
            Duration::from_secs(1),
            async {
                let _ = interrupted.await;
            },
        );
        let err = time::timeout(Duration::from_secs(60), tracking)
            .await
            .expect("interrupt was not observed")
            .unwrap_err();

        assert_eq!(err.to_string(), "Interrupted with 1 job(s) still running");
        assert_eq!(
            session.control_calls(),
            vec![(RemoteJobId::new("2"), JobControlAction::Terminate)]
        );
        assert!(!dir.path().join("drmaajob.2.sh").exists());
        executor.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_artifact_failure_stops_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(ScriptedSession::new());
        let executor = DrmaaExecutor::new(
            ExecutorSettings::new(),
            session.clone(),
            Arc::new(ConsoleReporter::default()),
        )
        .unwrap();

        let first = submit(&executor, dir.path(), 1);
        let second = submit(&executor, dir.path(), 2);
        std::fs::remove_file(first.jobscript()).unwrap();
        session.push_statuses(first.external_jobid(), [Ok(JobState::Done)]);

        let err = track(
            &executor,
            vec![first, second],
            Duration::from_secs(1),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to remove jobscript"));
        assert_eq!(
            session.control_calls(),
            vec![(RemoteJobId::new("2"), JobControlAction::Terminate)]
        );
        executor.shutdown().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracking_ends_when_jobs_finish() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(ScriptedSession::new());
        let reporter = Arc::new(ConsoleReporter::default());
        let executor =
            DrmaaExecutor::new(ExecutorSettings::new(), session.clone(), reporter.clone())
                .unwrap();

        let job = submit(&executor, dir.path(), 1);
        session.push_statuses(
            job.external_jobid(),
            [Ok(JobState::Running), Ok(JobState::Done)],
        );

        track(&executor, vec![job], Duration::from_secs(1), std::future::pending())
            .await
            .unwrap();

        assert_eq!(reporter.succeeded.load(Ordering::Relaxed), 1);
        assert!(session.control_calls().is_empty());
        executor.shutdown().unwrap();
    }
}
