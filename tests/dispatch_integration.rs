//! Integration tests for task dispatch through the full shell.
//!
//! Each test writes a scratch web folder, starts a `Lifecycle` with the
//! JavaScript engine, and runs the real `UiLoop` against a recording frontend.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;

use webshell::config::ShellConfig;
use webshell::error::{Error, PoolError, UiError};
use webshell::lifecycle::Lifecycle;
use webshell::resources::{Resource, ResourceLocator, UI_PAGE, WORKER_SCRIPT};
use webshell::script::{JsEngine, ScriptEngine};
use webshell::ui::{Frontend, FrontendRequest, RequestStream, UiCall, UiLoop, UiSink};
use webshell::worker::WORKER_NAME_PREFIX;

/// Maximum time any single wait is allowed before we consider the test hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const PAGE: &str = r#"<html><body>
<script>
function workDone(message, seconds, thread) {}
function echoed() {}
function answer(from) {}
</script>
</body></html>"#;

/// What the frontend saw, in order.
#[derive(Debug)]
enum Seen {
    Loaded(String),
    Called { call: UiCall, thread: String },
}

/// Frontend that forwards everything it is asked to do to the test.
struct RecordingFrontend {
    requests: Option<mpsc::UnboundedReceiver<FrontendRequest>>,
    seen: mpsc::UnboundedSender<Seen>,
}

#[async_trait]
impl Frontend for RecordingFrontend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&mut self) -> Result<RequestStream, UiError> {
        let rx = self.requests.take().ok_or(UiError::Closed)?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn load(&mut self, page: &Resource) -> Result<(), UiError> {
        let _ = self.seen.send(Seen::Loaded(page.text.clone()));
        Ok(())
    }

    async fn invoke(&mut self, call: &UiCall) -> Result<(), UiError> {
        let thread = std::thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string();
        let _ = self.seen.send(Seen::Called {
            call: call.clone(),
            thread,
        });
        Ok(())
    }

    async fn report_error(&mut self, _error: &Error) -> Result<(), UiError> {
        Ok(())
    }
}

/// A running shell plus the handles a test drives it with.
struct Shell {
    controller: Arc<Lifecycle>,
    requests: mpsc::UnboundedSender<FrontendRequest>,
    seen: mpsc::UnboundedReceiver<Seen>,
    ui_loop: JoinHandle<Result<(), Error>>,
    dir: tempfile::TempDir,
}

impl Shell {
    async fn start(script: &str, workers: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_web(dir.path(), script);

        let config = ShellConfig {
            web_dir: dir.path().to_path_buf(),
            worker_count: workers,
            poll_interval: Duration::from_millis(50),
            ..ShellConfig::default()
        };
        let locator = ResourceLocator::detect(&config).unwrap();
        assert!(locator.is_dev());

        let engine: Arc<dyn ScriptEngine> = Arc::new(JsEngine::new());
        let (ui, events) = UiSink::channel();
        let controller = Lifecycle::start(&config, locator, engine, ui).await.unwrap();

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let frontend = RecordingFrontend {
            requests: Some(requests_rx),
            seen: seen_tx,
        };
        let ui_loop = tokio::spawn(UiLoop::new(frontend, events, Arc::clone(&controller)).run());

        // The page is loaded before anything else reaches the frontend.
        match timeout(TEST_TIMEOUT, seen_rx.recv()).await.unwrap() {
            Some(Seen::Loaded(text)) => assert_eq!(text, PAGE),
            other => panic!("Expected initial page load, got {other:?}"),
        }

        Self {
            controller,
            requests: requests_tx,
            seen: seen_rx,
            ui_loop,
            dir,
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Submit the way the page does: `tasks.add(name, ...args)`.
    fn add(&self, name: &str, args: &[Value]) {
        let mut call = vec![json!(name)];
        call.extend_from_slice(args);
        self.requests.send(FrontendRequest::Submit(call)).unwrap();
    }

    /// Next UI call, skipping page loads.
    async fn next_call(&mut self) -> (UiCall, String) {
        loop {
            match timeout(TEST_TIMEOUT, self.seen.recv()).await {
                Ok(Some(Seen::Called { call, thread })) => return (call, thread),
                Ok(Some(Seen::Loaded(_))) => continue,
                Ok(None) => panic!("UI loop ended"),
                Err(_) => panic!("Timed out waiting for a UI call"),
            }
        }
    }

    /// Assert nothing else reaches the frontend within `window`.
    async fn expect_quiet(&mut self, window: Duration) {
        if let Ok(Some(Seen::Called { call, .. })) = timeout(window, self.seen.recv()).await {
            panic!("Unexpected UI call {call:?}");
        }
    }

    /// Poll the live pool's counters until `done` holds.
    async fn wait_for_stats(&self, done: impl Fn(u64, u64) -> bool) {
        let deadline = Instant::now() + TEST_TIMEOUT;
        loop {
            let stats = self.controller.stats().await.expect("pool running");
            if done(stats.completed(), stats.failed()) {
                return;
            }
            assert!(Instant::now() < deadline, "Timed out waiting for pool stats");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn quit(self) {
        self.requests.send(FrontendRequest::Quit).unwrap();
        timeout(TEST_TIMEOUT, self.ui_loop)
            .await
            .expect("UI loop did not stop")
            .unwrap()
            .unwrap();
        self.controller.shutdown().await;
    }
}

fn write_web(root: &Path, script: &str) {
    std::fs::write(root.join(WORKER_SCRIPT), script).unwrap();
    std::fs::write(root.join(UI_PAGE), PAGE).unwrap();
}

const ECHO_SCRIPT: &str = r#"
function echo(...args) { ui.send("echoed", ...args); }

function slowEcho(...args) {
    var until = Date.now() + 50;
    while (Date.now() < until) {}
    ui.send("echoed", ...args);
}

function notify() { ui.send("workDone", "ok", 5, "worker-2"); }

function fail() { throw new Error("always fails"); }

function doWork(seconds) {
    console.log("working for " + seconds + " seconds");
    var until = Date.now() + seconds * 1000;
    var result = 0;
    while (Date.now() < until) {
        result += Math.random() * Math.random();
    }
    ui.send("workDone", "work finished", seconds, workerName);
    return result;
}
"#;

const ALPHA_SCRIPT: &str = r#"function alpha() { ui.send("answer", "alpha"); }"#;

const BETA_SCRIPT: &str = r#"function beta() { ui.send("answer", "beta"); }"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn known_task_runs_exactly_once_with_exact_args() {
    let mut shell = Shell::start(ECHO_SCRIPT, 3).await;

    let args = [json!(1), json!("two"), json!({"three": [3]}), Value::Null];
    shell.add("echo", &args);

    let (call, _) = shell.next_call().await;
    assert_eq!(call.name, "echoed");
    assert_eq!(call.args, args.to_vec());

    shell.expect_quiet(Duration::from_millis(200)).await;
    shell.wait_for_stats(|completed, failed| completed == 1 && failed == 0).await;
    shell.quit().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_task_fails_without_affecting_others() {
    let mut shell = Shell::start(ECHO_SCRIPT, 2).await;

    shell.add("noSuchFunction", &[json!(1)]);
    shell.add("fail", &[]);
    shell.add("echo", &[json!("still works")]);

    let (call, _) = shell.next_call().await;
    assert_eq!(call.args, vec![json!("still works")]);

    shell.wait_for_stats(|completed, failed| completed == 1 && failed == 2).await;
    shell.expect_quiet(Duration::from_millis(100)).await;
    shell.quit().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_worker_preserves_submission_order() {
    let mut shell = Shell::start(ECHO_SCRIPT, 1).await;

    for i in 0..20 {
        shell.add("echo", &[json!(i)]);
    }
    for i in 0..20 {
        let (call, _) = shell.next_call().await;
        assert_eq!(call.args, vec![json!(i)]);
    }
    shell.quit().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrency_never_exceeds_worker_count() {
    let mut shell = Shell::start(ECHO_SCRIPT, 3).await;

    for i in 0..12 {
        shell.add("slowEcho", &[json!(i)]);
    }
    let mut seen = Vec::new();
    for _ in 0..12 {
        let (call, _) = shell.next_call().await;
        seen.push(call.args[0].as_i64().unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..12).collect::<Vec<_>>());

    shell.wait_for_stats(|completed, _| completed == 12).await;
    let stats = shell.controller.stats().await.unwrap();
    assert!(stats.peak_active() <= 3, "peak {}", stats.peak_active());
    assert!(stats.peak_active() >= 1);
    assert_eq!(stats.active(), 0);
    shell.quit().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_shell_rejects_new_tasks() {
    let shell = Shell::start(ECHO_SCRIPT, 2).await;

    shell.controller.stop().await;
    assert!(matches!(
        shell.controller.add("echo", vec![json!(1)]).await,
        Err(Error::Pool(PoolError::Stopped))
    ));
    assert!(matches!(
        shell.controller.submit(vec![json!("echo")]).await,
        Err(Error::Pool(PoolError::Stopped))
    ));
    shell.quit().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ui_calls_arrive_on_the_ui_loop() {
    let mut shell = Shell::start(ECHO_SCRIPT, 2).await;

    shell.add("notify", &[]);
    let (call, thread) = shell.next_call().await;

    assert_eq!(call.name, "workDone");
    assert_eq!(call.args, vec![json!("ok"), json!(5), json!("worker-2")]);
    assert!(!thread.starts_with(WORKER_NAME_PREFIX), "ran on {thread}");

    let origin = call.origin.expect("worker calls carry an origin");
    assert!(origin.worker.starts_with(WORKER_NAME_PREFIX));
    assert_eq!(origin.generation, 1);
    shell.quit().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shorter_work_finishes_first() {
    let mut shell = Shell::start(ECHO_SCRIPT, 2).await;
    let started = Instant::now();

    shell.add("doWork", &[json!(3)]);
    shell.add("doWork", &[json!(1)]);

    let (first, _) = timeout(Duration::from_secs(3), shell.next_call())
        .await
        .expect("1-second work should report within 3 seconds");
    assert_eq!(first.name, "workDone");
    assert_eq!(first.args[0], json!("work finished"));
    assert_eq!(first.args[1], json!(1));

    let (second, _) = timeout(Duration::from_secs(4), shell.next_call())
        .await
        .expect("3-second work should report within the window");
    let elapsed = started.elapsed();
    assert_eq!(second.args[1], json!(3));
    assert!(elapsed >= Duration::from_secs(3), "finished after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "finished after {elapsed:?}");

    // Both reports name the worker that did the work, and they differ.
    assert_ne!(first.args[2], second.args[2]);
    shell.quit().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_serves_tasks_from_the_new_script() {
    let mut shell = Shell::start(ALPHA_SCRIPT, 2).await;

    shell.add("alpha", &[]);
    let (call, _) = shell.next_call().await;
    assert_eq!(call.args, vec![json!("alpha")]);

    std::fs::write(shell.root().join(WORKER_SCRIPT), BETA_SCRIPT).unwrap();
    assert_eq!(shell.controller.reload().await.unwrap(), 2);

    // The page is reloaded too.
    match timeout(TEST_TIMEOUT, shell.seen.recv()).await.unwrap() {
        Some(Seen::Loaded(text)) => assert_eq!(text, PAGE),
        other => panic!("Expected page reload, got {other:?}"),
    }

    shell.add("alpha", &[]);
    shell.add("beta", &[]);
    let (call, _) = shell.next_call().await;
    assert_eq!(call.args, vec![json!("beta")]);
    assert_eq!(call.origin.unwrap().generation, 2);

    shell.wait_for_stats(|completed, failed| completed == 1 && failed == 1).await;
    shell.quit().await;
}
