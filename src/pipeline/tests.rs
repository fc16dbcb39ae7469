use super::*;
use crate::subprocess::MockProcessRunner;
use crate::technique::{parse_selection, FailureKind, CATALOG};
use std::sync::Mutex;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    tools: PathBuf,
    workspace: PathBuf,
    input: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let tools = dir.path().join("Obfuscation_Technique");
        for descriptor in CATALOG.iter() {
            let script = descriptor.script_path(&tools);
            std::fs::create_dir_all(script.parent().unwrap()).unwrap();
            std::fs::write(&script, "# tool").unwrap();
        }
        let workspace = dir.path().join("ObfusWorkspace");
        std::fs::create_dir_all(&workspace).unwrap();
        let input = workspace.join("input.ps1");
        std::fs::write(&input, "Write-Host 'original'").unwrap();
        Self {
            _dir: dir,
            tools,
            workspace,
            input,
        }
    }

    fn request(&self, techniques: &str) -> PipelineRequest {
        PipelineRequest {
            selection: parse_selection(techniques),
            input: self.input.clone(),
            workspace: self.workspace.clone(),
            output_name: "obfuscated.ps1".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn output(&self) -> PathBuf {
        self.workspace.join("obfuscated.ps1")
    }
}

fn program_for(technique: TechniqueId) -> &'static str {
    if cfg!(windows) {
        match technique.descriptor().interpreter {
            crate::technique::Interpreter::PowerShell => "pwsh",
            crate::technique::Interpreter::Python => "python3",
        }
    } else {
        "sh"
    }
}

fn marker(technique: TechniqueId) -> &'static str {
    match technique {
        TechniqueId::Invoke => "Invoke-PSObfuscation -Path",
        TechniqueId::Xencrypt => "Invoke-BetterXencrypt",
        TechniqueId::Chameleon => "chameleon.py",
        TechniqueId::Pyfuscation => "PyFuscation.py",
    }
}

/// Tool that exits 0 and writes `body` to the output path.
fn expect_success(mock: &mut MockProcessRunner, technique: TechniqueId, output: &Path, body: &str) {
    let output = output.to_path_buf();
    let body = body.to_string();
    mock.expect_command(program_for(technique))
        .with_arg_containing(marker(technique))
        .with_side_effect(move |_| std::fs::write(&output, &body).unwrap())
        .returns_success()
        .finish();
}

fn expect_failure(mock: &mut MockProcessRunner, technique: TechniqueId) {
    mock.expect_command(program_for(technique))
        .with_arg_containing(marker(technique))
        .returns_exit_code(1)
        .returns_stderr("tool crashed")
        .finish();
}

fn invoker(mock: &MockProcessRunner, fx: &Fixture) -> TechniqueInvoker {
    TechniqueInvoker::new(Arc::new(mock.clone()), fx.tools.clone())
}

#[tokio::test]
async fn test_single_stage_success() {
    let fx = Fixture::new();
    let mut mock = MockProcessRunner::new();
    expect_success(&mut mock, TechniqueId::Invoke, &fx.output(), "obfuscated");

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .run(&fx.request("invoke"))
        .await;

    assert_eq!(outcome.state, PipelineState::Completed);
    assert_eq!(outcome.successful, vec![TechniqueId::Invoke]);
    assert_eq!(outcome.artifact.as_deref(), Some(fx.output().as_path()));
    assert_eq!(outcome.into_artifact().unwrap(), fx.output());
}

#[tokio::test]
async fn test_failed_stage_does_not_stop_later_stages() {
    let fx = Fixture::new();
    let mut mock = MockProcessRunner::new();
    expect_failure(&mut mock, TechniqueId::Invoke);
    expect_success(&mut mock, TechniqueId::Chameleon, &fx.output(), "chameleon output");

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .run(&fx.request("invoke,chameleon"))
        .await;

    assert_eq!(outcome.state, PipelineState::Completed);
    assert_eq!(outcome.successful, vec![TechniqueId::Chameleon]);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].failure, Some(FailureKind::ExitCode(1)));
    assert_eq!(outcome.results[0].diagnostic.as_deref(), Some("tool crashed"));
    assert_eq!(
        std::fs::read_to_string(fx.output()).unwrap(),
        "chameleon output"
    );
}

#[tokio::test]
async fn test_failed_stage_keeps_input_for_next_stage() {
    let fx = Fixture::new();
    let mut mock = MockProcessRunner::new();
    expect_success(&mut mock, TechniqueId::Invoke, &fx.output(), "stage one");
    expect_failure(&mut mock, TechniqueId::Chameleon);
    expect_failure(&mut mock, TechniqueId::Xencrypt);
    expect_success(&mut mock, TechniqueId::Pyfuscation, &fx.output(), "unused");

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .run(&fx.request("chameleon,invoke,chameleon,xencrypt"))
        .await;

    let inputs: Vec<&Path> = outcome.results.iter().map(|r| r.input.as_path()).collect();
    // Failed first stage: second stage sees the original input.
    assert_eq!(inputs[0], fx.input.as_path());
    assert_eq!(inputs[1], fx.input.as_path());
    // After a success the accumulator points at the output.
    assert_eq!(inputs[2], fx.output().as_path());
    assert_eq!(inputs[3], inputs[2]);
    assert_eq!(outcome.state, PipelineState::Completed);
}

#[tokio::test]
async fn test_unknown_technique_is_skipped() {
    let fx = Fixture::new();
    let mut mock = MockProcessRunner::new();
    expect_success(&mut mock, TechniqueId::Invoke, &fx.output(), "obfuscated");

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .run(&fx.request("bogus,invoke"))
        .await;

    assert_eq!(outcome.skipped, vec!["bogus".to_string()]);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.failures().count(), 0);
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_no_success_is_failure() {
    let fx = Fixture::new();
    let mut mock = MockProcessRunner::new();
    expect_failure(&mut mock, TechniqueId::Invoke);
    expect_failure(&mut mock, TechniqueId::Xencrypt);

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .run(&fx.request("invoke,xencrypt"))
        .await;

    assert_eq!(outcome.state, PipelineState::Failed);
    assert!(outcome.artifact.is_none());
    let err = outcome.into_artifact().unwrap_err();
    assert_eq!(err.code(), ErrorCode::PIPELINE_NO_SUCCESS);
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_missing_tools_fail_every_stage() {
    let fx = Fixture::new();
    std::fs::remove_dir_all(&fx.tools).unwrap();
    let mock = MockProcessRunner::new();

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .run(&fx.request("all"))
        .await;

    assert_eq!(outcome.results.len(), 4);
    assert!(outcome
        .results
        .iter()
        .all(|r| r.failure == Some(FailureKind::MissingTool)));
    assert!(mock.get_call_history().is_empty());
    assert_eq!(outcome.state, PipelineState::Failed);
}

#[tokio::test]
async fn test_previous_artifact_does_not_count() {
    let fx = Fixture::new();
    std::fs::write(fx.output(), "left over").unwrap();
    let mut mock = MockProcessRunner::new();
    // Exits cleanly but writes nothing.
    mock.expect_command(program_for(TechniqueId::Invoke))
        .returns_success()
        .finish();

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .run(&fx.request("invoke"))
        .await;

    assert_eq!(outcome.state, PipelineState::Failed);
    assert_eq!(outcome.results[0].failure, Some(FailureKind::MissingOutput));
}

#[tokio::test]
async fn test_input_named_like_output_survives_indirect_workspace_path() {
    let fx = Fixture::new();
    let input = fx.output();
    std::fs::write(&input, "operator script").unwrap();
    let base = fx.workspace.parent().unwrap().to_path_buf();
    std::fs::create_dir_all(base.join("sub")).unwrap();

    let mut request = fx.request("invoke");
    request.input = std::fs::canonicalize(&input).unwrap();
    request.workspace = base.join("sub").join("..").join("ObfusWorkspace");

    let mut mock = MockProcessRunner::new();
    expect_failure(&mut mock, TechniqueId::Invoke);
    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker).run(&request).await;

    assert_eq!(outcome.state, PipelineState::Failed);
    assert_eq!(std::fs::read_to_string(&input).unwrap(), "operator script");
}

#[tokio::test]
async fn test_interrupt_stops_before_next_stage() {
    let fx = Fixture::new();
    let flag = Arc::new(AtomicBool::new(false));
    let mut mock = MockProcessRunner::new();
    let output = fx.output();
    let raise = flag.clone();
    mock.expect_command(program_for(TechniqueId::Invoke))
        .with_arg_containing(marker(TechniqueId::Invoke))
        .with_side_effect(move |_| {
            std::fs::write(&output, "partial").unwrap();
            raise.store(true, Ordering::SeqCst);
        })
        .returns_success()
        .finish();

    let invoker = invoker(&mock, &fx);
    let outcome = PipelineOrchestrator::new(&invoker)
        .with_interrupt_flag(flag)
        .run(&fx.request("invoke,chameleon"))
        .await;

    assert_eq!(outcome.state, PipelineState::Interrupted);
    assert_eq!(outcome.results.len(), 1);
    // Artifacts are left in place.
    assert!(fx.output().exists());
    assert_eq!(outcome.into_artifact().unwrap_err().exit_code(), 130);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl StageObserver for &Recorder {
    fn pipeline_started(&self, total: usize) {
        self.events.lock().unwrap().push(format!("start {total}"));
    }
    fn stage_started(&self, index: usize, _total: usize, technique: TechniqueId) {
        self.events.lock().unwrap().push(format!("run {index} {technique}"));
    }
    fn stage_skipped(&self, index: usize, _total: usize, raw: &str) {
        self.events.lock().unwrap().push(format!("skip {index} {raw}"));
    }
    fn stage_finished(&self, index: usize, _total: usize, result: &TechniqueResult) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {index} {}", result.success));
    }
    fn pipeline_finished(&self, outcome: &PipelineOutcome) {
        self.events.lock().unwrap().push(format!("end {}", outcome.state));
    }
}

#[tokio::test]
async fn test_observer_sees_every_stage() {
    let fx = Fixture::new();
    let mut mock = MockProcessRunner::new();
    expect_success(&mut mock, TechniqueId::Chameleon, &fx.output(), "x");
    let recorder = Recorder::default();

    let invoker = invoker(&mock, &fx);
    PipelineOrchestrator::new(&invoker)
        .with_observer(Box::new(&recorder))
        .run(&fx.request("chameleon,nope"))
        .await;

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start 2",
            "run 0 chameleon",
            "done 0 true",
            "skip 1 nope",
            "end completed"
        ]
    );
}

#[test]
fn test_next_input_moves_only_on_success() {
    let current = PathBuf::from("/ws/input.ps1");
    let output = Path::new("/ws/obfuscated.ps1");
    let mut result = TechniqueResult {
        technique: TechniqueId::Invoke,
        success: false,
        input: current.clone(),
        failure: Some(FailureKind::Timeout(Duration::from_secs(120))),
        diagnostic: None,
        elapsed: Duration::ZERO,
    };

    assert_eq!(next_input(current.clone(), &result, output), current);
    result.success = true;
    assert_eq!(next_input(current, &result, output), output);
}
