use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tether_core::backends::loopback::LoopbackDriver;
use tether_core::backends::BackendKind;
use tether_core::breakpoints::{BreakpointBuilder, BreakpointKind};
use tether_core::capability::{CapabilityKind, Launchable};
use tether_core::config::ModelConfig;
use tether_core::error::ModelError;
use tether_core::model::ObjectModel;
use tether_core::operation::Operation;
use tether_core::params::Arguments;
use tether_core::session::DebuggerSession;
use tether_core::types::{ExecutionState, TargetPath};
use tether_host::{run_async, HostConfig, TaskFlags, TaskOutcome, TokioScheduler};
use tether_utils::{info, init_logging};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Drive the tether target model against a simulated debugger backend.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version)]
#[command(about = "Drive the tether target model against a simulated debugger backend", long_about = None)]
struct Cli
{
    /// Backend layout to mirror: lldb, gdb or frida
    #[arg(short, long, global = true, default_value = "lldb")]
    backend: BackendKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the object tree right after connecting
    Tree,
    /// Describe the launch parameters of the backend
    Params,
    /// Launch a command, stop it, set breakpoints and resume it
    Run
    {
        /// Execution breakpoint location, in the backend's notation (repeatable)
        #[arg(long = "break")]
        breakpoints: Vec<String>,
        /// Watchpoint location, in the backend's notation
        #[arg(long)]
        watch: Option<String>,
        /// Bytes covered by the watchpoint
        #[arg(long, default_value_t = 4)]
        length: u64,
        /// Access that triggers the watchpoint
        #[arg(long, value_enum, default_value_t = WatchKind::Write)]
        watch_kind: WatchKind,
        /// Let the process exit as soon as it is resumed
        #[arg(long, default_value_t = false)]
        exit: bool,
        /// Command line of the simulated process
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum WatchKind
{
    Read,
    Write,
    Access,
}

impl From<WatchKind> for BreakpointKind
{
    fn from(kind: WatchKind) -> Self
    {
        match kind {
            WatchKind::Read => BreakpointKind::Read,
            WatchKind::Write => BreakpointKind::Write,
            WatchKind::Access => BreakpointKind::Access,
        }
    }
}

fn main()
{
    // Reads RUST_LOG, TETHER_LOG_FORMAT and TETHER_LOG_FILE
    let _logging = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run_command(cli)) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run_command(cli: Cli) -> CliResult<()>
{
    let driver = match &cli.command {
        Commands::Run { exit, .. } => LoopbackDriver::new().with_exit_on_resume(*exit),
        _ => LoopbackDriver::new(),
    };
    let driver = Arc::new(driver);
    let session = Arc::new(DebuggerSession::open(cli.backend, driver.clone(), ModelConfig::from_env()?)?);
    info!(backend = %cli.backend, "connected to loopback driver");

    match cli.command {
        Commands::Tree => print_tree(session.model()),
        Commands::Params => print_params(session.model())?,
        Commands::Run {
            breakpoints,
            watch,
            length,
            watch_kind,
            command,
            ..
        } => {
            let watch = watch.map(|location| BreakpointBuilder::at(location).with_length(length).with_kind(watch_kind.into()));
            run(&session, &driver, &command, breakpoints, watch).await?;
        }
    }

    if let Ok(session) = Arc::try_unwrap(session) {
        session.disconnect().await?;
    }
    Ok(())
}

async fn run(
    session: &Arc<DebuggerSession>,
    driver: &LoopbackDriver,
    command: &[String],
    breakpoints: Vec<String>,
    watch: Option<BreakpointBuilder>,
) -> CliResult<()>
{
    let mut events = session.model().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("  | {}", event.describe()),
                Err(RecvError::Lagged(missed)) => println!("  | ... {missed} events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let line = command
        .iter()
        .map(|word| if word.contains(' ') { format!("\"{word}\"") } else { word.clone() })
        .collect::<Vec<_>>()
        .join(" ");
    let (scheduler, mut reports) = TokioScheduler::current(HostConfig::from_env()?)?;
    let (launched, pid) = oneshot::channel();
    run_async(&scheduler, session.clone(), "launch", TaskFlags::command(), move |session, _| {
        let mut arguments = Arguments::new();
        arguments.insert("args".to_string(), line.into());
        match session.protocol().launch(&TargetPath::root(), arguments) {
            Ok(launch) => launch.map(move |pid| {
                // The receiver only goes away if the CLI is already failing.
                let _ = launched.send(pid);
            }),
            Err(err) => Operation::failed(err),
        }
    })?;
    let report = reports.recv().await.ok_or(ModelError::Disconnected)?;
    if let TaskOutcome::Failed(err) = report.outcome {
        return Err(err.into());
    }

    let pid = pid.await.map_err(|_| ModelError::Disconnected)?;
    let path = session.kind().process_path(pid);
    let process = session.model().wait_for_object(&path).await?;
    let state = process.async_state().ok_or_else(|| ModelError::NotFound(format!("{path} has no execution state")))?;
    state.wait_until(ExecutionState::is_stopped).await?;
    println!("Launched {} at {path}, state {}", process.display(), state.state().unwrap_or(ExecutionState::Inactive));

    let mut first_break = None;
    let requests = breakpoints.into_iter().map(BreakpointBuilder::at).chain(watch);
    for request in requests {
        let info = session.protocol().insert_breakpoint(&path, request)?.await?;
        println!("Breakpoint {} ({}) at {}", info.id, info.location.kind, info.location.address);
        if info.location.kind == BreakpointKind::Execution && first_break.is_none() {
            first_break = Some(info);
        }
    }

    let moved = state.wait_until(|current| !current.is_stopped());
    session.protocol().resume(&path)?.await?;
    match moved.await {
        Ok(current) => println!("Resumed, state {current}"),
        Err(ModelError::ObjectGone(_)) => println!("Process exited and was removed"),
        Err(err) => return Err(err.into()),
    }

    if let Some(breakpoint) = first_break.filter(|_| driver.process_state(pid).is_some()) {
        let stopped = state.wait_for(ExecutionState::Stopped);
        driver.hit(pid, breakpoint.location.address)?;
        stopped.await?;
        let hits = session.model().breakpoints().info(breakpoint.id).map_or(0, |info| info.hit_count);
        println!("Stopped at breakpoint {} ({hits} hit)", breakpoint.id);
        session.protocol().kill(&path)?.await?;
    }

    println!();
    print_tree(session.model());
    printer.abort();
    Ok(())
}

fn print_tree(model: &ObjectModel)
{
    println!("Object tree ({} objects):", model.len());
    if let Some(root) = model.get(&TargetPath::root()) {
        println!("  (root) {}", root.type_name());
    }
    print_children(model, &TargetPath::root(), 1);
}

fn print_children(model: &ObjectModel, path: &TargetPath, depth: usize)
{
    for child in model.children(path) {
        let name = child.path().last().map(ToString::to_string).unwrap_or_default();
        let kinds = child.capabilities().kinds();
        let mut line = format!("{:indent$}{name}  {}", "", child.type_name(), indent = depth * 2);
        if let Some(state) = child.execution_state() {
            line.push_str(&format!("  [{state}]"));
        }
        if !kinds.is_empty() {
            let kinds: Vec<String> = kinds.iter().map(ToString::to_string).collect();
            line.push_str(&format!("  <{}>", kinds.join(", ")));
        }
        println!("{line}");
        print_children(model, child.path(), depth + 1);
    }
}

fn print_params(model: &ObjectModel) -> CliResult<()>
{
    let launcher = model.suitable_object(CapabilityKind::Launchable, &TargetPath::root())?;
    let launchable = model.suitable::<dyn Launchable>(launcher.path())?;
    println!("Launch parameters of {}:", launcher.path());
    for parameter in launchable.parameters().iter() {
        println!(
            "  {} ({}{}) \"{}\": {}",
            parameter.name,
            parameter.parameter_type,
            if parameter.required { ", required" } else { "" },
            parameter.display,
            parameter.description
        );
    }
    Ok(())
}
