use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use agentflow::api::{Backend, HttpBackend, PlanPayload};
use agentflow::app::Orchestrator;
use agentflow::assessment;
use agentflow::config::Config;
use agentflow::tea::{summary_text, Message, Model, NotificationLevel};
use agentflow::workflow::{FeatureId, PlanTopic, TaskId, WorkflowPhase};
use agentflow::{Error, Result};

/// agentflow - drive an AI agent runner through questions, plans and tasks
#[derive(Parser, Debug)]
#[command(name = "agentflow")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    AGENTFLOW_DEBUG=1   Enable debug logging (alternative to --debug)\n    RUST_LOG=...        Override the log filter"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.agentflow/agentflow.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Agent runner base URL (overrides the config file)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Project to work on (overrides the config file)
    #[arg(short = 'p', long, global = true)]
    pub project: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a planning conversation; clarifying questions are asked on stdin
    Plan {
        /// What to plan, in natural language
        prompt: String,

        /// Backlog the plan targets
        #[arg(long, default_value = "planning")]
        topic: PlanTopic,

        /// Confirm the resulting plan and run its tasks one by one
        #[arg(long)]
        confirm: bool,
    },

    /// Run a single task
    RunTask {
        task_id: String,
    },

    /// Assess the project's code base
    Assess {
        /// Folder to show while the assessment runs
        #[arg(long)]
        folder: Option<String>,
    },

    /// Ask the agent to reorder the project's tasks
    Prioritize,

    /// Check connectivity with the agent
    Test,

    /// Chat about the project
    Chat {
        message: String,

        /// Task to include as context (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,

        /// Feature to include as context (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,
    },

    /// Parse an assessment text file without contacting the runner
    ParseAssessment {
        file: PathBuf,

        /// Print the section layout instead of JSON
        #[arg(long)]
        render: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    agentflow::log::init_with_debug(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::ParseAssessment { file, render } = &cli.command {
        return run_parse_assessment(file, *render);
    }

    let mut config = Config::load()?;
    if let Some(url) = cli.url {
        config.base_url = Some(url);
    }
    if let Some(project) = cli.project {
        config.project_id = Some(project);
    }
    info!(
        base_url = config.effective_base_url(),
        project = ?config.project_id,
        "agentflow starting"
    );

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_config(&config)?);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command(cli.command, config, backend))
}

async fn run_command(command: Command, config: Config, backend: Arc<dyn Backend>) -> Result<()> {
    let mut orch = Orchestrator::new(&config, backend);
    if let Some(project_id) = orch.model().project_id.clone() {
        orch.dispatch(Message::OpenProject(project_id));
        orch.run_until_settled().await;
        if let Some(n) = &orch.model().notification {
            eprintln!("warning: {}", n.message);
        }
    }

    let outcome = match command {
        Command::Plan {
            prompt,
            topic,
            confirm,
        } => run_plan(&mut orch, topic, prompt, confirm).await,

        Command::RunTask { task_id } => {
            orch.dispatch(Message::RunTask(TaskId::new(task_id)));
            follow(&mut orch).await;
            print_tasks(orch.model());
            finish(orch.model())
        }

        Command::Assess { folder } => {
            orch.dispatch(Message::Assess { folder });
            follow(&mut orch).await;
            finish(orch.model())?;
            let text = orch
                .model()
                .project
                .as_ref()
                .and_then(|p| p.assessment.clone())
                .unwrap_or_default();
            print_assessment(&text, true)
        }

        Command::Prioritize => {
            orch.dispatch(Message::Prioritize);
            follow(&mut orch).await;
            finish(orch.model())?;
            if let Some(result) = &orch.model().prioritize_result {
                println!("{}", result);
            }
            print_tasks(orch.model());
            Ok(())
        }

        Command::Test => {
            orch.dispatch(Message::TestConnection);
            follow(&mut orch).await;
            finish(orch.model())?;
            if let Some(result) = &orch.model().test_result {
                println!("{}", result);
            }
            Ok(())
        }

        Command::Chat {
            message,
            tasks,
            features,
        } => {
            orch.dispatch(Message::Chat {
                message,
                task_ids: tasks.into_iter().map(TaskId::new).collect(),
                feature_ids: features.into_iter().map(FeatureId::new).collect(),
            });
            follow(&mut orch).await;
            finish(orch.model())?;
            if let Some(reply) = &orch.model().chat_reply {
                println!("{}", reply);
            }
            Ok(())
        }

        Command::ParseAssessment { file, render } => run_parse_assessment(&file, render),
    };

    let trail: Vec<String> = orch
        .model()
        .machine
        .history()
        .map(|entry| entry.phase.to_string())
        .collect();
    debug!(phases = %trail.join(" -> "), "phase trail");
    outcome
}

async fn run_plan(
    orch: &mut Orchestrator,
    topic: PlanTopic,
    prompt: String,
    confirm: bool,
) -> Result<()> {
    orch.dispatch(Message::SubmitPrompt { topic, prompt });
    follow(orch).await;

    while orch.model().phase() == WorkflowPhase::Questions && !orch.model().is_waiting() {
        let count = orch.model().pending_questions.len();
        if count == 0 {
            break;
        }
        println!();
        for index in 0..count {
            orch.dispatch(Message::SelectQuestion(index));
            let Some(question) = orch.model().current_question().cloned() else {
                break;
            };
            let answer = ask(&question.question, question.hint.as_deref())?;
            orch.dispatch(Message::AnswerQuestion(answer));
        }
        orch.dispatch(Message::SubmitAnswers);
        follow(orch).await;
    }

    finish(orch.model())?;
    let Some(plan) = orch.model().pending_plan.clone() else {
        return Ok(());
    };
    print_plan(&plan);

    if confirm {
        orch.dispatch(Message::ConfirmPlan);
        follow(orch).await;
        print_tasks(orch.model());
        finish(orch.model())?;
    }
    Ok(())
}

/// Dispatch background messages until the orchestrator settles, echoing
/// progress to stderr.
async fn follow(orch: &mut Orchestrator) {
    let mut last_status: Option<String> = None;
    let mut last_task: Option<TaskId> = None;
    let mut last_agent: Option<String> = None;

    while orch.is_busy() {
        if !orch.next().await {
            break;
        }
        let model = orch.model();
        if model.current_task != last_task {
            if let Some(task) = &model.current_task {
                let title = model.task(task).and_then(|t| t.title.clone()).unwrap_or_default();
                eprintln!("▶ task {} {}", task, title);
            }
            last_task = model.current_task.clone();
        }
        if model.transient.status_message != last_status {
            if let Some(status) = &model.transient.status_message {
                eprintln!("  {}", status);
            }
            last_status = model.transient.status_message.clone();
        }
        let agent = model
            .transient
            .agent_activity
            .last()
            .and_then(|entry| entry.label())
            .map(str::to_string);
        if agent.is_some() && agent != last_agent {
            if let Some(label) = &agent {
                eprintln!("  · {}", label);
            }
            last_agent = agent;
        }
    }
}

/// Turn an error notification left by the last operation into an error.
fn finish(model: &Model) -> Result<()> {
    match &model.notification {
        Some(n) if n.level == NotificationLevel::Error => Err(Error::Backend(n.message.clone())),
        Some(n) => {
            eprintln!("{}", n.message);
            Ok(())
        }
        None => Ok(()),
    }
}

fn ask(question: &str, hint: Option<&str>) -> Result<String> {
    println!("? {}", question);
    if let Some(hint) = hint {
        println!("  ({})", hint);
    }
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_plan(plan: &PlanPayload) {
    println!();
    if let Some(name) = summary_text(&plan.project, "name") {
        println!("Project: {}", name);
    }
    println!("Plan: {} features, {} tasks", plan.features.len(), plan.task_count());
    for feature in &plan.features {
        println!("  {}", feature.name);
        for task in &feature.tasks {
            println!("    - {}", task.title);
        }
    }
}

fn print_tasks(model: &Model) {
    for task in &model.tasks {
        println!(
            "{:<12} {:<10} {}",
            task.status.as_deref().unwrap_or_default(),
            task.id,
            task.title.as_deref().unwrap_or_default()
        );
    }
}

fn print_assessment(text: &str, render: bool) -> Result<()> {
    match assessment::parse(text) {
        Some(parsed) if render => print!("{}", assessment::format(&parsed)),
        Some(parsed) => println!("{}", serde_json::to_string_pretty(&parsed)?),
        None => println!("{}", text),
    }
    Ok(())
}

fn run_parse_assessment(file: &Path, render: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)?;
    print_assessment(&text, render)
}
