use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use replay::{
    Advance, CheckoutOptions, CommitOutcome, Endpoint, RebaseError, RebaseOptions, Step,
};
use replay_git::{GitRepo, GixRepo, RefName, Signature};

mod format;
mod telemetry;

use format::OutputFormat;

/// Resumable merge-based rebase
///
/// Replays the commits of a branch onto another commit one step at a time.
/// Progress lives in .git/rebase-merge/, so a rebase can be stopped at a
/// conflict, resolved with ordinary git commands, and resumed later.
///
/// WORKFLOW:
///
///   git-replay start topic --onto main
///   git-replay continue          # apply every step, stop at a conflict
///   #   resolve, then `git add` the fixed files
///   git-replay continue          # pick up where it stopped
///
/// Or drive each step by hand with `next`, `commit` and `finish`.
#[derive(Parser)]
#[command(name = "git-replay")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Repository to operate on
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Committer name (defaults to git config user.name)
    #[arg(long, global = true, env = "GIT_REPLAY_NAME")]
    name: Option<String>,

    /// Committer email (defaults to git config user.email)
    #[arg(long, global = true, env = "GIT_REPLAY_EMAIL")]
    email: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a rebase
    ///
    /// Queues every non-merge commit on BRANCH that is not on UPSTREAM, then
    /// detaches HEAD at ONTO. At least one of --upstream and --onto is
    /// required; each defaults to the other.
    Start {
        /// Branch to rebase (defaults to the current HEAD)
        branch: Option<String>,

        /// Commits reachable from here are not replayed
        #[arg(long)]
        upstream: Option<String>,

        /// Commit to replay onto
        #[arg(long)]
        onto: Option<String>,

        /// Record the rebase as quiet
        #[arg(short, long)]
        quiet: bool,
    },

    /// Apply the next queued commit to the working tree
    Next {
        /// Overwrite local modifications
        #[arg(long)]
        force: bool,
    },

    /// Commit the current step
    Commit {
        /// Replace the original commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Commit the current step and keep going until a conflict or the end
    Continue(NotesArgs),

    /// Abandon the rebase and restore the original branch
    Abort,

    /// Move the original branch to the rebased commits
    Finish(NotesArgs),

    /// Show rebase progress
    Status(StatusArgs),
}

#[derive(Args)]
struct NotesArgs {
    /// Copy notes under this ref to rewritten commits
    /// (defaults to git config notes.rewriteRef)
    #[arg(long)]
    notes_ref: Option<String>,
}

#[derive(Args)]
struct StatusArgs {
    /// Output format: text or json
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Shorthand for --format json
    #[arg(long)]
    json: bool,
}

fn main() {
    telemetry::init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let repo = GixRepo::open(&cli.repo)
        .with_context(|| format!("opening repository at {}", cli.repo.display()))?;
    let ident = Identity {
        name: cli.name,
        email: cli.email,
    };

    match cli.command {
        Commands::Start {
            branch,
            upstream,
            onto,
            quiet,
        } => start(&repo, &ident, branch.as_deref(), upstream.as_deref(), onto.as_deref(), quiet),
        Commands::Next { force } => next(&repo, force),
        Commands::Commit { message } => {
            let outcome =
                replay::commit(&repo, None, &ident.signature(&repo)?, None, message.as_deref())?;
            report_commit(outcome);
            Ok(())
        }
        Commands::Continue(notes) => resume(&repo, &ident, &notes.options()?),
        Commands::Abort => {
            replay::abort(&repo, &ident.signature(&repo)?)?;
            println!("Rebase aborted.");
            Ok(())
        }
        Commands::Finish(notes) => finish(&repo, &ident, &notes.options()?),
        Commands::Status(args) => status(&repo, &args),
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

struct Identity {
    name: Option<String>,
    email: Option<String>,
}

impl Identity {
    fn signature(&self, repo: &dyn GitRepo) -> Result<Signature> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => repo
                .read_config("user.name")?
                .context("no committer name: set user.name or pass --name")?,
        };
        let email = match &self.email {
            Some(email) => email.clone(),
            None => repo
                .read_config("user.email")?
                .context("no committer email: set user.email or pass --email")?,
        };
        Ok(Signature::now(name, email))
    }
}

impl NotesArgs {
    fn options(&self) -> Result<RebaseOptions> {
        let rewrite_notes_ref = self
            .notes_ref
            .as_deref()
            .map(RefName::new)
            .transpose()
            .context("invalid --notes-ref")?;
        Ok(RebaseOptions {
            quiet: false,
            rewrite_notes_ref,
        })
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn start(
    repo: &dyn GitRepo,
    ident: &Identity,
    branch: Option<&str>,
    upstream: Option<&str>,
    onto: Option<&str>,
    quiet: bool,
) -> Result<()> {
    if upstream.is_none() && onto.is_none() {
        bail!("pass --upstream, --onto, or both");
    }
    let branch = match branch {
        Some(spec) => Endpoint::resolve(repo, spec)?,
        None => Endpoint::head(repo)?,
    };
    let upstream = upstream.map(|u| Endpoint::resolve(repo, u)).transpose()?;
    let onto = onto.map(|o| Endpoint::resolve(repo, o)).transpose()?;

    let opts = RebaseOptions {
        quiet,
        rewrite_notes_ref: None,
    };
    let state = replay::begin(
        repo,
        &branch,
        upstream.as_ref(),
        onto.as_ref(),
        &ident.signature(repo)?,
        &opts,
    )?;
    if !quiet {
        println!(
            "Rebasing {} onto {}: {} step(s) queued.",
            branch.display_name(),
            state.merge.onto_name,
            state.merge.end
        );
    }
    Ok(())
}

fn next(repo: &dyn GitRepo, force: bool) -> Result<()> {
    let opts = if force {
        CheckoutOptions::force()
    } else {
        CheckoutOptions::default()
    };
    match replay::advance(repo, &opts)? {
        Advance::Exhausted => println!("No steps left. Run `git-replay finish`."),
        Advance::Step(step) => report_step(&step),
    }
    Ok(())
}

fn resume(repo: &dyn GitRepo, ident: &Identity, opts: &RebaseOptions) -> Result<()> {
    let committer = ident.signature(repo)?;
    match replay::commit(repo, None, &committer, None, None) {
        Ok(outcome) => report_commit(outcome),
        Err(RebaseError::NoStepInProgress) => {}
        Err(e) => return Err(e.into()),
    }

    loop {
        match replay::advance(repo, &CheckoutOptions::default())? {
            Advance::Exhausted => return finish(repo, ident, opts),
            Advance::Step(step) => {
                report_step(&step);
                if !step.conflicts.is_empty() {
                    bail!(
                        "could not apply {}: resolve the conflicts, `git add` them, \
                         then run `git-replay continue`",
                        step.commit.oid
                    );
                }
                report_commit(replay::commit(repo, None, &committer, None, None)?);
            }
        }
    }
}

fn finish(repo: &dyn GitRepo, ident: &Identity, opts: &RebaseOptions) -> Result<()> {
    let head_name = replay::status(repo)?.and_then(|p| p.head_name);
    replay::finish(repo, &ident.signature(repo)?, opts)?;
    match head_name {
        Some(name) => println!("Successfully rebased and updated {name}."),
        None => println!("Successfully rebased."),
    }
    Ok(())
}

fn status(repo: &dyn GitRepo, args: &StatusArgs) -> Result<()> {
    let progress = replay::status(repo)?;
    match OutputFormat::with_json_flag(args.format, args.json) {
        OutputFormat::Json => println!("{}", OutputFormat::Json.serialize(&progress)?),
        OutputFormat::Text => match progress {
            None => println!("No rebase in progress."),
            Some(p) => {
                println!("{} rebase onto {}", p.kind, p.onto_name);
                if let Some(branch) = &p.head_name {
                    println!("  branch:    {branch}");
                }
                println!("  step:      {}/{}", p.step, p.total);
                println!("  committed: {}", p.rewritten);
                if let (Some(id), Some(summary)) = (&p.current, &p.current_summary) {
                    println!("  current:   {id} {summary}");
                }
            }
        },
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

fn report_step(step: &Step) {
    println!(
        "[{}/{}] {} {}",
        step.number,
        step.total,
        step.commit.oid,
        step.commit.summary()
    );
    for path in &step.conflicts {
        println!("  CONFLICT: {path}");
    }
}

fn report_commit(outcome: CommitOutcome) {
    match outcome {
        CommitOutcome::Committed(id) => println!("  -> {id}"),
        CommitOutcome::AlreadyApplied => println!("  already applied, skipping"),
    }
}
