use crate::changeset::Change;
use crate::command::{Command, DisplayTarget, HELP, RedoMode, Selection};
use crate::constants::FALLBACK_MESSAGE;
use crate::generate::{MessageGenerator, TextGenerator};
use crate::git::Backend;
use crate::inspect;
use crate::orchestrator::{Orchestrator, Report};
use crate::store::{FileRecord, StagingArea};
use crate::ui;
use crate::{error, info, status, warning};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::debug;

/// whether the operator may exclude files from commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReadyPolicy {
    /// every discovered file stays ready for the whole session
    #[default]
    Fixed,
    /// `ready`/`unready` toggle files in and out
    Toggle,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// parallel message generations during population
    pub jobs: usize,
    pub ready_policy: ReadyPolicy,
}

/// the interactive side of a session: questions only the operator can answer
pub trait Operator {
    /// yes or no; `None` when the operator backs out
    fn confirm(&mut self, question: &str) -> Result<Option<bool>>;

    /// free text seeded with `initial`; `None` when the operator backs out
    fn compose(&mut self, initial: &str) -> Result<Option<String>>;

    fn clear(&mut self) -> Result<()>;
}

/// `Operator` on the controlling terminal
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn confirm(&mut self, question: &str) -> Result<Option<bool>> {
        status!("{}", question);
        Ok(ui::prompt(&["yes", "no"])?.map(|c| c == 'y'))
    }

    fn compose(&mut self, initial: &str) -> Result<Option<String>> {
        // multi-line bodies need a real editor
        match std::env::var("EDITOR") {
            Ok(editor) if !editor.trim().is_empty() => ui::edit_multi_line(&editor, initial),
            _ => ui::edit_one_line(initial),
        }
    }

    fn clear(&mut self) -> Result<()> {
        ui::clear_screen()
    }
}

/// what the command loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// one interactive session over a populated staging area
pub struct Session<B, G> {
    store: StagingArea,
    orchestrator: Orchestrator<B>,
    generator: MessageGenerator<G>,
    ready_policy: ReadyPolicy,
}

impl<B: Backend, G: TextGenerator> Session<B, G> {
    /// capture HEAD, stage and discover changes, then describe each file
    ///
    /// message generation fans out over `options.jobs` threads; records keep
    /// discovery order regardless of completion order.
    pub fn start(
        backend: B,
        generator: MessageGenerator<G>,
        options: &SessionOptions,
        progress: &ProgressBar,
    ) -> Result<Self> {
        let orchestrator = Orchestrator::new(backend).context("failed to read HEAD")?;
        let changes = inspect::discover(orchestrator.backend())
            .context("failed to inspect the working tree")?;
        let diffs: Vec<String> = changes
            .iter()
            .map(|c| inspect::diff_for(orchestrator.backend(), &c.path))
            .collect();

        progress.set_length(changes.len() as u64);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .build()
            .context("failed to start generation workers")?;
        let messages: Vec<String> = pool.install(|| {
            changes
                .par_iter()
                .zip(diffs.par_iter())
                .map(|(change, diff)| {
                    let message = initial_message(&generator, change, diff, progress);
                    progress.inc(1);
                    message
                })
                .collect()
        });
        progress.finish_and_clear();

        let records = changes
            .into_iter()
            .zip(diffs)
            .zip(messages)
            .map(|((change, diff), message)| FileRecord::new(change, diff, message))
            .collect();
        let mut store = StagingArea::new();
        store.populate(records)?;
        debug!(files = store.len(), "session populated");

        Ok(Self {
            store,
            orchestrator,
            generator,
            ready_policy: options.ready_policy,
        })
    }

    pub fn store(&self) -> &StagingArea {
        &self.store
    }

    pub fn backend(&self) -> &B {
        self.orchestrator.backend()
    }

    /// run one command against the session
    pub fn execute(&mut self, command: Command, operator: &mut impl Operator) -> Result<Flow> {
        debug!(?command, "executing");
        match command {
            Command::Display(target) => self.display(target),
            Command::Redo { mode, index } => match mode {
                RedoMode::Generate => self.regenerate(index, operator)?,
                RedoMode::Manual => self.rewrite(index, operator)?,
            },
            Command::Commit(selection) => self.commit(&selection),
            Command::Uncommit(selection) => self.uncommit(&selection),
            Command::Ready { ready, selection } => self.set_ready(ready, &selection)?,
            Command::Push => warning!("push is not available yet, nothing was pushed"),
            Command::Clear => operator.clear()?,
            Command::Help => info!(HELP),
            Command::Exit => {
                self.finish()?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    /// unstage everything that was not committed
    pub fn finish(&self) -> Result<()> {
        self.backend()
            .unstage_all()
            .context("failed to unstage uncommitted changes")?;
        status!(
            "{} file(s) committed, everything else unstaged",
            self.store.committed_count()
        );
        Ok(())
    }

    fn display(&self, target: DisplayTarget) {
        match target {
            DisplayTarget::Table => ui::render_table(&self.store),
            DisplayTarget::AllMessages => {
                if self.store.is_empty() {
                    info!("no changed files");
                }
                for (index, record) in self.store.indexed() {
                    ui::render_message(index, record);
                }
            }
            DisplayTarget::File(index) => match self.store.get(index) {
                Ok(record) => ui::render_message(index, record),
                Err(e) => error!(e),
            },
        }
    }

    fn commit(&mut self, selection: &Selection) {
        if self.store.is_empty() {
            warning!("nothing to commit: the staging area is empty");
            return;
        }
        let report = match selection {
            Selection::All => self.orchestrator.commit_all(&mut self.store),
            Selection::Files(indices) => self.orchestrator.commit(&mut self.store, indices),
        };
        self.print_report(&report);
    }

    fn uncommit(&mut self, selection: &Selection) {
        if self.store.committed_count() == 0 {
            warning!("nothing to uncommit: no file has been committed");
            return;
        }
        let result = match selection {
            Selection::All => self.orchestrator.uncommit_all(&mut self.store),
            Selection::Files(indices) => self.orchestrator.uncommit(&mut self.store, indices),
        };
        match result {
            Ok(report) => self.print_report(&report),
            Err(e) => error!("uncommit aborted, nothing changed: {}", e),
        }
    }

    fn print_report(&self, report: &Report) {
        if report.is_empty() {
            info!("nothing to do");
            return;
        }
        for outcome in report.outcomes() {
            if outcome.is_failure() {
                error!(outcome);
            } else if outcome.is_skipped() {
                warning!(outcome);
            } else {
                status!(outcome);
            }
        }
        if report.failures() > 0 {
            error!("{} file(s) failed", report.failures());
        }
        info!(
            "{} of {} file(s) committed",
            self.store.committed_count(),
            self.store.len()
        );
    }

    /// regenerate creatively until the operator accepts a message
    fn regenerate(&mut self, index: usize, operator: &mut impl Operator) -> Result<()> {
        let Some(diff) = self.editable(index).map(|r| r.diff().to_string()) else {
            return Ok(());
        };
        if diff.trim().is_empty() {
            warning!("f{} has no diff to describe", index);
            return Ok(());
        }

        loop {
            status!("regenerating...");
            let message = match self.generator.generate(&diff, true) {
                Ok(message) => message,
                Err(e) => {
                    error!("{}, message unchanged", e);
                    return Ok(());
                }
            };
            info!();
            ui::render_text(&message);
            info!();

            match operator.confirm("keep this message?")? {
                Some(true) => {
                    self.store.set_message(index, message)?;
                    status!("f{} message updated", index);
                    return Ok(());
                }
                Some(false) => {}
                None => {
                    info!("cancelled, message unchanged");
                    return Ok(());
                }
            }
        }
    }

    /// replace the message with operator-supplied text
    fn rewrite(&mut self, index: usize, operator: &mut impl Operator) -> Result<()> {
        let Some(current) = self.editable(index).map(|r| r.message().to_string()) else {
            return Ok(());
        };
        let Some(text) = operator.compose(&current)? else {
            info!("cancelled, message unchanged");
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            warning!("empty message, keeping the current one");
            return Ok(());
        }
        self.store.set_message(index, text)?;
        status!("f{} message updated", index);
        Ok(())
    }

    /// the record at `index` if its message may change, reporting why not
    fn editable(&self, index: usize) -> Option<&FileRecord> {
        match self.store.get(index) {
            Err(e) => {
                error!(e);
                None
            }
            Ok(record) if record.is_committed() => {
                warning!(
                    "f{} {} is committed, uncommit it before changing its message",
                    index,
                    record.path()
                );
                None
            }
            Ok(record) => Some(record),
        }
    }

    fn set_ready(&mut self, ready: bool, selection: &Selection) -> Result<()> {
        if self.ready_policy == ReadyPolicy::Fixed {
            warning!("every file stays ready; start with `--ready-policy toggle` to change that");
            return Ok(());
        }
        let indices: Vec<usize> = match selection {
            Selection::All => (1..=self.store.len()).collect(),
            Selection::Files(indices) => indices.clone(),
        };
        for index in indices {
            let path = match self.store.get(index) {
                Err(e) => {
                    error!(e);
                    continue;
                }
                Ok(record) if !ready && record.is_committed() => {
                    warning!("f{} {}: committed, uncommit it first", index, record.path());
                    continue;
                }
                Ok(record) => record.path().to_string(),
            };
            self.store.set_ready(index, ready)?;
            status!(
                "f{} {}: {}",
                index,
                path,
                if ready { "ready" } else { "not ready" }
            );
        }
        Ok(())
    }
}

/// the message a record starts with
fn initial_message<G: TextGenerator>(
    generator: &MessageGenerator<G>,
    change: &Change,
    diff: &str,
    progress: &ProgressBar,
) -> String {
    if diff.trim().is_empty() {
        return format!("update {}", change.path);
    }
    match generator.generate(diff, false) {
        Ok(message) => message,
        Err(e) => {
            progress.suspend(|| {
                warning!("{}: {}, using fallback message", change.path, e);
            });
            FALLBACK_MESSAGE.to_string()
        }
    }
}
