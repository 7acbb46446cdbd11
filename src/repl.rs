use crate::command::{Command, ParseError};
use crate::constants::PROMPT;
use crate::generate::TextGenerator;
use crate::git::Backend;
use crate::session::{Flow, Operator, Session};
use crate::{error, info};
use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

/// read, parse and execute operator commands until `exit` or end of input
///
/// parse and command failures are reported and the loop carries on; ctrl-c
/// abandons the current line, ctrl-d behaves like `exit`.
pub fn run<B: Backend, G: TextGenerator>(
    session: &mut Session<B, G>,
    operator: &mut impl Operator,
) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                info!("exit");
                return session.finish();
            }
            Err(e) => return Err(e).context("failed to read input"),
        };

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                error!(e);
                continue;
            }
        };
        if let Err(e) = editor.add_history_entry(line.trim()) {
            debug!(error = %e, "history entry dropped");
        }

        match session.execute(command, operator) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => return Ok(()),
            Err(e) => error!("{:#}", e),
        }
    }
}
