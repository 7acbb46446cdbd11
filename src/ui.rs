use crate::constants::{MAX_PATH_COLUMN, MAX_SUBJECT_LENGTH};
use crate::store::{FileRecord, StagingArea};
use anyhow::{Context, Result};

#[macro_export]
macro_rules! warning {
    // format string literal (with or without inline formatting)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!($fmt $(, $($arg)*)?).yellow());
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!("{}", $expr).yellow());
    }};
}

#[macro_export]
macro_rules! error {
    // format string literal (with or without inline formatting)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!($fmt $(, $($arg)*)?).red());
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!("{}", $expr).red());
    }};
}

#[macro_export]
macro_rules! status {
    // format string literal (with or without inline formatting)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), "{}", format!($fmt $(, $($arg)*)?).green());
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), "{}", format!("{}", $expr).green());
    }};
}

#[macro_export]
macro_rules! info {
    () => {{
        use std::io::{self, Write};
        let _ = writeln!(io::stdout());
    }};
    // format string literal (with or without inline formatting or args)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), $fmt $(, $($arg)*)?);
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), "{}", $expr);
    }};
}

/// what a key press means while a `prompt` is waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyChoice {
    Pick(usize),
    Cancel,
    Ignore,
}

fn key_choice(
    code: crossterm::event::KeyCode,
    modifiers: crossterm::event::KeyModifiers,
    valid_chars: &[char],
) -> KeyChoice {
    use crossterm::event::{KeyCode, KeyModifiers};

    match code {
        KeyCode::Esc => KeyChoice::Cancel,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => KeyChoice::Cancel,
        // enter picks the first option
        KeyCode::Enter => KeyChoice::Pick(0),
        KeyCode::Char(c) => {
            let lower = c.to_lowercase().next().unwrap_or(c);
            valid_chars
                .iter()
                .position(|&ch| ch == lower)
                .map_or(KeyChoice::Ignore, KeyChoice::Pick)
        }
        _ => KeyChoice::Ignore,
    }
}

/// single-key choice between `options`, first option on enter
///
/// returns the lowercased first character of the chosen option, or `None`
/// when the operator backs out with esc or ctrl-c; the caller reports the
/// cancellation.
pub fn prompt(options: &[&str]) -> Result<Option<char>> {
    use crossterm::{
        event::{self, Event, KeyEvent, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode},
    };
    use std::io::{self, Write};

    debug_assert!(!options.is_empty(), "prompt requires at least one option");

    // "[y]es/[n]o"
    let mut labels = Vec::with_capacity(options.len());
    let mut valid_chars = Vec::with_capacity(options.len());
    for opt in options {
        let mut chars = opt.chars();
        let first = chars.next().unwrap_or('?');
        labels.push(format!("[{first}]{}", chars.as_str()));
        valid_chars.push(first.to_lowercase().next().unwrap_or(first));
    }

    print!("{} ? ", labels.join("/"));
    let _ = io::stdout().flush();

    enable_raw_mode().context("this command requires an interactive terminal")?;
    let choice = loop {
        let Ok(Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        })) = event::read()
        else {
            continue;
        };
        match key_choice(code, modifiers, &valid_chars) {
            KeyChoice::Pick(idx) => break Some(idx),
            KeyChoice::Cancel => break None,
            KeyChoice::Ignore => {}
        }
    };
    disable_raw_mode().ok();

    match choice {
        Some(idx) => {
            info!(options[idx]);
            Ok(Some(valid_chars[idx]))
        }
        None => {
            info!();
            Ok(None)
        }
    }
}

/// edit a single line in place; `None` on ctrl-c or ctrl-d
pub fn edit_one_line(line: &str) -> Result<Option<String>> {
    use rustyline::DefaultEditor;
    use rustyline::error::ReadlineError;

    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;
    match editor.readline_with_initial("? ", (line, "")) {
        Ok(edited) => Ok(Some(edited.trim().to_string())),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e).context("failed to read message"),
    }
}

/// edit text in `$EDITOR`; `None` when the editor fails
pub fn edit_multi_line(editor: &str, text: &str) -> Result<Option<String>> {
    use std::fs;
    use std::io::Write;
    use std::process::Command;
    use tempfile::Builder;

    let mut temp_file = Builder::new()
        .prefix("gita-message-")
        .suffix(".txt")
        .tempfile()
        .context("failed to create temporary file")?;
    temp_file
        .write_all(text.as_bytes())
        .context("failed to write to temporary file")?;
    temp_file
        .flush()
        .context("failed to flush temporary file")?;
    let temp_path = temp_file.path().to_owned();

    // run the editor via shell to properly handle arguments in EDITOR
    let quoted = shlex::try_quote(&temp_path.to_string_lossy())
        .context("temporary path cannot be quoted")?
        .into_owned();
    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{editor} {quoted}"))
        .status()
        .with_context(|| format!("failed to run editor: {editor}"))?;

    if !status.success() {
        return Ok(None);
    }

    let edited = fs::read_to_string(&temp_path).context("failed to read edited message")?;
    Ok(Some(edited.trim().to_string()))
}

pub fn clear_screen() -> Result<()> {
    use crossterm::{cursor::MoveTo, execute, terminal::Clear, terminal::ClearType};
    execute!(std::io::stdout(), Clear(ClearType::All), MoveTo(0, 0))
        .context("failed to clear the terminal")
}

/// shorten a path from the left so the file name stays visible
fn fit_path(path: &str, width: usize) -> String {
    let count = path.chars().count();
    if count <= width {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (width - 1)).collect();
    format!("…{tail}")
}

fn flag(value: bool) -> colored::ColoredString {
    use colored::Colorize;
    if value { "yes".green() } else { "no".dimmed() }
}

/// the staging table
pub fn render_table(store: &StagingArea) {
    use colored::Colorize;
    use num_format::{Locale, ToFormattedString};

    if store.is_empty() {
        info!("no changed files");
        return;
    }

    info!(
        "{}",
        format!(
            "{:<6} {:<10} {:<5} {:<9} {:<6} {:>8}  {}",
            "File #", "Status", "Ready", "Committed", "Pushed", "Diff", "File"
        )
        .bold()
    );
    info!("{}", "-".repeat(80));

    for (index, record) in store.indexed() {
        info!(
            "{:<6} {:<10} {:<5} {:<9} {:<6} {:>8}  {}",
            format!("f{index}"),
            record.status(),
            flag(record.is_ready()),
            flag(record.is_committed()),
            flag(record.is_pushed()),
            record.diff().len().to_formatted_string(&Locale::en),
            fit_path(record.path(), MAX_PATH_COLUMN)
        );
    }

    info!();
    info!(
        "{} of {} file(s) committed",
        store.committed_count(),
        store.len()
    );
}

/// a commit message, highlighting subject characters past the limit in red
pub fn render_text(message: &str) {
    use colored::Colorize;
    use std::io::{self, Write};

    let mut lines = message.lines();
    if let Some(subject) = lines.next() {
        match subject.char_indices().nth(MAX_SUBJECT_LENGTH) {
            Some((cut, _)) => {
                let (first_part, rest) = subject.split_at(cut);
                let _ = writeln!(io::stdout(), "{first_part}{}", rest.red());
            }
            None => {
                let _ = writeln!(io::stdout(), "{subject}");
            }
        }
    }
    for line in lines {
        let _ = writeln!(io::stdout(), "{line}");
    }
}

/// one record's message under a header naming the file
pub fn render_message(index: usize, record: &FileRecord) {
    use colored::Colorize;

    let committed = if record.is_committed() { " (committed)" } else { "" };
    info!(
        "{} {}{committed}",
        format!("f{index} {} {}", record.status().code(), record.name()).green(),
        record.path().dimmed()
    );
    render_text(record.message());
    info!();
}
