use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
disp                      show the staging table
disp a | f<N>             show every message, or file N's message
redo cmg f<N>             regenerate file N's message
redo cmo f<N>             write file N's message yourself
commit a | f<N> [f<M>..]  commit every file, or the listed files
uncommit a | f<N> [..]    uncommit every file, or the listed files
ready | unready f<N> [..] include or exclude files from commits
push                      not available yet
clear                     clear the screen
exit                      unstage everything and quit";

/// which files a command addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Files(Vec<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    Table,
    AllMessages,
    File(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedoMode {
    /// regenerate with the creative setting and confirm
    Generate,
    /// operator supplies the text
    Manual,
}

/// one parsed line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Display(DisplayTarget),
    Redo { mode: RedoMode, index: usize },
    Commit(Selection),
    Uncommit(Selection),
    Ready { ready: bool, selection: Selection },
    Push,
    Clear,
    Help,
    Exit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    #[error("unbalanced quotes in input")]
    Unbalanced,

    #[error("undefined command `{0}` (type `help` for a list)")]
    Undefined(String),

    #[error("unrecognized options for `{command}`: {options}")]
    UnrecognizedOptions { command: String, options: String },
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens = shlex::split(line).ok_or(ParseError::Unbalanced)?;
        let Some((word, rest)) = tokens.split_first() else {
            return Err(ParseError::Empty);
        };

        let word = word.to_lowercase();
        let args: Vec<String> = rest
            .iter()
            .map(|t| t.trim_start_matches('-').to_lowercase())
            .collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let unrecognized = || ParseError::UnrecognizedOptions {
            command: word.clone(),
            options: if rest.is_empty() {
                "(none)".to_string()
            } else {
                rest.join(" ")
            },
        };

        match word.as_str() {
            "disp" => match args.as_slice() {
                [] => Ok(Self::Display(DisplayTarget::Table)),
                ["a"] => Ok(Self::Display(DisplayTarget::AllMessages)),
                [file] => file_index(file)
                    .map(|i| Self::Display(DisplayTarget::File(i)))
                    .ok_or_else(unrecognized),
                _ => Err(unrecognized()),
            },
            "redo" => match args.as_slice() {
                [mode, file] => {
                    let mode = match *mode {
                        "cmg" => RedoMode::Generate,
                        "cmo" => RedoMode::Manual,
                        _ => return Err(unrecognized()),
                    };
                    let index = file_index(file).ok_or_else(unrecognized)?;
                    Ok(Self::Redo { mode, index })
                }
                _ => Err(unrecognized()),
            },
            "commit" => selection(&args).map(Self::Commit).ok_or_else(unrecognized),
            "uncommit" => selection(&args).map(Self::Uncommit).ok_or_else(unrecognized),
            "ready" | "unready" => selection(&args)
                .map(|selection| Self::Ready {
                    ready: word == "ready",
                    selection,
                })
                .ok_or_else(unrecognized),
            "push" | "clear" | "help" | "exit" if !args.is_empty() => Err(unrecognized()),
            "push" => Ok(Self::Push),
            "clear" => Ok(Self::Clear),
            "help" => Ok(Self::Help),
            "exit" => Ok(Self::Exit),
            _ => Err(ParseError::Undefined(word.clone())),
        }
    }
}

/// `f<N>` to N
fn file_index(token: &str) -> Option<usize> {
    let digits = token.strip_prefix('f')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `a` or one or more `f<N>`
fn selection(args: &[&str]) -> Option<Selection> {
    match args {
        [] => None,
        ["a"] => Some(Selection::All),
        files => files
            .iter()
            .map(|f| file_index(f))
            .collect::<Option<Vec<_>>>()
            .map(Selection::Files),
    }
}
