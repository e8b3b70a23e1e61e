//! Line protocol spoken to the dashboard host, plus inline markup helpers.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Warn => "warn",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionFlags {
    pub sudo: bool,
    pub danger: bool,
    pub refresh: bool,
}

impl ActionFlags {
    pub const NONE: Self = Self {
        sudo: false,
        danger: false,
        refresh: false,
    };
    pub const PRIVILEGED: Self = Self {
        sudo: true,
        danger: false,
        refresh: true,
    };
    pub const DESTRUCTIVE: Self = Self {
        sudo: true,
        danger: true,
        refresh: true,
    };

    fn names(self) -> Vec<&'static str> {
        [
            (self.sudo, "sudo"),
            (self.danger, "danger"),
            (self.refresh, "refresh"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub flags: ActionFlags,
    pub label: String,
    pub command: String,
}

impl Action {
    pub fn new(flags: ActionFlags, label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            flags,
            label: label.into(),
            command: command.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Title(String),
    Refresh(u64),
    Row(String),
    Table(Vec<String>),
    TableRow(Vec<String>),
    Action(Action),
}

impl Line {
    pub fn row(text: impl Into<String>) -> Self {
        Line::Row(text.into())
    }

    pub fn blank() -> Self {
        Line::Row(String::new())
    }

    pub fn table<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Line::Table(columns.into_iter().map(Into::into).collect())
    }

    pub fn table_row<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Line::TableRow(cells.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Title(title) => write!(f, "title: {title}"),
            Line::Refresh(secs) => write!(f, "refresh: {secs}"),
            Line::Row(text) => write!(f, "row: {text}"),
            Line::Table(columns) => write!(f, "[table:{}]", columns.join("|")),
            Line::TableRow(cells) => write!(f, "[tablerow:{}]", cells.join("|")),
            Line::Action(action) => {
                let flags = action.flags.names();
                if flags.is_empty() {
                    write!(f, "action: {}:{}", action.label, action.command)
                } else {
                    write!(
                        f,
                        "action: [{}] {}:{}",
                        flags.join(","),
                        action.label,
                        action.command
                    )
                }
            }
        }
    }
}

// Inline markup.

pub fn status(s: Status) -> String {
    format!("[status:{s}]")
}

pub fn progress(percent: u64) -> String {
    format!("[progress:{percent}]")
}

pub fn mini_progress(percent: u64, width: u32) -> String {
    format!("[miniprogress:{percent}:{width}]")
}

pub fn sparkline(values: impl fmt::Display, color: &str) -> String {
    format!("[sparkline:{values}:{color}]")
}

pub fn graph(values: impl fmt::Display, color: &str, label: &str) -> String {
    format!("[graph:{values}:{color}:{label}]")
}

pub fn bold(text: &str) -> String {
    format!("[bold]{text}[/]")
}

pub fn grey(text: &str) -> String {
    format!("[grey70]{text}[/]")
}

pub fn divider() -> String {
    "[divider]".to_string()
}

pub fn divider_styled(ch: char, color: &str) -> String {
    format!("[divider:{ch}:{color}]")
}
