//! Process listing and termination through `tasklist` / `taskkill`.

use crate::runner::CommandRunner;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::time::Duration;

/// A running process as reported by `tasklist /v`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: u32,
    /// Main window title, `N/A` when the process has none.
    pub title: String,
}

/// Splits one line of `tasklist /fo csv` output. Fields are always quoted.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parses `tasklist /v /fo csv /nh` output. The window title is the last
/// column.
pub(crate) fn parse_tasklist(output: &str) -> Vec<ProcessInfo> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let fields = split_csv_line(line);
            if fields.len() < 3 {
                return None;
            }
            Some(ProcessInfo {
                name: fields[0].clone(),
                pid: fields[1].parse().ok()?,
                title: fields.last().cloned().unwrap_or_default(),
            })
        })
        .collect()
}

pub(crate) async fn list(runner: &dyn CommandRunner, limit: Duration) -> Result<Vec<ProcessInfo>> {
    let args: Vec<String> = ["/v", "/fo", "csv", "/nh"].into_iter().map(String::from).collect();
    let program = OsStr::new("tasklist");
    let output = runner.run(program, &args, limit).await?.into_success(program)?;
    Ok(parse_tasklist(&output.stdout))
}

pub(crate) async fn kill(runner: &dyn CommandRunner, pid: u32, limit: Duration) -> Result<()> {
    let args = vec!["/F".to_string(), "/PID".to_string(), pid.to_string()];
    let program = OsStr::new("taskkill");
    runner.run(program, &args, limit).await?.into_success(program)?;
    Ok(())
}

/// `xde.exe` processes whose window title is `name`, ignoring case.
pub(crate) fn emulator_processes<'a>(
    processes: &'a [ProcessInfo],
    name: &'a str,
) -> impl Iterator<Item = &'a ProcessInfo> + 'a {
    processes.iter().filter(move |p| {
        p.name.eq_ignore_ascii_case("xde.exe") && p.title.eq_ignore_ascii_case(name)
    })
}
