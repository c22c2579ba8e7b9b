//! Locating one command's output inside a transcript.
//!
//! Strategies are tried in order until one isolates the section:
//! 1. the `-- <command>` banner closed by a [`SECTION_RULE`] line
//! 2. the report's column-header line
//! 3. the engine monitor's begin/end markers (engine status only)
//!
//! When none applies the whole transcript is passed through, flagged as
//! [`SectionSource::Passthrough`].

use crate::command::{CommandKind, DiagnosticCommand, ReportShape};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Width of the banner rules
pub const RULE_WIDTH: usize = 60;

/// Rule wrapping each command block
pub const SECTION_RULE: &str = "============================================================";

/// Rule wrapping the transcript header and trailer
pub const HEADER_RULE: &str = "############################################################";

const MONITOR_BEGIN: &str = "INNODB MONITOR OUTPUT";
const MONITOR_END: &str = "END OF INNODB MONITOR OUTPUT";

/// Which strategy isolated a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionSource {
    Banner,
    HeaderLine,
    MonitorMarkers,
    /// Nothing matched; the body is the full transcript
    Passthrough,
}

/// A command's output, borrowed from the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    pub source: SectionSource,
    pub body: &'a str,
}

impl Section<'_> {
    /// Whether a strategy actually located the section
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.source != SectionSource::Passthrough
    }
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Banner,
    HeaderLine,
    MonitorMarkers,
}

impl Strategy {
    fn source(self) -> SectionSource {
        match self {
            Strategy::Banner => SectionSource::Banner,
            Strategy::HeaderLine => SectionSource::HeaderLine,
            Strategy::MonitorMarkers => SectionSource::MonitorMarkers,
        }
    }

    fn apply<'a>(self, text: &'a str, command: &DiagnosticCommand) -> Option<&'a str> {
        match self {
            Strategy::Banner => find_banner_body(text, command.sql),
            Strategy::HeaderLine => find_header_body(text, command.header_prefixes),
            Strategy::MonitorMarkers => find_monitor_output(text),
        }
    }
}

fn strategies(command: &DiagnosticCommand) -> &'static [Strategy] {
    match command.shape {
        ReportShape::FreeForm => &[
            Strategy::Banner,
            Strategy::HeaderLine,
            Strategy::MonitorMarkers,
        ],
        _ if command.header_prefixes.is_empty() => &[Strategy::Banner],
        _ => &[Strategy::Banner, Strategy::HeaderLine],
    }
}

/// Isolate the output of `kind` within `transcript`. Never fails.
#[must_use]
pub fn extract_section(transcript: &str, kind: CommandKind) -> Section<'_> {
    let command = kind.descriptor();
    for strategy in strategies(command) {
        if let Some(body) = strategy.apply(transcript, command) {
            return Section {
                source: strategy.source(),
                body,
            };
        }
    }

    debug!(command = %kind, "section not found, using full transcript");
    Section {
        source: SectionSource::Passthrough,
        body: transcript,
    }
}

/// Lines with their byte offsets; each line keeps its terminator.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line)
    })
}

fn is_block_boundary(line: &str) -> bool {
    line.starts_with(SECTION_RULE) || line.starts_with(HEADER_RULE)
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.is_char_boundary(prefix.len())
        && line[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Offset of the first block boundary in `text` at or after line `skip`.
fn boundary_after(text: &str, skip: usize) -> usize {
    lines_with_offsets(text)
        .skip(skip)
        .find(|(_, line)| is_block_boundary(line))
        .map_or(text.len(), |(start, _)| start)
}

fn find_banner_body<'a>(text: &'a str, sql: &str) -> Option<&'a str> {
    let marker = format!("-- {sql}");
    let mut lines = lines_with_offsets(text);

    lines
        .by_ref()
        .find(|(_, line)| starts_with_ignore_case(line.trim_end(), &marker))?;
    let (rule_start, rule) = lines
        .by_ref()
        .find(|(_, line)| line.starts_with(SECTION_RULE))?;

    let body_start = rule_start + rule.len();
    let rest = &text[body_start..];
    let body_end = boundary_after(rest, 0);
    Some(rest[..body_end].trim())
}

fn find_header_body<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    if prefixes.is_empty() {
        return None;
    }
    let (start, _) = lines_with_offsets(text)
        .find(|(_, line)| prefixes.iter().any(|p| line.starts_with(p)))?;

    let rest = &text[start..];
    let end = boundary_after(rest, 1);
    Some(rest[..end].trim())
}

fn find_monitor_output(text: &str) -> Option<&str> {
    let begin = text.find(MONITOR_BEGIN)?;
    let end = begin + text[begin..].find(MONITOR_END)? + MONITOR_END.len();
    let line_start = text[..begin].rfind('\n').map_or(0, |i| i + 1);
    Some(text[line_start..end].trim())
}
