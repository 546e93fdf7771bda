//! Line relay for child process output.
//!
//! The visualization tool is chatty: request logs, debug lines and blank
//! lines would otherwise interleave with the console. Each relayed child gets
//! its own thread that reads merged output line by line, drops noise and
//! prints the rest with a `[label]` prefix.

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::OnceLock;
use std::thread::JoinHandle;

use regex::Regex;

use crate::logger::format_line;

/// Filter rule for relayed output.
///
/// Used to reduce noise by skipping known log prefixes.
#[derive(Debug, Clone, Default)]
pub struct FilterRule {
    /// Prefixes to skip when relaying output.
    skip_prefixes: Vec<String>,
}

impl FilterRule {
    /// Create a new filter rule.
    pub fn new<I, S>(skip_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip_prefixes: skip_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a line should be skipped.
    ///
    /// Matching ignores ANSI color codes and surrounding whitespace; blank
    /// lines are always skipped.
    pub fn should_skip(&self, line: &str) -> bool {
        let plain = strip_ansi(line);
        let trimmed = plain.trim();
        trimmed.is_empty() || self.skip_prefixes.iter().any(|p| trimmed.starts_with(p.as_str()))
    }
}

/// Copy lines from `reader` to `writer`, dropping filtered ones.
///
/// Stops at EOF or on the first read error. Returns the number of lines
/// written.
pub fn relay_lines<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    filter: &FilterRule,
    label: &str,
) -> usize {
    let mut relayed = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                crate::log!("error"; "{} output relay stopped: {}", label, e);
                break;
            }
        };

        if filter.should_skip(&line) {
            continue;
        }

        let formatted = format!("{}\n", format_line(label, &line));
        if writer.write_all(formatted.as_bytes()).is_err() {
            break;
        }
        writer.flush().ok();
        relayed += 1;
    }

    relayed
}

/// Background relay of one child's output to stdout.
pub struct OutputRelay;

impl OutputRelay {
    /// Start relaying `reader` on a dedicated thread.
    ///
    /// The thread ends when the child closes its end of the pipe.
    pub fn spawn<R>(label: String, reader: R, filter: FilterRule) -> io::Result<JoinHandle<usize>>
    where
        R: Read + Send + 'static,
    {
        std::thread::Builder::new()
            .name(format!("relay-{label}"))
            .spawn(move || {
                let relayed = relay_lines(BufReader::new(reader), &mut io::stdout(), &filter, &label);
                crate::debug!(&label; "output closed after {} lines", relayed);
                relayed
            })
    }
}

/// Strip ANSI escape codes from string.
fn strip_ansi(s: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());
    re.replace_all(s, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_filter_rule() {
        let filter = FilterRule::new(["DEBUG:", "INFO: [ocp_vscode]"]);
        assert!(filter.should_skip("DEBUG: something"));
        assert!(filter.should_skip("  INFO: [ocp_vscode] listening"));
        assert!(!filter.should_skip("ERROR: something"));
        assert!(filter.should_skip(""));
        assert!(filter.should_skip("   "));
    }

    #[test]
    fn test_prefix_not_substring() {
        let filter = FilterRule::new(["DEBUG:"]);
        assert!(!filter.should_skip("value DEBUG: not at start"));
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");

        let filter = FilterRule::new(["DEBUG:"]);
        assert!(filter.should_skip("\x1b[2mDEBUG:\x1b[0m dimmed"));
    }

    #[test]
    fn test_relay_drops_noise() {
        let input = "DEBUG: x\nResult: 42\n127.0.0.1 - - GET /\n\n";
        let filter = FilterRule::new(["DEBUG:", "127.0.0.1"]);
        let mut out = Vec::new();

        let relayed = relay_lines(Cursor::new(input), &mut out, &filter, "viewer");

        let out = String::from_utf8(out).unwrap();
        assert_eq!(relayed, 1);
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("Result: 42"));
        assert!(out.contains("viewer"));
    }

    #[test]
    fn test_relay_stops_on_invalid_utf8() {
        let input: &[u8] = b"first\n\xff\xfe\nnever\n";
        let mut out = Vec::new();

        let relayed = relay_lines(input, &mut out, &FilterRule::default(), "viewer");

        assert_eq!(relayed, 1);
    }

    #[test]
    fn test_spawned_relay_finishes_at_eof() {
        let handle =
            OutputRelay::spawn("viewer".into(), Cursor::new("a\nb\n"), FilterRule::default())
                .unwrap();
        assert_eq!(handle.join().unwrap(), 2);
    }
}
