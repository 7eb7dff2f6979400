//! Dialect Checks
//!
//! Line-level checks of generated G-code against the small command set the
//! writer produces. Findings are diagnostics, never hard failures.

use serde::Serialize;

use crate::parser::{Command, ParsedLine};

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A diagnostic message for one line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
    pub severity: Severity,
}

/// Diagnostics collected over a block of G-code
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, line: usize, severity: Severity, message: String) {
        self.diagnostics.push(Diagnostic {
            line,
            message,
            severity,
        });
    }

    pub fn add_error(&mut self, line: usize, message: String) {
        self.add(line, Severity::Error, message);
    }

    pub fn add_warning(&mut self, line: usize, message: String) {
        self.add(line, Severity::Warning, message);
    }

    pub fn add_info(&mut self, line: usize, message: String) {
        self.add(line, Severity::Info, message);
    }

    /// No error-level diagnostics
    pub fn is_valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

const MOVE_WORDS: &[char] = &['X', 'Y', 'Z', 'E', 'F'];
const DWELL_WORDS: &[char] = &['S', 'P'];
const S_ONLY: &[char] = &['S'];
const E_ONLY: &[char] = &['E'];
const NO_WORDS: &[char] = &[];

/// Parameter letters accepted by each command of the dialect
fn allowed_parameters(name: &str) -> Option<&'static [char]> {
    match name {
        "G0" | "G1" => Some(MOVE_WORDS),
        "G4" => Some(DWELL_WORDS),
        "G92" | "M907" => Some(E_ONLY),
        "M104" | "M109" | "M220" => Some(S_ONLY),
        _ if name
            .strip_prefix('T')
            .is_some_and(|n| n.parse::<u32>().is_ok()) =>
        {
            Some(NO_WORDS)
        }
        _ => None,
    }
}

/// Check a single line in isolation
pub fn check_line(line_num: usize, parsed: &ParsedLine) -> CheckResult {
    let mut result = CheckResult::new();
    if let ParsedLine::Command(cmd) = parsed {
        check_command(line_num, cmd, &mut result);
    }
    result
}

fn check_command(line_num: usize, cmd: &Command, result: &mut CheckResult) {
    for word in &cmd.malformed {
        result.add_error(
            line_num,
            format!("Malformed word '{}' in command '{}'", word, cmd.name),
        );
    }

    let Some(allowed) = allowed_parameters(&cmd.name) else {
        result.add_warning(line_num, format!("Unknown command '{}'", cmd.name));
        return;
    };

    if cmd.is_move() && cmd.parameters.is_empty() {
        result.add_error(
            line_num,
            format!("Movement command '{}' has no parameters", cmd.name),
        );
    }

    for parameter in &cmd.parameters {
        if !allowed.contains(&parameter.letter) {
            result.add_warning(
                line_num,
                format!(
                    "Unknown parameter '{}' for command '{}'",
                    parameter.letter, cmd.name
                ),
            );
        }
        if !parameter.value.is_finite() {
            result.add_error(
                line_num,
                format!("Non-finite value for '{}'", parameter.letter),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn check(line: &str) -> CheckResult {
        check_line(1, &parse_line(line))
    }

    #[test]
    fn result_validity() {
        let mut result = CheckResult::new();
        assert!(result.is_valid());

        result.add_warning(1, "warning".to_string());
        result.add_info(1, "info".to_string());
        assert!(result.is_valid());

        result.add_error(2, "error".to_string());
        assert!(!result.is_valid());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn dialect_lines_are_clean() {
        for line in [
            "G1 X1.000 Y2.000 E0.1000 F3000",
            "G1 Z0.700",
            "G4 S0",
            "G92 E0.0",
            "M109 S250",
            "M220 S80",
            "M907 E750",
            "T3",
            "; CP TOOLCHANGE WIPE",
            "",
        ] {
            assert!(check(line).diagnostics.is_empty(), "{line}");
        }
    }

    #[test]
    fn empty_move_is_error() {
        let result = check("G1");
        assert!(!result.is_valid());
        assert!(result.diagnostics[0].message.contains("no parameters"));
    }

    #[test]
    fn unknown_command_and_parameter() {
        assert_eq!(check("M600").count(Severity::Warning), 1);
        assert_eq!(check("G92 X0").count(Severity::Warning), 1);
    }

    #[test]
    fn malformed_word_is_error() {
        assert!(!check("G1 X1..0").is_valid());
    }
}
