//! Report rendering for boardsync commands.
//!
//! Each command builds a serializable report for `--json` and a
//! [`HumanReport`] for the terminal. Failures go through [`emit_error`] so
//! both modes carry the exit code.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "boardsync.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Terminal rendering of one command's result
///
/// Renders as the title, indented `name: value` fields, indented body
/// lines, then `warning:` and `hint:` lines.
#[derive(Debug, Clone, Default)]
pub struct HumanReport {
    title: String,
    fields: Vec<(String, String)>,
    lines: Vec<String>,
    warnings: Vec<String>,
    hint: Option<String>,
}

impl HumanReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn field(&mut self, name: impl Into<String>, value: impl ToString) -> &mut Self {
        self.fields.push((name.into(), value.to_string()));
        self
    }

    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(text.into());
        self
    }

    pub fn warn(&mut self, text: impl Into<String>) -> &mut Self {
        self.warnings.push(text.into());
        self
    }

    /// Suggested follow-up command; the last one set wins
    pub fn hint(&mut self, text: impl Into<String>) -> &mut Self {
        self.hint = Some(text.into());
        self
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn render(&self) -> String {
        let mut out = vec![self.title.clone()];
        out.extend(self.fields.iter().map(|(name, value)| format!("  {name}: {value}")));
        if !self.lines.is_empty() {
            out.push(String::new());
            out.extend(self.lines.iter().map(|line| format!("  {line}")));
        }
        if !self.warnings.is_empty() || self.hint.is_some() {
            out.push(String::new());
        }
        out.extend(self.warnings.iter().map(|warning| format!("warning: {warning}")));
        if let Some(hint) = &self.hint {
            out.push(format!("hint: {hint}"));
        }
        out.join("\n")
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct Success<'a, T: Serialize> {
    data: &'a T,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
}

#[derive(Serialize)]
struct Failure {
    error: JsonError,
}

/// Print a command's report: the JSON envelope, or the human rendering
/// unless `--quiet`.
pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: &HumanReport,
) -> Result<()> {
    if options.json {
        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            body: Success {
                data,
                warnings: human.warnings(),
            },
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !options.quiet {
        println!("{}", human.render());
    }
    Ok(())
}

/// Report a failed command on stdout (JSON) or stderr (human)
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    if json {
        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            body: Failure {
                error: JsonError::from(err),
            },
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = err.hint() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_come_before_body_and_warnings() {
        let mut human = HumanReport::new("boardsync show: tasks?workspace=ws1");
        human
            .field("tasks", 3)
            .line("T1: t1, t2")
            .warn("could not save order");

        let text = human.render();
        let field = text.find("  tasks: 3").unwrap();
        let body = text.find("  T1: t1, t2").unwrap();
        let warning = text.find("warning: could not save order").unwrap();
        assert!(field < body && body < warning);
        assert!(!text.contains("hint:"));
    }

    #[test]
    fn error_envelope_carries_kind_and_hint() {
        let err = Error::InvalidScope("boards".to_string());
        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command: "show",
            status: "error",
            body: Failure {
                error: JsonError::from(&err),
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["kind"], "invalid_scope");
        assert_eq!(value["error"]["code"], 2);
        assert!(value["error"]["hint"].as_str().unwrap().contains("workspace="));
    }
}
