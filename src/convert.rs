use std::sync::LazyLock;

use regex::Regex;

use crate::error::SlurmError;
use crate::options::SlurmOptions;

/// Shebang emitted at the top of every rendered script.
pub const SHEBANG: &str = "#!/bin/bash";

static LONG_DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#SBATCH\s+--([A-Za-z][A-Za-z0-9_-]*)=(.*)$").unwrap());
static SHORT_DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#SBATCH\s+-([A-Za-z])\s+(\S+)\s*$").unwrap());
static DIRECTIVE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap());

/// Long names for the short sbatch flags we recognize. Anything else keeps
/// its single-letter name as an extension directive.
fn long_name(short: char) -> Option<&'static str> {
    match short {
        'p' => Some("partition"),
        't' => Some("time"),
        'N' => Some("nodes"),
        'n' => Some("ntasks"),
        'c' => Some("cpus-per-task"),
        'J' => Some("job-name"),
        'o' => Some("output"),
        'e' => Some("error"),
        _ => None,
    }
}

/// The executable part of a script: ordered source lines with the shebang
/// and any directive block stripped.
///
/// Leading blank lines are dropped at construction so that a rendered
/// script parses back to the identical body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptBody {
    lines: Vec<String>,
}

impl ScriptBody {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(Into::into)
            .skip_while(|l| l.trim().is_empty())
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Emit the body as a plain bash script, shebang included and all
    /// scheduler directives gone.
    pub fn to_bash(&self) -> String {
        let mut out = String::from(SHEBANG);
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Render a body and an options set into sbatch-compliant script text.
///
/// The output format is a byte-exact contract: shebang, one
/// `#SBATCH --<name>=<value>` line per directive in canonical order, a blank
/// separator, then the body verbatim. Fails only if the options or body are
/// structurally unfit for the line-oriented format (embedded newlines, a
/// directive name the grammar cannot express).
pub fn render(body: &ScriptBody, options: &SlurmOptions) -> Result<String, SlurmError> {
    let mut out = String::from(SHEBANG);
    out.push('\n');
    for (name, value) in options.pairs() {
        if !DIRECTIVE_NAME_RE.is_match(name) {
            return Err(SlurmError::Render(format!(
                "directive name {name:?} cannot be expressed as an #SBATCH line"
            )));
        }
        if value.contains('\n') {
            return Err(SlurmError::Render(format!(
                "value of directive --{name} contains a newline"
            )));
        }
        out.push_str(&format!("#SBATCH --{name}={value}\n"));
    }
    out.push('\n');
    for line in body.lines() {
        if line.contains('\n') {
            return Err(SlurmError::Render("body line contains a newline".into()));
        }
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Parse scheduler script text into its body and directive set.
///
/// Strips the shebang if present, collects every leading `#SBATCH` line into
/// directive pairs (short flags normalized to their long names), and treats
/// everything from the first non-directive, non-blank line onward as body.
/// `#SBATCH` lines after the body has started are ordinary body lines.
pub fn parse(text: &str) -> Result<(ScriptBody, SlurmOptions), SlurmError> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut body_start = lines.len();
    let mut iter = lines.iter().enumerate();

    if lines.first().is_some_and(|l| l.starts_with("#!")) {
        iter.next();
    }

    for (idx, line) in iter {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#SBATCH") {
            if let Some(caps) = LONG_DIRECTIVE_RE.captures(line) {
                pairs.push((caps[1].to_string(), caps[2].to_string()));
            } else if let Some(caps) = SHORT_DIRECTIVE_RE.captures(line) {
                let short = caps[1].chars().next().unwrap();
                let name = long_name(short).map_or_else(|| short.to_string(), String::from);
                pairs.push((name, caps[2].to_string()));
            } else {
                return Err(SlurmError::parse(
                    idx + 1,
                    format!("unrecognized directive syntax: #SBATCH{rest}"),
                ));
            }
        } else {
            body_start = idx;
            break;
        }
    }

    let options = SlurmOptions::from_pairs(pairs)?;
    let body = ScriptBody::from_lines(lines.drain(body_start.min(lines.len())..));
    Ok((body, options))
}
