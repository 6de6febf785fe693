use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SlurmError;

/// Recognized directives, in the canonical order they are rendered.
///
/// Everything else a caller supplies is carried verbatim as an extension
/// directive so that unknown options survive a render → parse round trip.
pub const KNOWN_DIRECTIVES: [&str; 11] = [
    "partition",
    "time",
    "nodes",
    "ntasks",
    "ntasks-per-node",
    "cpus-per-task",
    "mem",
    "gres",
    "job-name",
    "output",
    "error",
];

// Format checks for recognized directive values.
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}-)?\d{1,2}:\d{2}:\d{2}$").unwrap());
static MEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[KMGT]?$").unwrap());
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\S+$").unwrap());

/// A validated, ordered collection of SLURM directives.
///
/// Recognized directives are format-checked at construction; unrecognized
/// ones are accepted verbatim for forward compatibility. Instances are
/// immutable — every "update" ([`with`](SlurmOptions::with),
/// [`without`](SlurmOptions::without)) produces a new instance, so the same
/// options value can be shared across scripts without aliasing surprises.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "RawOptions")]
pub struct SlurmOptions {
    partition: Option<String>,
    time: Option<String>,
    nodes: Option<String>,
    ntasks: Option<String>,
    ntasks_per_node: Option<String>,
    cpus_per_task: Option<String>,
    mem: Option<String>,
    gres: Option<String>,
    job_name: Option<String>,
    output: Option<String>,
    error: Option<String>,
    /// Unrecognized directives in first-seen order.
    extensions: Vec<(String, String)>,
}

/// Deserialization intermediate; converting into [`SlurmOptions`] runs the
/// same format checks as construction, so a deserialized options set is
/// always validated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct RawOptions {
    partition: Option<String>,
    time: Option<String>,
    nodes: Option<String>,
    ntasks: Option<String>,
    ntasks_per_node: Option<String>,
    cpus_per_task: Option<String>,
    mem: Option<String>,
    gres: Option<String>,
    job_name: Option<String>,
    output: Option<String>,
    error: Option<String>,
    extensions: Vec<(String, String)>,
}

impl TryFrom<RawOptions> for SlurmOptions {
    type Error = SlurmError;

    fn try_from(raw: RawOptions) -> Result<Self, SlurmError> {
        let known = [
            ("partition", raw.partition),
            ("time", raw.time),
            ("nodes", raw.nodes),
            ("ntasks", raw.ntasks),
            ("ntasks-per-node", raw.ntasks_per_node),
            ("cpus-per-task", raw.cpus_per_task),
            ("mem", raw.mem),
            ("gres", raw.gres),
            ("job-name", raw.job_name),
            ("output", raw.output),
            ("error", raw.error),
        ];
        let set = known
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .chain(raw.extensions);
        SlurmOptions::from_pairs(set)
    }
}

/// Map underscored spellings to the hyphenated SLURM form.
fn canonical_name(name: &str) -> String {
    name.replace('_', "-")
}

fn is_known(name: &str) -> bool {
    KNOWN_DIRECTIVES.contains(&name)
}

/// Check a recognized directive value against its format constraint.
fn validate(name: &str, value: &str) -> Result<(), SlurmError> {
    let (re, expected): (&Regex, &str) = match name {
        "time" => (&TIME_RE, "expected [DD-]HH:MM:SS"),
        "mem" => (&MEM_RE, "expected <integer>[K|M|G|T]"),
        "nodes" | "ntasks" | "ntasks-per-node" | "cpus-per-task" => {
            (&COUNT_RE, "expected a decimal integer")
        }
        _ => (&TOKEN_RE, "expected a non-empty value without whitespace"),
    };
    if re.is_match(value) {
        Ok(())
    } else {
        Err(SlurmError::validation(name, value, expected))
    }
}

impl SlurmOptions {
    /// An options set with no directives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an options set from (name, value) pairs.
    ///
    /// Recognized names (hyphenated or underscored spelling) are validated;
    /// the first recognized directive with a malformed value rejects the
    /// whole construction. Unrecognized names are accepted verbatim.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, SlurmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::new();
        for (name, value) in pairs {
            options = options.with(name.as_ref(), value.as_ref())?;
        }
        Ok(options)
    }

    /// Return a new instance with the directive set, validating recognized
    /// names. The receiver is left untouched.
    pub fn with(&self, name: &str, value: &str) -> Result<Self, SlurmError> {
        let name = canonical_name(name);
        let mut next = self.clone();
        if is_known(&name) {
            validate(&name, value)?;
            *next.known_mut(&name) = Some(value.to_string());
        } else if let Some(entry) = next.extensions.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value.to_string();
        } else {
            next.extensions.push((name, value.to_string()));
        }
        Ok(next)
    }

    /// Return a new instance without the named directive.
    pub fn without(&self, name: &str) -> Self {
        let name = canonical_name(name);
        let mut next = self.clone();
        if is_known(&name) {
            *next.known_mut(&name) = None;
        } else {
            next.extensions.retain(|(n, _)| *n != name);
        }
        next
    }

    /// Look up a directive value by name (either spelling).
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = canonical_name(name);
        if is_known(&name) {
            self.known(&name).as_deref()
        } else {
            self.extensions
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Ordered enumeration of all set directives: recognized directives in
    /// canonical order first, then extensions in first-seen order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for name in KNOWN_DIRECTIVES {
            if let Some(value) = self.known(name) {
                out.push((name, value.as_str()));
            }
        }
        for (name, value) in &self.extensions {
            out.push((name.as_str(), value.as_str()));
        }
        out
    }

    /// True if no directive is set.
    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }

    /// Merge with a fallback set: directives set on `self` win, directives
    /// only present in `defaults` are filled in.
    ///
    /// Both sides were validated at construction, so no re-validation runs.
    pub fn or_defaults(&self, defaults: &SlurmOptions) -> SlurmOptions {
        let mut merged = self.clone();
        for (name, value) in defaults.pairs() {
            if merged.get(name).is_none() {
                if is_known(name) {
                    *merged.known_mut(name) = Some(value.to_string());
                } else {
                    merged.extensions.push((name.to_string(), value.to_string()));
                }
            }
        }
        merged
    }

    fn known(&self, name: &str) -> &Option<String> {
        match name {
            "partition" => &self.partition,
            "time" => &self.time,
            "nodes" => &self.nodes,
            "ntasks" => &self.ntasks,
            "ntasks-per-node" => &self.ntasks_per_node,
            "cpus-per-task" => &self.cpus_per_task,
            "mem" => &self.mem,
            "gres" => &self.gres,
            "job-name" => &self.job_name,
            "output" => &self.output,
            "error" => &self.error,
            other => unreachable!("not a known directive: {other}"),
        }
    }

    fn known_mut(&mut self, name: &str) -> &mut Option<String> {
        match name {
            "partition" => &mut self.partition,
            "time" => &mut self.time,
            "nodes" => &mut self.nodes,
            "ntasks" => &mut self.ntasks,
            "ntasks-per-node" => &mut self.ntasks_per_node,
            "cpus-per-task" => &mut self.cpus_per_task,
            "mem" => &mut self.mem,
            "gres" => &mut self.gres,
            "job-name" => &mut self.job_name,
            "output" => &mut self.output,
            "error" => &mut self.error,
            other => unreachable!("not a known directive: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_accepts_valid_directives() {
        let options = SlurmOptions::from_pairs([
            ("partition", "gpu"),
            ("time", "1-00:00:00"),
            ("nodes", "2"),
            ("job_name", "train"),
        ])
        .unwrap();

        assert_eq!(options.get("partition"), Some("gpu"));
        assert_eq!(options.get("time"), Some("1-00:00:00"));
        assert_eq!(options.get("nodes"), Some("2"));
        // Lookup works with either spelling.
        assert_eq!(options.get("job_name"), Some("train"));
        assert_eq!(options.get("job-name"), Some("train"));
    }

    #[test]
    fn malformed_time_is_rejected() {
        let err = SlurmOptions::from_pairs([("time", "tomorrow")]).unwrap_err();
        assert!(matches!(err, SlurmError::Validation { ref directive, .. } if directive == "time"));
    }

    #[test]
    fn time_format_variants() {
        assert!(SlurmOptions::new().with("time", "01:00:00").is_ok());
        assert!(SlurmOptions::new().with("time", "1-00:00:00").is_ok());
        assert!(SlurmOptions::new().with("time", "10-23:59:59").is_ok());
        assert!(SlurmOptions::new().with("time", "1:00").is_err());
        assert!(SlurmOptions::new().with("time", "100:00:00").is_err());
    }

    #[test]
    fn mem_format() {
        assert!(SlurmOptions::new().with("mem", "4G").is_ok());
        assert!(SlurmOptions::new().with("mem", "4096M").is_ok());
        assert!(SlurmOptions::new().with("mem", "512").is_ok());
        assert!(SlurmOptions::new().with("mem", "lots").is_err());
        assert!(SlurmOptions::new().with("mem", "4GB").is_err());
    }

    #[test]
    fn counts_must_be_integers() {
        assert!(SlurmOptions::new().with("nodes", "two").is_err());
        assert!(SlurmOptions::new().with("cpus_per_task", "4").is_ok());
        assert!(SlurmOptions::new().with("ntasks-per-node", "8").is_ok());
    }

    #[test]
    fn unknown_directives_are_accepted_verbatim() {
        let options = SlurmOptions::from_pairs([("custom-flag", "x"), ("qos", "standard")]).unwrap();
        assert_eq!(options.get("custom-flag"), Some("x"));
        assert_eq!(options.get("qos"), Some("standard"));
    }

    #[test]
    fn with_is_copy_on_write() {
        let base = SlurmOptions::from_pairs([("partition", "gpu")]).unwrap();
        let updated = base.with("partition", "cpu").unwrap();

        assert_eq!(base.get("partition"), Some("gpu"));
        assert_eq!(updated.get("partition"), Some("cpu"));
    }

    #[test]
    fn without_removes_known_and_extension() {
        let base =
            SlurmOptions::from_pairs([("partition", "gpu"), ("custom", "1")]).unwrap();
        let stripped = base.without("partition").without("custom");

        assert!(stripped.is_empty());
        assert_eq!(base.get("partition"), Some("gpu"));
    }

    #[test]
    fn pairs_follow_canonical_order() {
        // Supplied out of order; enumeration re-imposes canonical order
        // with extensions trailing in first-seen order.
        let options = SlurmOptions::from_pairs([
            ("job-name", "demo"),
            ("account", "proj01"),
            ("partition", "gpu"),
            ("custom", "x"),
            ("time", "00:30:00"),
        ])
        .unwrap();

        let names: Vec<&str> = options.pairs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["partition", "time", "job-name", "account", "custom"]);
    }

    #[test]
    fn or_defaults_prefers_self() {
        let explicit = SlurmOptions::from_pairs([("partition", "gpu")]).unwrap();
        let embedded =
            SlurmOptions::from_pairs([("partition", "cpu"), ("time", "01:00:00")]).unwrap();

        let merged = explicit.or_defaults(&embedded);
        assert_eq!(merged.get("partition"), Some("gpu"));
        assert_eq!(merged.get("time"), Some("01:00:00"));
    }

    #[test]
    fn deserializes_from_json_mapping() {
        let options: SlurmOptions = serde_json::from_str(
            r#"{"partition": "gpu", "job-name": "train", "cpus-per-task": "4"}"#,
        )
        .unwrap();
        assert_eq!(options.get("partition"), Some("gpu"));
        assert_eq!(options.get("job-name"), Some("train"));
        assert_eq!(options.get("cpus-per-task"), Some("4"));
    }

    #[test]
    fn deserialization_runs_format_checks() {
        let result = serde_json::from_str::<SlurmOptions>(r#"{"time": "tomorrow"}"#);
        assert!(result.is_err());
    }
}
