use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::convert::{self, ScriptBody};
use crate::error::SlurmError;
use crate::options::SlurmOptions;

/// A bash script bound to a set of SLURM directives.
///
/// Immutable once constructed; [`text`](SlurmScript::text) renders the
/// sbatch-compliant script and caches it, so repeated calls return
/// byte-identical output.
#[derive(Debug, Clone)]
pub struct SlurmScript {
    options: SlurmOptions,
    body: ScriptBody,
    rendered: OnceLock<String>,
}

impl SlurmScript {
    pub fn new(body: ScriptBody, options: SlurmOptions) -> Self {
        Self {
            options,
            body,
            rendered: OnceLock::new(),
        }
    }

    /// Build a script from raw shell source.
    ///
    /// Any directive block already present in the source is treated as a set
    /// of defaults: the explicitly supplied options win wherever both define
    /// the same directive.
    pub fn from_source(source: &str, options: SlurmOptions) -> Result<Self, SlurmError> {
        let (body, embedded) = convert::parse(source)?;
        Ok(Self::new(body, options.or_defaults(&embedded)))
    }

    /// Build a script by reading shell source from a local file.
    pub fn from_file(path: impl AsRef<Path>, options: SlurmOptions) -> Result<Self, SlurmError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| {
            SlurmError::Render(format!("can't read script {}: {e}", path.display()))
        })?;
        Self::from_source(&source, options)
    }

    pub fn options(&self) -> &SlurmOptions {
        &self.options
    }

    pub fn body(&self) -> &ScriptBody {
        &self.body
    }

    /// The rendered scheduler script. Cached after the first call.
    pub fn text(&self) -> Result<&str, SlurmError> {
        if let Some(text) = self.rendered.get() {
            return Ok(text);
        }
        let text = convert::render(&self.body, &self.options)?;
        Ok(self.rendered.get_or_init(|| text))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn text_is_deterministic_and_cached() {
        let options = SlurmOptions::from_pairs([("partition", "gpu")]).unwrap();
        let script = SlurmScript::from_source("echo hi\n", options).unwrap();

        let first = script.text().unwrap().to_string();
        let second = script.text().unwrap();
        assert_eq!(first, second);
        // Second call must come from the cache, not a re-render.
        assert!(std::ptr::eq(script.text().unwrap(), script.text().unwrap()));
    }

    #[test]
    fn explicit_options_override_embedded_directives() {
        let source = "#!/bin/bash\n#SBATCH --partition=cpu\n#SBATCH --time=02:00:00\n\necho hi\n";
        let explicit = SlurmOptions::from_pairs([("partition", "gpu")]).unwrap();

        let script = SlurmScript::from_source(source, explicit).unwrap();
        assert_eq!(script.options().get("partition"), Some("gpu"));
        // Directives the caller did not set are kept as defaults.
        assert_eq!(script.options().get("time"), Some("02:00:00"));
    }

    #[test]
    fn unknown_directive_survives_extract_and_render() {
        let source = "#!/bin/bash\n#SBATCH --custom-flag=x\n\necho hi\n";
        let script = SlurmScript::from_source(source, SlurmOptions::new()).unwrap();

        let text = script.text().unwrap();
        assert!(text.contains("#SBATCH --custom-flag=x\n"));

        let (_, reparsed) = convert::parse(text).unwrap();
        assert_eq!(reparsed.get("custom-flag"), Some("x"));
    }

    #[test]
    fn from_file_reads_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#!/bin/bash").unwrap();
        writeln!(file, "echo from-file").unwrap();

        let options = SlurmOptions::from_pairs([("job-name", "filetest")]).unwrap();
        let script = SlurmScript::from_file(file.path(), options).unwrap();

        assert_eq!(script.body().lines(), ["echo from-file"]);
        assert!(script.text().unwrap().contains("#SBATCH --job-name=filetest\n"));
    }

    #[test]
    fn from_file_missing_path_fails() {
        let err =
            SlurmScript::from_file("/no/such/script.sh", SlurmOptions::new()).unwrap_err();
        assert!(matches!(err, SlurmError::Render(_)));
    }
}
