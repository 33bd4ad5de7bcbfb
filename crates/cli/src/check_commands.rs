use {anyhow::Result, confreader_core::ConfReader};

/// A value that failed to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub section: String,
    pub key: String,
    pub message: String,
}

/// Resolve every value of every section and collect the failures.
pub fn collect_diagnostics(reader: &ConfReader) -> Result<Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    for section in reader.sections(false)? {
        for key in reader.section_keys(&section, false)? {
            if let Err(e) = reader.get(&section, &key, false) {
                diagnostics.push(Diagnostic {
                    section: section.clone(),
                    key,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(diagnostics)
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(reader: &ConfReader) -> Result<()> {
    eprintln!("Checking {}\n", reader.path().display());

    let diagnostics = collect_diagnostics(reader)?;
    for d in &diagnostics {
        eprintln!(
            "  {BOLD}{RED}error{RESET} [{}] {}: {}",
            d.section, d.key, d.message
        );
    }

    if diagnostics.is_empty() {
        eprintln!("{GREEN}No issues found.{RESET}");
        return Ok(());
    }

    eprintln!("\n{} error(s)", diagnostics.len());
    std::process::exit(1);
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, confreader_core::ReaderOptions};

    #[test]
    fn reports_each_bad_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        std::fs::write(
            &path,
            "[server]\nport = 8080\nhost = localhost\n[paths]\nroot = '%(NO_SUCH_CONFREADER_VAR)s'\n",
        )
        .unwrap();
        let reader = ConfReader::open(&path, ReaderOptions::default()).unwrap();

        let diagnostics = collect_diagnostics(&reader).unwrap();
        let found: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.section.as_str(), d.key.as_str()))
            .collect();
        assert_eq!(found, [("server", "host"), ("paths", "root")]);
        assert!(diagnostics[0].message.contains("localhost"));
    }

    #[test]
    fn clean_file_has_no_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ini");
        std::fs::write(&path, "[server]\nport = 8080\nhost = 'localhost'\n").unwrap();
        let reader = ConfReader::open(&path, ReaderOptions::default()).unwrap();
        assert!(collect_diagnostics(&reader).unwrap().is_empty());
    }
}
