//! Analyzer dispatch: run the linter that matches a repository's language.
//!
//! Each supported language maps to exactly one analyzer, run with a fixed
//! configuration file and JSON output. Output is not parsed here; the raw
//! text and exit code are returned and appended to the check log.

use std::path::{Path, PathBuf};

use repocheck_core::{CheckError, CheckResult, LintConfig};
use repocheck_state::Language;
use tracing::{debug, info};

use crate::check_log::CheckLog;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError};

const ESLINT_RUNTIME_MISSING: &str =
    "ESLint requires Node.js (npm/npx). Install Node 18+ or add eslint@8 to devDependencies.";
const RUBOCOP_RUNTIME_MISSING: &str =
    "RuboCop requires Ruby with Bundler. Install Ruby and run `gem install bundler`.";

/// Environment for `npx` runs: no prompts, update checks, funding or audit
/// noise.
pub const NPX_ENV: [(&str, &str); 5] = [
    ("NPM_CONFIG_LOGLEVEL", "error"),
    ("npm_config_loglevel", "error"),
    ("NO_UPDATE_NOTIFIER", "1"),
    ("npm_config_fund", "false"),
    ("npm_config_audit", "false"),
];

/// The fixed set of analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyzer {
    Rubocop,
    Eslint,
}

impl Analyzer {
    /// `None` for languages without an analyzer.
    pub fn for_language(language: &Language) -> Option<Self> {
        match language {
            Language::Ruby => Some(Analyzer::Rubocop),
            Language::JavaScript => Some(Analyzer::Eslint),
            Language::Other(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Analyzer::Rubocop => "RuboCop",
            Analyzer::Eslint => "ESLint",
        }
    }

    /// Label used in the source file count note.
    pub fn source_label(&self) -> &'static str {
        match self {
            Analyzer::Rubocop => "Ruby",
            Analyzer::Eslint => "JS",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Analyzer::Rubocop => &["rb"],
            Analyzer::Eslint => &["js", "jsx", "mjs", "cjs"],
        }
    }

    pub fn config_path(&self, lint: &LintConfig) -> PathBuf {
        match self {
            Analyzer::Rubocop => lint.rubocop_config(),
            Analyzer::Eslint => lint.eslint_config(),
        }
    }
}

/// Raw analyzer result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintOutcome {
    pub output: String,
    pub exit_code: i32,
}

impl From<CommandOutput> for LintOutcome {
    fn from(out: CommandOutput) -> Self {
        Self {
            output: out.output,
            exit_code: out.exit_code,
        }
    }
}

/// Lint the workspace at `dest` for a repository declared as `language`.
///
/// An unsupported language is not an error: a note is logged and the
/// outcome is exit code 0.
pub async fn lint_workspace(
    runner: &dyn CommandRunner,
    lint: &LintConfig,
    dest: &Path,
    language: &Language,
    log: &mut CheckLog,
) -> CheckResult<LintOutcome> {
    let Some(analyzer) = Analyzer::for_language(language) else {
        info!(%language, "no analyzer for language, skipping lint");
        log.note(&format!("Unknown language {:?}, skipping lint", language.as_str()));
        return Ok(LintOutcome {
            output: String::new(),
            exit_code: 0,
        });
    };

    let count = count_source_files(dest, analyzer.extensions());
    log.note(&format!(
        "Found {count} {} files under {}",
        analyzer.source_label(),
        dest.display()
    ));

    let config = resolve_config(analyzer, lint)?;
    let outcome = match analyzer {
        Analyzer::Rubocop => run_rubocop(runner, &config, dest).await?,
        Analyzer::Eslint => run_eslint(runner, lint, &config, dest).await?,
    };

    info!(
        analyzer = analyzer.name(),
        exit_code = outcome.exit_code,
        "analyzer finished"
    );
    log.append(&outcome.output);
    Ok(outcome)
}

/// Absolute path to the analyzer's config file, which must exist.
fn resolve_config(analyzer: Analyzer, lint: &LintConfig) -> CheckResult<PathBuf> {
    let path = analyzer.config_path(lint);
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    if !path.is_file() {
        return Err(CheckError::ConfigurationMissing {
            analyzer: analyzer.name().to_string(),
            path: path.display().to_string(),
        });
    }
    Ok(path)
}

fn runtime_missing(err: RunnerError, runtime: &str, message: &str) -> CheckError {
    if err.is_not_found() {
        CheckError::AnalyzerRuntimeMissing {
            runtime: runtime.to_string(),
            message: message.to_string(),
        }
    } else {
        err.into()
    }
}

pub fn rubocop_command(config: &Path, dest: &Path) -> CommandSpec {
    CommandSpec::new("bundle")
        .args([
            "exec",
            "rubocop",
            "--no-server",
            "--force-exclusion",
            "--config",
        ])
        .arg(config.to_string_lossy())
        .args(["--no-color", "--format", "json", "--parallel", "."])
        .current_dir(dest)
}

async fn run_rubocop(
    runner: &dyn CommandRunner,
    config: &Path,
    dest: &Path,
) -> CheckResult<LintOutcome> {
    let spec = rubocop_command(config, dest);
    runner
        .run(&spec)
        .await
        .map(LintOutcome::from)
        .map_err(|e| runtime_missing(e, "bundler", RUBOCOP_RUNTIME_MISSING))
}

pub fn eslint_args(config: &Path, dest: &Path) -> Vec<String> {
    vec![
        "--no-eslintrc".to_string(),
        "--config".to_string(),
        config.to_string_lossy().into_owned(),
        "--format".to_string(),
        "json".to_string(),
        "--ext".to_string(),
        ".js,.jsx,.mjs,.cjs".to_string(),
        "--ignore-pattern".to_string(),
        "node_modules/**".to_string(),
        "--ignore-pattern".to_string(),
        "dist/**".to_string(),
        dest.to_string_lossy().into_owned(),
    ]
}

async fn run_eslint(
    runner: &dyn CommandRunner,
    lint: &LintConfig,
    config: &Path,
    dest: &Path,
) -> CheckResult<LintOutcome> {
    let args = eslint_args(config, dest);

    let spec = if local_eslint_usable(runner, lint).await {
        debug!(bin = %lint.eslint_local_bin.display(), "using local eslint");
        CommandSpec::new(lint.eslint_local_bin.to_string_lossy()).args(args)
    } else {
        debug!(package = %lint.eslint_fallback_package, "using npx eslint");
        let mut spec = CommandSpec::new("npx")
            .args(["--yes", lint.eslint_fallback_package.as_str()])
            .args(args);
        for (key, value) in NPX_ENV {
            spec = spec.env(key, value);
        }
        spec
    };

    runner
        .run(&spec)
        .await
        .map(LintOutcome::from)
        .map_err(|e| runtime_missing(e, "node", ESLINT_RUNTIME_MISSING))
}

/// The local binary is usable when it exists, `-v` succeeds and its major
/// version is below `eslint_max_major`.
async fn local_eslint_usable(runner: &dyn CommandRunner, lint: &LintConfig) -> bool {
    if !lint.eslint_local_bin.is_file() {
        return false;
    }
    let probe = CommandSpec::new(lint.eslint_local_bin.to_string_lossy()).arg("-v");
    match runner.run(&probe).await {
        Ok(out) if out.success() => {
            major_version(&out.output).is_some_and(|major| major < lint.eslint_max_major)
        }
        _ => false,
    }
}

/// First run of digits in `text`, e.g. `8` for `v8.57.0`.
fn major_version(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Count files under `root` with one of `extensions`, skipping hidden
/// entries. Unreadable directories are skipped.
fn count_source_files(root: &Path, extensions: &[&str]) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };

    let mut count = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            count += count_source_files(&path, extensions);
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext))
        {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn lint_config_with_files() -> (TempDir, LintConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".rubocop.yml"), "AllCops: {}\n").unwrap();
        std::fs::write(dir.path().join(".eslintrc.json"), "{}\n").unwrap();
        let lint = LintConfig {
            config_dir: dir.path().to_path_buf(),
            eslint_local_bin: dir.path().join("no-such-eslint"),
            ..LintConfig::default()
        };
        (dir, lint)
    }

    #[test]
    fn language_mapping_is_exhaustive() {
        assert_eq!(
            Analyzer::for_language(&Language::Ruby),
            Some(Analyzer::Rubocop)
        );
        assert_eq!(
            Analyzer::for_language(&Language::JavaScript),
            Some(Analyzer::Eslint)
        );
        assert_eq!(Analyzer::for_language(&Language::from("Go")), None);
    }

    #[test]
    fn major_version_reads_first_number() {
        assert_eq!(major_version("v8.57.0\n"), Some(8));
        assert_eq!(major_version("v10.0.1"), Some(10));
        assert_eq!(major_version("no digits"), None);
    }

    #[test]
    fn file_count_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app/models")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git/hooks")).unwrap();
        std::fs::write(dir.path().join("app/models/user.rb"), "").unwrap();
        std::fs::write(dir.path().join("Rakefile.rb"), "").unwrap();
        std::fs::write(dir.path().join(".git/hooks/x.rb"), "").unwrap();
        std::fs::write(dir.path().join("app/index.js"), "").unwrap();

        assert_eq!(count_source_files(dir.path(), &["rb"]), 2);
        assert_eq!(
            count_source_files(dir.path(), Analyzer::Eslint.extensions()),
            1
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn unknown_language_passes_with_note() {
        let runner = ScriptedRunner::new();
        let mut log = CheckLog::new();
        let outcome = lint_workspace(
            &runner,
            &LintConfig::default(),
            Path::new("/w"),
            &Language::from("Haskell"),
            &mut log,
        )
        .await
        .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(log
            .as_str()
            .contains("Unknown language \"Haskell\", skipping lint"));
        assert!(runner.command_lines().is_empty());
        assert!(logs_contain("no analyzer for language"));
    }

    #[tokio::test]
    async fn rubocop_runs_inside_workspace() {
        let (_cfg, lint) = lint_config_with_files();
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("a.rb"), "").unwrap();
        let runner = ScriptedRunner::new().on("rubocop", 1, "{\"summary\":{}}");
        let mut log = CheckLog::new();

        let outcome = lint_workspace(&runner, &lint, ws.path(), &Language::Ruby, &mut log)
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 1);
        let call = &runner.calls()[0];
        assert_eq!(call.program, "bundle");
        assert_eq!(call.cwd.as_deref(), Some(ws.path()));
        assert_eq!(call.args.last().map(String::as_str), Some("."));
        assert!(call.args.contains(&"--parallel".to_string()));
        assert!(log
            .as_str()
            .starts_with(&format!("\nFound 1 Ruby files under {}\n", ws.path().display())));
        assert!(log.as_str().ends_with("{\"summary\":{}}"));
    }

    #[tokio::test]
    async fn missing_config_is_fatal() {
        let lint = LintConfig {
            config_dir: PathBuf::from("/definitely/not/here"),
            ..LintConfig::default()
        };
        let runner = ScriptedRunner::new();
        let mut log = CheckLog::new();
        let err = lint_workspace(&runner, &lint, Path::new("/w"), &Language::Ruby, &mut log)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::ConfigurationMissing { .. }));
        assert!(runner.command_lines().is_empty());
    }

    #[tokio::test]
    async fn eslint_falls_back_to_npx_with_quiet_env() {
        let (_cfg, lint) = lint_config_with_files();
        let runner = ScriptedRunner::new().on("npx", 0, "[]");
        let mut log = CheckLog::new();

        lint_workspace(
            &runner,
            &lint,
            Path::new("/w"),
            &Language::JavaScript,
            &mut log,
        )
        .await
        .unwrap();

        let call = &runner.calls()[0];
        assert_eq!(call.program, "npx");
        assert_eq!(call.args[0], "--yes");
        assert_eq!(call.args[1], "eslint@8.57.0");
        assert_eq!(call.args[2], "--no-eslintrc");
        assert_eq!(call.args.last().map(String::as_str), Some("/w"));
        assert!(call
            .env
            .contains(&("NO_UPDATE_NOTIFIER".to_string(), "1".to_string())));
        assert_eq!(call.env.len(), NPX_ENV.len());
    }

    #[tokio::test]
    async fn usable_local_eslint_is_preferred() {
        let (cfg, mut lint) = lint_config_with_files();
        let bin = cfg.path().join("eslint");
        std::fs::write(&bin, "").unwrap();
        lint.eslint_local_bin = bin.clone();

        let runner = ScriptedRunner::new()
            .on("eslint -v", 0, "v8.57.0\n")
            .on("--no-eslintrc", 0, "[]");
        let mut log = CheckLog::new();
        lint_workspace(
            &runner,
            &lint,
            Path::new("/w"),
            &Language::JavaScript,
            &mut log,
        )
        .await
        .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].program, bin.to_string_lossy());
        assert!(calls[1].env.is_empty());
    }

    #[tokio::test]
    async fn too_new_local_eslint_is_skipped() {
        let (cfg, mut lint) = lint_config_with_files();
        let bin = cfg.path().join("eslint");
        std::fs::write(&bin, "").unwrap();
        lint.eslint_local_bin = bin;

        let runner = ScriptedRunner::new()
            .on("eslint -v", 0, "v9.1.0\n")
            .on("npx", 0, "[]");
        let mut log = CheckLog::new();
        lint_workspace(
            &runner,
            &lint,
            Path::new("/w"),
            &Language::JavaScript,
            &mut log,
        )
        .await
        .unwrap();

        assert_eq!(runner.calls()[1].program, "npx");
    }

    #[tokio::test]
    async fn missing_node_is_runtime_missing() {
        let (_cfg, lint) = lint_config_with_files();
        let runner = ScriptedRunner::new().on_spawn_error("npx", std::io::ErrorKind::NotFound);
        let mut log = CheckLog::new();
        let err = lint_workspace(
            &runner,
            &lint,
            Path::new("/w"),
            &Language::JavaScript,
            &mut log,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CheckError::AnalyzerRuntimeMissing { .. }));
        assert_eq!(err.to_string(), ESLINT_RUNTIME_MISSING);
    }
}
