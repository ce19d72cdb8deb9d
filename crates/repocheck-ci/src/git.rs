//! Source fetching: clone a repository and pin the workspace to a commit.
//!
//! Every git command's output is appended to the check log whether or not
//! it succeeds. A nonzero exit becomes `GitOperationFailed` carrying that
//! same output.

use std::path::Path;

use repocheck_core::{CheckError, CheckResult, GitOperation};
use repocheck_state::RepositoryRecord;
use tracing::{debug, info};

use crate::check_log::CheckLog;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pick the URL to clone from: clone URL, then ssh URL, then
/// `<host>/<full_name>.git`.
pub fn resolve_clone_url(repo: &RepositoryRecord, host_url: &str) -> CheckResult<String> {
    if let Some(url) = non_blank(repo.clone_url.as_deref()) {
        return Ok(url.to_string());
    }
    if let Some(url) = non_blank(repo.ssh_url.as_deref()) {
        return Ok(url.to_string());
    }
    if let Some(full_name) = non_blank(Some(repo.full_name.as_str())) {
        return Ok(format!(
            "{}/{}.git",
            host_url.trim_end_matches('/'),
            full_name
        ));
    }
    Err(CheckError::SourceUnavailable {
        repository: repo.external_id.to_string(),
    })
}

fn git_in(dest: &Path) -> CommandSpec {
    CommandSpec::new("git").arg("-C").arg(dest.to_string_lossy())
}

async fn run_logged(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    log: &mut CheckLog,
) -> CheckResult<CommandOutput> {
    let out = runner.run(spec).await?;
    log.append(&out.output);
    Ok(out)
}

fn ensure_success(operation: GitOperation, out: CommandOutput) -> CheckResult<CommandOutput> {
    if out.success() {
        Ok(out)
    } else {
        Err(CheckError::GitOperationFailed {
            operation,
            exit_code: out.exit_code,
            output: out.output,
        })
    }
}

/// `git clone --quiet <url> <dest>`
pub async fn clone_repo(
    runner: &dyn CommandRunner,
    url: &str,
    dest: &Path,
    log: &mut CheckLog,
) -> CheckResult<()> {
    info!(%url, dest = %dest.display(), "cloning repository");
    let spec = CommandSpec::new("git")
        .args(["clone", "--quiet", url])
        .arg(dest.to_string_lossy());
    let out = run_logged(runner, &spec, log).await?;
    ensure_success(GitOperation::Clone, out)?;
    Ok(())
}

/// Check out `commit`. If that fails (the commit is not reachable from the
/// cloned refs), fetch it from `origin` and retry the checkout up to
/// `retries` times. With `retries == 0` the first failure is final.
pub async fn checkout_commit(
    runner: &dyn CommandRunner,
    dest: &Path,
    commit: &str,
    retries: u32,
    log: &mut CheckLog,
) -> CheckResult<()> {
    let checkout = git_in(dest).args(["checkout", "--quiet", commit]);

    let first = run_logged(runner, &checkout, log).await?;
    if first.success() {
        return Ok(());
    }
    if retries == 0 {
        return ensure_success(GitOperation::Checkout, first).map(|_| ());
    }

    debug!(%commit, "commit not present after clone, fetching");
    let fetch = git_in(dest).args(["fetch", "--quiet", "origin", commit]);
    let fetched = run_logged(runner, &fetch, log).await?;
    ensure_success(GitOperation::Fetch, fetched)?;

    let mut last = None;
    for attempt in 1..=retries {
        let out = run_logged(runner, &checkout, log).await?;
        if out.success() {
            return Ok(());
        }
        debug!(%commit, attempt, "checkout retry failed");
        last = Some(out);
    }

    match last {
        Some(out) => ensure_success(GitOperation::Checkout, out).map(|_| ()),
        None => Ok(()),
    }
}

/// `git rev-parse HEAD`, trimmed.
pub async fn read_head(
    runner: &dyn CommandRunner,
    dest: &Path,
    log: &mut CheckLog,
) -> CheckResult<String> {
    let spec = git_in(dest).args(["rev-parse", "HEAD"]);
    let out = run_logged(runner, &spec, log).await?;
    let out = ensure_success(GitOperation::RevParse, out)?;
    Ok(out.output.trim().to_string())
}
