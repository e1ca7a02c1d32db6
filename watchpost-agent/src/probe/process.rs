//! Local process probe
//!
//! Two lookup strategies:
//! - `ps -eo pid=,args=` output streamed through the line counter (default)
//! - in-process scan of the process table via `sysinfo`
//!
//! Neither counts the lookup itself: the `ps` child and the monitor's own
//! PID are excluded from the match.

use std::process::Stdio;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, System, UpdateKind};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use super::lines::LineCounter;
use super::ProbeError;
use crate::config::ProcessSource;

/// PID and full command line, no header; procps, BSD and BusyBox all accept it
const PS_ARGS: [&str; 2] = ["-eo", "pid=,args="];

/// Count running processes matching `name`
pub async fn count_processes(
    name: &str,
    source: ProcessSource,
    timeout: Duration,
) -> Result<usize, ProbeError> {
    match source {
        ProcessSource::Ps => count_with_ps(name, timeout).await,
        ProcessSource::Sysinfo => count_with_sysinfo(name).await,
    }
}

async fn count_with_ps(name: &str, timeout: Duration) -> Result<usize, ProbeError> {
    let mut child = AsyncCommand::new("ps")
        .args(PS_ARGS)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(ProbeError::Spawn)?;

    let excluded = [child.id(), Some(std::process::id())];
    let stdout = child.stdout.take().ok_or(ProbeError::MissingOutput)?;

    let listing = async {
        let count = LineCounter::default()
            .count_matching(stdout, |line| {
                matches_process_line(&String::from_utf8_lossy(line), name, &excluded)
            })
            .await?;
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((count, status))
    };

    // On timeout the child is dropped, and kill_on_drop reaps it
    let (count, status) = tokio::time::timeout(timeout, listing)
        .await
        .map_err(|_| ProbeError::Timeout(timeout))??;

    if !status.success() {
        return Err(ProbeError::ExitStatus(status.code()));
    }

    debug!("ps found {} line(s) matching {}", count, name);
    Ok(count)
}

/// Match one `<pid> <args>` line against a process name, skipping any
/// excluded PID
fn matches_process_line(line: &str, name: &str, excluded: &[Option<u32>]) -> bool {
    let Some((pid, command)) = line.trim_start().split_once(char::is_whitespace) else {
        return false;
    };
    let Ok(pid) = pid.parse::<u32>() else {
        return false;
    };
    if excluded.iter().any(|e| *e == Some(pid)) {
        return false;
    }

    command.contains(name)
}

async fn count_with_sysinfo(name: &str) -> Result<usize, ProbeError> {
    let name = name.to_string();
    let own_pid = std::process::id();

    tokio::task::spawn_blocking(move || {
        let mut sys = System::new();
        // the default refresh leaves the command line empty
        sys.refresh_processes_specifics(ProcessRefreshKind::new().with_cmd(UpdateKind::Always));

        sys.processes()
            .values()
            .filter(|p| p.pid().as_u32() != own_pid)
            .filter(|p| p.name().contains(&name) || p.cmd().join(" ").contains(&name))
            .count()
    })
    .await
    .map_err(|e| ProbeError::Task(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Child;

    const NGINX: &str = " 1234 nginx: worker process";
    const GREP: &str = " 4321 grep nginx";

    /// Spawn `sleep <marker>` and give it time to exec
    async fn spawn_sleeper(marker: &str) -> Child {
        let child = AsyncCommand::new("sleep")
            .arg(marker)
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        child
    }

    #[test]
    fn test_matches_command_only() {
        assert!(matches_process_line(NGINX, "nginx", &[]));
        assert!(matches_process_line(NGINX, "worker process", &[]));
        // the PID is not part of the match
        assert!(!matches_process_line(NGINX, "1234", &[]));
    }

    #[test]
    fn test_malformed_lines_never_match() {
        assert!(!matches_process_line("", "nginx", &[]));
        assert!(!matches_process_line("  PID COMMAND nginx", "nginx", &[]));
        assert!(!matches_process_line("1234", "1234", &[]));
    }

    #[test]
    fn test_excluded_pid_skipped() {
        assert!(matches_process_line(GREP, "nginx", &[]));
        assert!(!matches_process_line(GREP, "nginx", &[Some(4321)]));
    }

    #[tokio::test]
    async fn test_absent_process_counts_zero_or_fails_cleanly() {
        // Hosts without `ps` report a probe error rather than a count
        match count_processes("watchpost-no-such-process-7f3a", ProcessSource::Ps, Duration::from_secs(5)).await {
            Ok(count) => assert_eq!(count, 0),
            Err(e) => assert!(matches!(e, ProbeError::Spawn(_) | ProbeError::ExitStatus(_))),
        }
    }

    #[tokio::test]
    async fn test_sysinfo_excludes_self() {
        let count = count_processes(
            "watchpost-no-such-process-7f3a",
            ProcessSource::Sysinfo,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_ps_finds_running_process_by_argument() {
        let _child = spawn_sleeper("37.4821").await;

        let count = count_processes("37.4821", ProcessSource::Ps, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(count >= 1);
    }

    #[tokio::test]
    async fn test_sysinfo_finds_running_process_by_argument() {
        let _child = spawn_sleeper("38.5932").await;

        let count = count_processes("38.5932", ProcessSource::Sysinfo, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(count >= 1);
    }
}
