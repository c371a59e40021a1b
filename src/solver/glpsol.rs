//! External-process LP backend bridging to GLPK's `glpsol`.
//!
//! The bridge writes the problem in CPLEX LP format, runs `glpsol` and
//! parses the textual solution report. It is modeled as a fallible,
//! non-reentrant external service: calls are single-flighted behind a
//! process-wide lock and bounded by an explicit timeout (enforced both via
//! `--tmlim` and by killing the child process).

use std::fmt::Write as _;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{AssignmentBackend, AssignmentProblem, SolverError};

const BACKEND_NAME: &str = "glpk-process";

/// One external solver process at a time.
static FLIGHT: Mutex<()> = Mutex::new(());

/// Bridge to an external `glpsol` binary.
pub struct GlpkProcessBackend {
    /// Wall-clock budget for one solve, including process startup.
    pub timeout: Duration,
}

impl Default for GlpkProcessBackend {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl GlpkProcessBackend {
    /// Create a bridge with a custom time budget.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl AssignmentBackend for GlpkProcessBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn solve(&self, problem: &AssignmentProblem) -> Result<Vec<f64>, SolverError> {
        let _flight = FLIGHT.lock();

        let dir = tempfile::tempdir()?;
        let lp_path = dir.path().join("assignment.lp");
        let sol_path = dir.path().join("assignment.sol");
        std::fs::write(&lp_path, write_lp(problem))?;

        log::debug!(
            "glpsol bridge: {} candidates, budget {:?}",
            problem.len(),
            self.timeout
        );

        let mut child = Command::new("glpsol")
            .arg("--lp")
            .arg(&lp_path)
            .arg("--output")
            .arg(&sol_path)
            .arg("--tmlim")
            .arg(self.timeout.as_secs().max(1).to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => SolverError::BackendUnavailable {
                    backend: BACKEND_NAME,
                    reason: "`glpsol` not found in PATH".into(),
                },
                _ => SolverError::Io(e),
            })?;

        // Grace period on top of glpsol's own --tmlim
        let deadline = Instant::now() + self.timeout + Duration::from_secs(2);
        loop {
            match child.try_wait()? {
                Some(status) if status.success() => break,
                Some(status) => {
                    return Err(SolverError::Infeasible(format!(
                        "glpsol exited with {status}"
                    )))
                }
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SolverError::Timeout {
                        backend: BACKEND_NAME,
                        timeout: self.timeout,
                    });
                }
                None => thread::sleep(Duration::from_millis(20)),
            }
        }

        let report = std::fs::read_to_string(&sol_path)?;
        parse_solution(&report, problem.len())
    }
}

/// Render the problem in CPLEX LP format with variables `z0..z{n-1}`.
fn write_lp(problem: &AssignmentProblem) -> String {
    let (na, nb) = (problem.n_trigger, problem.n_response);
    let mut out = String::from("\\ vilamba relaxed assignment\nMinimize\n obj:");
    for (k, c) in problem.costs.iter().enumerate() {
        if k % 8 == 0 {
            out.push_str("\n   ");
        }
        let _ = write!(out, " + {c:.9} z{k}");
    }

    out.push_str("\nSubject To\n");
    let (eq_rows, le_rows) = if problem.response_constrained() {
        (Side::Response, Side::Trigger)
    } else {
        (Side::Trigger, Side::Response)
    };
    write_side_constraints(&mut out, problem, eq_rows, "=", "e");
    write_side_constraints(&mut out, problem, le_rows, "<=", "u");

    out.push_str("Bounds\n");
    for k in 0..na * nb {
        if problem.delays[k] < 0.0 {
            let _ = writeln!(out, " z{k} = 0");
        } else {
            let _ = writeln!(out, " 0 <= z{k} <= 1");
        }
    }
    out.push_str("End\n");
    out
}

#[derive(Clone, Copy)]
enum Side {
    Trigger,
    Response,
}

fn write_side_constraints(
    out: &mut String,
    problem: &AssignmentProblem,
    side: Side,
    op: &str,
    prefix: &str,
) {
    let (na, nb) = (problem.n_trigger, problem.n_response);
    match side {
        Side::Response => {
            for j in 0..nb {
                let _ = write!(out, " {prefix}{j}:");
                for i in 0..na {
                    if i > 0 && i % 10 == 0 {
                        out.push_str("\n   ");
                    }
                    let _ = write!(out, " + z{}", j * na + i);
                }
                let _ = writeln!(out, " {op} 1");
            }
        }
        Side::Trigger => {
            for i in 0..na {
                let _ = write!(out, " {prefix}{i}:");
                for j in 0..nb {
                    if j > 0 && j % 10 == 0 {
                        out.push_str("\n   ");
                    }
                    let _ = write!(out, " + z{}", j * na + i);
                }
                let _ = writeln!(out, " {op} 1");
            }
        }
    }
}

/// Parse activities out of glpsol's textual solution report.
fn parse_solution(report: &str, n: usize) -> Result<Vec<f64>, SolverError> {
    let status = report
        .lines()
        .find(|l| l.trim_start().starts_with("Status:"))
        .unwrap_or("Status: missing");
    if !status.contains("OPTIMAL") {
        return Err(SolverError::Infeasible(status.trim().to_string()));
    }

    let mut weights = vec![0.0; n];
    for line in report.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            continue;
        }
        let Some(idx) = tokens[1]
            .strip_prefix('z')
            .and_then(|s| s.parse::<usize>().ok())
        else {
            continue;
        };
        if idx >= n {
            continue;
        }
        // First numeric token after the name/status columns is the activity
        if let Some(value) = tokens[2..].iter().find_map(|t| t.parse::<f64>().ok()) {
            weights[idx] = value;
        }
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lp_render_shape() {
        let problem = AssignmentProblem::new(&[10.0, 20.0], &[12.0, 25.0]);
        let text = write_lp(&problem);
        assert!(text.starts_with("\\ vilamba"));
        assert!(text.contains("Minimize"));
        assert!(text.contains("Subject To"));
        assert!(text.contains("Bounds"));
        assert!(text.trim_end().ends_with("End"));
        // delay 12 - 20 is negative: its variable is pinned to zero
        assert!(text.contains(" z1 = 0"));
    }

    #[test]
    fn test_parse_solution_reads_activities() {
        let report = "\
Status:     OPTIMAL
   No. Column name       St   Activity     Lower bound   Upper bound
------ ------------      -- ------------- ------------- -------------
     1 z0                B             1             0             1
     2 z1                NL            0             0             1
     3 z2                B           0.5             0             1
";
        let weights = parse_solution(report, 3).unwrap();
        assert_eq!(weights, vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_parse_solution_rejects_infeasible() {
        let report = "Status:     PRIMAL INFEASIBLE\n";
        assert!(matches!(
            parse_solution(report, 1),
            Err(SolverError::Infeasible(_))
        ));
    }
}
