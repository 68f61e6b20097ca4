use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

const BRAESS: &str = "\
# Braess paradox, unit demand
function lin (f) f
function flat (f) c

node s
node a
node b
node t

dedge sa s a lin
dedge at a t flat 1
dedge sb s b flat 1
dedge bt b t lin
dedge ab a b flat 0

od 1 s t 1
";

// Helper function to create a network file in a temporary directory
fn create_network(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let file_path = dir.path().join(name);
    fs::write(&file_path, content).expect("Failed to write network file");
    file_path
}

// Helper function to run the sotap binary
fn run_sotap(args: &[&str], files: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sotap"))
        .args(args)
        .args(files)
        .output()
        .expect("Failed to run sotap")
}

fn reported_value(stdout: &str, file: &Path) -> f64 {
    let prefix = format!("{}: System Optimal = ", file.display());
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .unwrap_or_else(|| panic!("no value reported for {}:\n{}", file.display(), stdout))
        .trim()
        .parse()
        .expect("value should be a number")
}

#[cfg(test)]
mod solve_tests {
    use super::*;

    #[test]
    fn test_braess_network_system_optimum() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let input = create_network(&dir, "braess.net", BRAESS);

        let output = run_sotap(&["solve"], &[&input]);
        let stdout = String::from_utf8_lossy(&output.stdout);

        assert!(
            output.status.success(),
            "Command should succeed. stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        // half of the demand on each outer route, the shortcut stays empty
        assert_abs_diff_eq!(reported_value(&stdout, &input), 1.5, epsilon = 1e-4);
    }

    #[test]
    fn test_every_file_gets_its_own_value() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let braess = create_network(&dir, "braess.net", BRAESS);
        let single = create_network(
            &dir,
            "single.net",
            "function c (f) 2*f + 3\nnode A\nnode B\ndedge AB A B c\nod 1 A B 10\n",
        );

        let output = run_sotap(&["solve"], &[&braess, &single]);
        let stdout = String::from_utf8_lossy(&output.stdout);

        assert!(output.status.success());
        assert_abs_diff_eq!(reported_value(&stdout, &braess), 1.5, epsilon = 1e-4);
        // (2*10 + 3) per traveller
        assert_abs_diff_eq!(reported_value(&stdout, &single), 23.0, epsilon = 1e-4);
    }

    #[test]
    fn test_lp_and_report_outputs() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let input = create_network(&dir, "braess.net", BRAESS);
        let lp_dir = dir.path().join("models");
        let report = dir.path().join("braess.rpt");

        let output = run_sotap(
            &[
                "solve",
                "--lp",
                "--output-dir",
                lp_dir.to_str().unwrap(),
                "--report",
                report.to_str().unwrap(),
            ],
            &[&input],
        );
        assert!(
            output.status.success(),
            "Command should succeed. stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let lp = fs::read_to_string(lp_dir.join("braess.lp")).expect("LP file should exist");
        assert!(lp.starts_with("\\ Problem name: braess\n"));
        assert!(lp.contains("Minimize\n obj: phi_sa + phi_at + phi_sb + phi_bt + phi_ab\n"));
        assert!(lp.contains(" cost_sa: - phi_sa + [ l_sa ^ 2 ] <= 0\n"), "{}", lp);
        assert!(lp.contains(" link_ab: l_ab - x_ab_s_t = 0\n"), "{}", lp);
        assert!(lp.ends_with("End\n"));

        let rpt = fs::read_to_string(&report).expect("report should exist");
        assert!(rpt.contains("Network: "));
        for edge in ["sa", "at", "sb", "bt", "ab"] {
            assert!(rpt.contains(edge), "edge {} missing from report", edge);
        }
    }

    #[test]
    fn test_infeasible_network_fails() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let input = create_network(
            &dir,
            "oneway.net",
            "function c (f) f\nnode A\nnode B\ndedge AB A B c\nod 1 B A 5\n",
        );

        let output = run_sotap(&["solve"], &[&input]);

        assert!(!output.status.success(), "unreachable demand must fail");
        assert!(String::from_utf8_lossy(&output.stdout).contains("infeasible"));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Problem Infeasible"));
    }

    #[test]
    fn test_time_limit_fails_the_run() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut grid = String::from("function bpr (f) t * (1 + f / cap)\n");
        for r in 0..12 {
            for c in 0..12 {
                grid += &format!("node n{}_{}\n", r, c);
                if c + 1 < 12 {
                    grid += &format!("edge h{}_{} n{}_{} n{}_{} bpr 1 50\n", r, c, r, c, r, c + 1);
                }
                if r + 1 < 12 {
                    grid += &format!("edge v{}_{} n{}_{} n{}_{} bpr 2 40\n", r, c, r, c, r + 1, c);
                }
            }
        }
        for k in 0..12 {
            grid += &format!("od {} n{}_0 n{}_11 {}\n", k, k, 11 - k, 5 + k);
        }
        let input = create_network(&dir, "grid.net", &grid);

        let output = run_sotap(&["solve", "--time-limit", "0.000001"], &[&input]);

        assert!(!output.status.success(), "hitting the time limit must fail");
        assert!(String::from_utf8_lossy(&output.stdout).contains("time limit reached"));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Solver time limit reached"));
    }

    #[test]
    fn test_format_error_reports_line() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let input = create_network(
            &dir,
            "broken.net",
            "function c (f) f\nnode A\nroad AB A B c\n",
        );

        let output = run_sotap(&["solve"], &[&input]);
        let stderr = String::from_utf8_lossy(&output.stderr);

        assert!(!output.status.success());
        assert!(stderr.contains("line 3"), "stderr: {}", stderr);
        assert!(stderr.contains("road"), "stderr: {}", stderr);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let output = run_sotap(&["solve"], &[&dir.path().join("nope.net")]);
        assert!(!output.status.success());
    }
}

#[cfg(test)]
mod check_tests {
    use super::*;

    #[test]
    fn test_check_prints_coefficients_and_free_flow_costs() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let input = create_network(&dir, "braess.net", BRAESS);

        let output = run_sotap(&["check"], &[&input]);
        let stdout = String::from_utf8_lossy(&output.stdout);

        assert!(
            output.status.success(),
            "Command should succeed. stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(stdout.starts_with("4 nodes, 5 edges, 1 OD pairs, total demand 1\n"));
        assert!(stdout.contains("Edges:"));
        assert!(stdout.contains("OD pairs:"));
        // the shortcut route s-a-b-t costs nothing at zero flow
        let od_section = &stdout[stdout.find("OD pairs:").unwrap()..];
        assert!(od_section.contains(" s "), "{}", stdout);
        assert!(od_section.contains(" 0 "), "{}", stdout);
    }
}
