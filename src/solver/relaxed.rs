//! In-process LP and MILP backends built on `microlp`.

use microlp::{ComparisonOp, OptimizationDirection, Problem, Variable};

use super::{AssignmentBackend, AssignmentProblem, SolverError};

/// Continuous LP relaxation solved by the in-process simplex.
///
/// Returns fractional weights; with the assignment polytope being
/// integral, vertex solutions are 0/1 in practice, but callers must not
/// rely on that.
pub struct RelaxedLpBackend;

/// Mixed-integer formulation: every candidate weight is a 0/1 variable.
///
/// Slower than [`RelaxedLpBackend`] but the returned weights are already
/// integral, so any rounding transform is a no-op.
pub struct IntegerBackend;

impl AssignmentBackend for RelaxedLpBackend {
    fn name(&self) -> &'static str {
        "relaxed-lp"
    }

    fn solve(&self, problem: &AssignmentProblem) -> Result<Vec<f64>, SolverError> {
        let mut lp = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<Variable> = (0..problem.len())
            .map(|k| {
                // Candidates with negative delay carry no mass
                let upper = if problem.delays[k] < 0.0 { 0.0 } else { 1.0 };
                lp.add_var(problem.costs[k], (0.0, upper))
            })
            .collect();
        add_one_to_one_constraints(&mut lp, &vars, problem);

        let solution = lp
            .solve()
            .map_err(|e| SolverError::Infeasible(e.to_string()))?;
        Ok(vars.iter().map(|&v| solution[v]).collect())
    }
}

impl AssignmentBackend for IntegerBackend {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn solve(&self, problem: &AssignmentProblem) -> Result<Vec<f64>, SolverError> {
        let mut lp = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<Variable> = (0..problem.len())
            .map(|k| {
                let upper = if problem.delays[k] < 0.0 { 0 } else { 1 };
                lp.add_integer_var(problem.costs[k], (0, upper))
            })
            .collect();
        add_one_to_one_constraints(&mut lp, &vars, problem);

        let solution = lp
            .solve()
            .map_err(|e| SolverError::Infeasible(e.to_string()))?;
        Ok(vars.iter().map(|&v| solution[v]).collect())
    }
}

/// Exactly-one on the smaller side, at-most-one on the larger side.
fn add_one_to_one_constraints(lp: &mut Problem, vars: &[Variable], problem: &AssignmentProblem) {
    let (na, nb) = (problem.n_trigger, problem.n_response);
    if problem.response_constrained() {
        for j in 0..nb {
            let row: Vec<(Variable, f64)> = (0..na).map(|i| (vars[j * na + i], 1.0)).collect();
            lp.add_constraint(row.as_slice(), ComparisonOp::Eq, 1.0);
        }
        for i in 0..na {
            let col: Vec<(Variable, f64)> = (0..nb).map(|j| (vars[j * na + i], 1.0)).collect();
            lp.add_constraint(col.as_slice(), ComparisonOp::Le, 1.0);
        }
    } else {
        for i in 0..na {
            let col: Vec<(Variable, f64)> = (0..nb).map(|j| (vars[j * na + i], 1.0)).collect();
            lp.add_constraint(col.as_slice(), ComparisonOp::Eq, 1.0);
        }
        for j in 0..nb {
            let row: Vec<(Variable, f64)> = (0..na).map(|i| (vars[j * na + i], 1.0)).collect();
            lp.add_constraint(row.as_slice(), ComparisonOp::Le, 1.0);
        }
    }
}
