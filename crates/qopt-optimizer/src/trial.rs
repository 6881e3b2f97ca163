//! Trial tracking and optimization run management.

use chrono::{DateTime, Utc};
use qopt_types::ParamSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::space::SearchMethod;

/// Unique optimization run identifier.
pub type RunId = Uuid;

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl Default for ObjectiveDirection {
    fn default() -> Self {
        Self::Maximize
    }
}

impl ObjectiveDirection {
    /// Map a raw score so that higher is always better.
    pub fn orient(&self, score: f64) -> f64 {
        match self {
            Self::Maximize => score,
            Self::Minimize => -score,
        }
    }

    pub fn improves(&self, candidate: f64, current: f64) -> bool {
        self.orient(candidate) > self.orient(current)
    }
}

/// Knobs for driving an optimization run. The search space itself comes from
/// [`Config`](crate::Config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSettings {
    /// Probability of a bayesian proposal being a fresh sample rather than a
    /// perturbation of the best point.
    pub exploration_weight: f64,

    /// Seed for reproducible bayesian proposals.
    pub seed: Option<u64>,

    /// Hard cap on trials per space, on top of the space's own budget.
    pub max_trials: Option<usize>,

    /// Direction of optimization (MRR, NDCG and friends are maximized).
    pub direction: ObjectiveDirection,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            exploration_weight: 0.3,
            seed: None,
            max_trials: None,
            direction: ObjectiveDirection::Maximize,
        }
    }
}

impl OptimizationSettings {
    pub fn with_exploration_weight(mut self, weight: f64) -> Self {
        self.exploration_weight = weight;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = Some(n);
        self
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
}

/// All trials of one parameter space, with the best one tracked as they
/// complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: RunId,
    pub space_name: String,
    pub method: SearchMethod,
    pub direction: ObjectiveDirection,
    pub state: RunState,
    pub trials: Vec<Trial>,
    best: Option<usize>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OptimizationRun {
    pub fn new(space_name: impl Into<String>, method: SearchMethod, direction: ObjectiveDirection) -> Self {
        Self {
            id: Uuid::new_v4(),
            space_name: space_name.into(),
            method,
            direction,
            state: RunState::Pending,
            trials: Vec::new(),
            best: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Number for the next trial, starting at 1.
    pub fn next_trial_number(&self) -> usize {
        self.trials.len() + 1
    }

    /// Store a finished trial and update the best trial if it improves on it.
    pub fn record(&mut self, trial: Trial) {
        if let Some(score) = trial.score {
            let improves = match self.best_trial().and_then(|best| best.score) {
                None => true,
                Some(current) => self.direction.improves(score, current),
            };
            if improves {
                self.best = Some(self.trials.len());
            }
        }
        self.trials.push(trial);
    }

    pub fn best_trial(&self) -> Option<&Trial> {
        self.best.and_then(|idx| self.trials.get(idx))
    }

    pub fn trials_completed(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.status == TrialStatus::Completed)
            .count()
    }

    pub fn trials_failed(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.status == TrialStatus::Failed)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

/// A single trial: one fully resolved parameter set evaluated once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub run_id: RunId,
    pub number: usize,
    /// The values proposed by the strategy, keyed by dimension name.
    pub proposal: ParamSet,
    /// The complete parameter set sent to the evaluator.
    pub parameters: ParamSet,
    pub status: TrialStatus,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Trial {
    pub fn new(run_id: RunId, number: usize, proposal: ParamSet, parameters: ParamSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            number,
            proposal,
            parameters,
            status: TrialStatus::Running,
            score: None,
            created_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_completed(&mut self, score: f64) {
        self.status = TrialStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.score = Some(score);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TrialStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Running,
    Completed,
    Failed,
}
