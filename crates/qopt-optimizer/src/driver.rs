//! Optimization loops that tie spaces, strategies and evaluation together.

use qopt_types::{param_set_to_json, ParamSet, QoptResult};
use tracing::{info, warn};

use crate::config::Config;
use crate::merge::merge_param_train;
use crate::search::build_strategy;
use crate::space::{ParameterSpace, SearchMethod};
use crate::trial::{OptimizationRun, OptimizationSettings, Trial};

/// Scores one complete parameter set, e.g. by running a rank evaluation
/// request against a search cluster.
pub trait Evaluator {
    fn evaluate(&mut self, params: &ParamSet) -> QoptResult<f64>;
}

impl<F> Evaluator for F
where
    F: FnMut(&ParamSet) -> QoptResult<f64>,
{
    fn evaluate(&mut self, params: &ParamSet) -> QoptResult<f64> {
        self(params)
    }
}

/// Result of optimizing a single parameter space.
#[derive(Debug, Clone)]
pub struct SpaceOutcome {
    pub best_score: Option<f64>,
    /// Best proposal, keyed by dimension name.
    pub best_params: Option<ParamSet>,
    /// Complete parameter set with the best proposal applied.
    pub final_params: ParamSet,
    pub run: OptimizationRun,
}

/// Result of optimizing every space of a configuration in order.
#[derive(Debug, Clone)]
pub struct ConfigOutcome {
    pub final_params: ParamSet,
    pub spaces: Vec<SpaceOutcome>,
}

/// Optimize one space starting from `base`, which must hold the full set of
/// parameters.
///
/// Grid search evaluates every grid point; bayesian search runs
/// `num_iterations` trials. `settings.max_trials` caps both. A failing
/// evaluation marks its trial failed and the run continues.
pub fn optimize_space<E: Evaluator + ?Sized>(
    space: &ParameterSpace,
    base: &ParamSet,
    evaluator: &mut E,
    settings: &OptimizationSettings,
) -> QoptResult<SpaceOutcome> {
    let base = merge_param_train(&[base.clone(), space.default_params().clone()])?;
    let method = space.select_method();
    let mut strategy = build_strategy(space, settings)?;

    let budget = match method {
        SearchMethod::Grid => usize::try_from(space.dimensionality().unwrap_or(0)).unwrap_or(usize::MAX),
        SearchMethod::Bayesian => space.num_iterations(),
    };
    let budget = settings.max_trials.map_or(budget, |cap| budget.min(cap));

    let mut run = OptimizationRun::new(space.name(), method, settings.direction);
    run.mark_running();
    info!(
        "Optimizing space {} with {} search ({} trials)",
        space.name(),
        method,
        budget
    );

    while run.trials.len() < budget {
        let Some(values) = strategy.suggest(1).pop() else {
            break;
        };
        let proposal = space.zip_values(&values)?;
        let parameters = merge_param_train(&[base.clone(), proposal.clone()])?;
        let mut trial = Trial::new(run.id, run.next_trial_number(), proposal, parameters);

        match evaluator.evaluate(&trial.parameters) {
            Ok(score) => {
                info!(
                    " - iteration {} scored {:.4} with: {}",
                    trial.number,
                    score,
                    param_set_to_json(&trial.proposal)
                );
                strategy.report(&values, settings.direction.orient(score));
                trial.mark_completed(score);
            }
            Err(e) => {
                warn!("Iteration {} failed: {}", trial.number, e);
                trial.mark_failed(e.to_string());
            }
        }
        run.record(trial);
    }
    run.mark_completed();

    let best = run.best_trial();
    let best_score = best.and_then(|t| t.score);
    let best_params = best.map(|t| t.proposal.clone());
    let final_params = match &best_params {
        Some(best) => merge_param_train(&[base, best.clone()])?,
        None => base,
    };

    match best_score {
        Some(score) => info!("Best score for {}: {:.4}", space.name(), score),
        None => warn!("No successful trials for space {}", space.name()),
    }

    Ok(SpaceOutcome {
        best_score,
        best_params,
        final_params,
        run,
    })
}

/// Optimize every space of `config` in declaration order. Each space starts
/// from the final parameters of the one before it.
pub fn optimize_config<E: Evaluator + ?Sized>(
    config: &Config,
    evaluator: &mut E,
    settings: &OptimizationSettings,
) -> QoptResult<ConfigOutcome> {
    let mut params = config.default_params().clone();
    let mut spaces = Vec::with_capacity(config.spaces().len());

    for space in config.spaces() {
        let outcome = optimize_space(space, &params, evaluator, settings)?;
        params = outcome.final_params.clone();
        spaces.push(outcome);
    }

    info!("Final params: {}", param_set_to_json(&params));
    Ok(ConfigOutcome {
        final_params: params,
        spaces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qopt_types::{evaluation_error, ParamValue, QoptError};
    use serde_json::json;

    fn float(params: &ParamSet, key: &str) -> f64 {
        params.get(key).and_then(ParamValue::as_f64).unwrap()
    }

    #[test]
    fn grid_space_evaluates_every_point() {
        let space = ParameterSpace::parse(&json!({
            "name": "operator",
            "space": {
                "operator": ["or", "and"],
                "minimum_should_match": [10, 50, 90],
            }
        }))
        .unwrap();
        let mut base = ParamSet::new();
        base.insert("operator".into(), "or".into());
        base.insert("minimum_should_match".into(), ParamValue::Int(10));
        base.insert("boost".into(), ParamValue::Float(1.0));

        let mut seen = Vec::new();
        let mut evaluator = |params: &ParamSet| -> QoptResult<f64> {
            seen.push(params.clone());
            let msm = float(params, "minimum_should_match");
            let bonus = if params.get("operator") == Some(&ParamValue::from("and")) { 100.0 } else { 0.0 };
            Ok(msm + bonus)
        };

        let outcome = optimize_space(&space, &base, &mut evaluator, &OptimizationSettings::default()).unwrap();
        assert_eq!(outcome.run.method, SearchMethod::Grid);
        assert_eq!(outcome.run.trials.len(), 6);
        assert_eq!(seen.len(), 6);
        assert!(seen.iter().all(|p| p.len() == 3));

        assert_eq!(outcome.best_score, Some(190.0));
        let best = outcome.best_params.unwrap();
        assert_eq!(best.len(), 2);
        assert_eq!(best.get("operator"), Some(&ParamValue::from("and")));
        assert_eq!(outcome.final_params.get("minimum_should_match"), Some(&ParamValue::Int(90)));
        assert_eq!(outcome.final_params.get("boost"), Some(&ParamValue::Float(1.0)));
    }

    #[test]
    fn bayesian_space_respects_budget_and_cap() {
        let space = ParameterSpace::parse(&json!({
            "name": "bm25",
            "num_iterations": 25,
            "space": {
                "k1": {"low": 0.5, "high": 5.0},
                "b": {"low": 0.3, "high": 1.0},
            }
        }))
        .unwrap();
        let mut base = ParamSet::new();
        base.insert("k1".into(), ParamValue::Float(1.2));
        base.insert("b".into(), ParamValue::Float(0.75));

        let mut evaluator = |params: &ParamSet| -> QoptResult<f64> {
            Ok(-(float(params, "k1") - 2.0).powi(2) - (float(params, "b") - 0.8).powi(2))
        };

        let settings = OptimizationSettings::default().with_seed(17);
        let outcome = optimize_space(&space, &base, &mut evaluator, &settings).unwrap();
        assert_eq!(outcome.run.method, SearchMethod::Bayesian);
        assert_eq!(outcome.run.trials.len(), 25);
        let best = outcome.best_score.unwrap();
        assert!(outcome.run.trials.iter().all(|t| t.score.unwrap() <= best));

        let capped = optimize_space(&space, &base, &mut evaluator, &settings.clone().with_max_trials(4)).unwrap();
        assert_eq!(capped.run.trials.len(), 4);
    }

    #[test]
    fn failed_evaluations_are_recorded() {
        let space = ParameterSpace::parse(&json!({
            "name": "flaky",
            "space": {"slop": [0, 1, 2, 3]}
        }))
        .unwrap();
        let mut base = ParamSet::new();
        base.insert("slop".into(), ParamValue::Int(0));

        let mut evaluator = |params: &ParamSet| -> QoptResult<f64> {
            match params.get("slop") {
                Some(ParamValue::Int(v)) if v % 2 == 0 => Ok(*v as f64),
                _ => Err(evaluation_error!("rank eval request failed")),
            }
        };
        let outcome = optimize_space(&space, &base, &mut evaluator, &OptimizationSettings::default()).unwrap();
        assert_eq!(outcome.run.trials_completed(), 2);
        assert_eq!(outcome.run.trials_failed(), 2);
        assert_eq!(outcome.best_score, Some(2.0));
    }

    #[test]
    fn no_successful_trials_keeps_base() {
        let space = ParameterSpace::parse(&json!({"name": "down", "space": {"slop": [0, 1]}})).unwrap();
        let mut base = ParamSet::new();
        base.insert("slop".into(), ParamValue::Int(3));

        let mut evaluator = |_: &ParamSet| -> QoptResult<f64> { Err(evaluation_error!("unavailable")) };
        let outcome = optimize_space(&space, &base, &mut evaluator, &OptimizationSettings::default()).unwrap();
        assert_eq!(outcome.best_score, None);
        assert_eq!(outcome.best_params, None);
        assert_eq!(outcome.final_params, base);
    }

    #[test]
    fn space_parameters_outside_base_are_rejected() {
        let space = ParameterSpace::parse(&json!({"name": "s", "space": {"unknown": [1, 2]}})).unwrap();
        let mut evaluator = |_: &ParamSet| -> QoptResult<f64> { Ok(1.0) };
        let err = optimize_space(&space, &ParamSet::new(), &mut evaluator, &OptimizationSettings::default())
            .unwrap_err();
        assert!(matches!(err, QoptError::InvalidParameterTrain { .. }));
    }

    #[test]
    fn config_spaces_build_on_each_other() {
        let config = Config::parse(&json!({
            "default": {"operator": "or", "minimum_should_match": 10, "tie_breaker": 0.0},
            "spaces": [
                {
                    "name": "step1",
                    "space": {"operator": ["or", "and"], "minimum_should_match": [10, 20]},
                },
                {
                    "name": "step2",
                    "default": {"operator": "or"},
                    "space": {"tie_breaker": [0, 1]},
                },
            ]
        }))
        .unwrap();

        let mut calls: Vec<String> = Vec::new();
        let mut evaluator = |params: &ParamSet| -> QoptResult<f64> {
            calls.push(param_set_to_json(params).to_string());
            let mut score = float(params, "minimum_should_match");
            if params.get("operator") == Some(&ParamValue::from("and")) {
                score += 5.0;
            }
            score += float(params, "tie_breaker");
            Ok(score)
        };

        let outcome = optimize_config(&config, &mut evaluator, &OptimizationSettings::default()).unwrap();
        assert_eq!(outcome.spaces.len(), 2);
        assert_eq!(outcome.spaces[0].run.space_name, "step1");
        assert_eq!(outcome.spaces[1].run.space_name, "step2");
        assert_eq!(calls.len(), 6);

        // step2 starts from step1's best and re-applies its own default
        assert_eq!(outcome.spaces[0].best_score, Some(25.0));
        assert_eq!(outcome.final_params.get("minimum_should_match"), Some(&ParamValue::Int(20)));
        assert_eq!(outcome.final_params.get("operator"), Some(&ParamValue::from("or")));
        assert_eq!(outcome.final_params.get("tie_breaker"), Some(&ParamValue::Int(1)));
    }
}
