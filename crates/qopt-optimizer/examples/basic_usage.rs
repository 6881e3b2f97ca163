use qopt_optimizer::*;
use qopt_types::{param_set_to_json, ParamSet, QoptResult};

const CONFIG: &str = r#"{
    "default": {
        "operator": "OR",
        "minimum_should_match": 50,
        "tie_breaker": 0.0,
        "url|boost": 1.0,
        "title|boost": 1.0,
        "body|boost": 1.0
    },
    "spaces": [
        {
            "name": "operator",
            "space": {
                "operator": ["OR", "AND"],
                "minimum_should_match": [30, 50, 70, 90]
            }
        },
        {
            "name": "boosts",
            "num_iterations": 40,
            "space": {
                "tie_breaker": {"low": 0.0, "high": 1.0},
                "url|boost": {"low": 0.0, "high": 10.0},
                "title|boost": {"low": 0.0, "high": 10.0},
                "body|boost": {"low": 0.1, "high": 10.0, "distribution": "log-uniform"}
            }
        }
    ]
}"#;

/// Stand-in for a rank evaluation request; peaks at AND/70 with a strong
/// title boost.
fn fake_mrr(params: &ParamSet) -> QoptResult<f64> {
    let get = |key: &str| params.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let mut score = 0.2;
    if params.get("operator").and_then(|v| v.as_str()) == Some("AND") {
        score += 0.02;
    }
    score -= (get("minimum_should_match") - 70.0).abs() / 1000.0;
    score -= (get("title|boost") - 8.0).powi(2) / 500.0;
    score -= (get("tie_breaker") - 0.3).powi(2) / 50.0;
    Ok(score)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("qopt basic usage example");

    let config = Config::from_json_str(CONFIG)?;
    for space in config.spaces() {
        println!(
            "Space {}: dimensions {:?}, dimensionality {:?}, method {}",
            space.name(),
            space.dimension_names(),
            space.dimensionality(),
            space.select_method()
        );
    }

    let settings = OptimizationSettings::default().with_seed(42);
    let mut evaluator = fake_mrr;
    let outcome = optimize_config(&config, &mut evaluator, &settings)?;

    for space in &outcome.spaces {
        println!(
            "{}: {} trials, best score {:?}",
            space.run.space_name,
            space.run.trials.len(),
            space.best_score
        );
    }
    println!("Final params: {}", param_set_to_json(&outcome.final_params));

    Ok(())
}
