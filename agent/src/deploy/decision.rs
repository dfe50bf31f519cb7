//! Pure decisions taken by the deployer once the remote state is known

use scheduler_api::Application;
use serde_json::Value;

/// What a deploy does with the remote application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStep {
    Create,
    Update,
    /// A deployment is already running and the update is not forced
    Abort { deployment_id: String },
}

pub fn decide_deploy(actual: Option<&Application>, force: bool) -> DeployStep {
    match actual {
        None => DeployStep::Create,
        Some(app) => match app.active_deployment_id() {
            Some(id) if !force => DeployStep::Abort {
                deployment_id: id.to_string(),
            },
            _ => DeployStep::Update,
        },
    }
}

/// What a scale does with the remote application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleStep {
    /// Nothing to scale
    Missing,
    /// Already at the requested instance count
    Unchanged,
    Busy { deployment_id: String },
    Scale,
}

pub fn decide_scale(actual: Option<&Application>, replicas: i32) -> ScaleStep {
    let Some(app) = actual else {
        return ScaleStep::Missing;
    };
    if app.instances == Some(replicas) {
        return ScaleStep::Unchanged;
    }
    match app.active_deployment_id() {
        Some(id) => ScaleStep::Busy {
            deployment_id: id.to_string(),
        },
        None => ScaleStep::Scale,
    }
}

/// True when every field set on `desired` holds the same value on `actual`.
/// Fields absent from `desired` are ignored.
pub fn specs_match(desired: &Application, actual: &Application) -> bool {
    match (serde_json::to_value(desired), serde_json::to_value(actual)) {
        (Ok(desired), Ok(actual)) => is_derivative(&desired, &actual),
        _ => false,
    }
}

/// `actual` is derived from `desired` when it carries every non-null value of
/// `desired`, recursively. Arrays must match element by element.
pub fn is_derivative(desired: &Value, actual: &Value) -> bool {
    match (desired, actual) {
        (Value::Null, _) => true,
        (Value::Object(desired), Value::Object(actual)) => desired.iter().all(|(key, value)| {
            value.is_null()
                || actual
                    .get(key)
                    .is_some_and(|other| is_derivative(value, other))
        }),
        (Value::Array(desired), Value::Array(actual)) => {
            desired.len() == actual.len()
                && desired
                    .iter()
                    .zip(actual)
                    .all(|(value, other)| is_derivative(value, other))
        }
        (Value::Number(desired), Value::Number(actual)) => desired.as_f64() == actual.as_f64(),
        (desired, actual) => desired == actual,
    }
}
