//! Keptn event catalog
//!
//! CloudEvent type names and the payloads they carry. The five kinds the
//! dispatcher understands are gathered in [`KeptnEvent`].

use super::envelope::Envelope;
use super::error::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// CloudEvent type for creating a new service
pub const SERVICE_CREATE_EVENT_TYPE: &str = "sh.keptn.event.service.create";
/// Internal CloudEvent type for creating a new service
pub const INTERNAL_SERVICE_CREATE_EVENT_TYPE: &str = "sh.keptn.internal.event.service.create";
/// CloudEvent type for creating a new project
pub const PROJECT_CREATE_EVENT_TYPE: &str = "sh.keptn.event.project.create";
/// CloudEvent type for deleting a project
pub const PROJECT_DELETE_EVENT_TYPE: &str = "sh.keptn.event.project.delete";
/// Internal CloudEvent type for creating a new project
pub const INTERNAL_PROJECT_CREATE_EVENT_TYPE: &str = "sh.keptn.internal.event.project.create";
/// Internal CloudEvent type for deleting a project
pub const INTERNAL_PROJECT_DELETE_EVENT_TYPE: &str = "sh.keptn.internal.event.project.delete";
/// CloudEvent type for changing the configuration
pub const CONFIGURATION_CHANGE_EVENT_TYPE: &str = "sh.keptn.event.configuration.change";
/// CloudEvent type to inform about an open problem
pub const PROBLEM_OPEN_EVENT_TYPE: &str = "sh.keptn.event.problem.open";
/// CloudEvent type for configuring monitoring
pub const CONFIGURE_MONITORING_EVENT_TYPE: &str = "sh.keptn.event.monitoring.configure";
/// CloudEvent type indicating that tests have finished
pub const TESTS_FINISHED_EVENT_TYPE: &str = "sh.keptn.event.tests.finished";

// Types routed by the dispatcher
pub const DEPLOYMENT_FINISHED_EVENT_TYPE: &str = "sh.keptn.events.deployment-finished";
pub const EVALUATION_DONE_EVENT_TYPE: &str = "sh.keptn.events.evaluation-done";
pub const TESTS_FINISHED_LEGACY_EVENT_TYPE: &str = "sh.keptn.events.tests-finished";
pub const PROBLEM_EVENT_TYPE: &str = "sh.keptn.events.problem";

/// Payload for creating a new project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectCreateEventData {
    pub project: String,
    /// Base64-encoded shipyard file
    pub shipyard: String,
    #[serde(rename = "gitUser", skip_serializing_if = "String::is_empty")]
    pub git_user: String,
    #[serde(rename = "gitToken", skip_serializing_if = "String::is_empty")]
    pub git_token: String,
    #[serde(rename = "gitRemoteURL", skip_serializing_if = "String::is_empty")]
    pub git_remote_url: String,
}

/// Payload for deleting a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDeleteEventData {
    pub project: String,
}

/// How a service is rolled out in a stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStrategy {
    #[default]
    Direct,
    BlueGreenService,
}

/// Payload for creating a new service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceCreateEventData {
    pub project: String,
    pub service: String,
    /// Helm chart packed as tgz and base64 encoded
    #[serde(rename = "helmChart")]
    pub helm_chart: String,
    /// Deployment strategy per stage
    #[serde(rename = "deploymentStrategies")]
    pub deployment_strategies: HashMap<String, DeploymentStrategy>,
}

/// Action taken on a canary release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryAction {
    #[default]
    Set,
    Promote,
    Discard,
}

/// New canary configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Canary {
    /// Traffic percentage on the canary
    #[serde(skip_serializing_if = "is_zero")]
    pub value: i32,
    pub action: CanaryAction,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// A property of the primary deployment to change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyChange {
    #[serde(rename = "propertyPath")]
    pub property_path: String,
    pub value: Value,
}

/// Payload for changing the service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationChangeEventData {
    pub project: String,
    pub service: String,
    pub stage: String,
    /// New Helm values for the canary
    #[serde(rename = "valuesCanary", skip_serializing_if = "Option::is_none")]
    pub values_canary: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary: Option<Canary>,
    #[serde(rename = "deploymentChanges", skip_serializing_if = "Vec::is_empty")]
    pub deployment_changes: Vec<PropertyChange>,
}

/// Payload of a finished test run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestsFinishedEventData {
    pub project: String,
    pub service: String,
    pub stage: String,
    #[serde(rename = "teststrategy")]
    pub test_strategy: String,
}

/// Payload describing a problem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemEventData {
    pub state: String,
    #[serde(rename = "problemID")]
    pub problem_id: String,
    #[serde(rename = "problemtitle")]
    pub problem_title: String,
    #[serde(rename = "problemdetails")]
    pub problem_details: String,
    #[serde(rename = "impactedEntity")]
    pub impacted_entity: String,
}

/// Payload for configuring monitoring of a service
///
/// Indicators, objectives and remediations are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigureMonitoringEventData {
    #[serde(rename = "type")]
    pub monitoring_type: String,
    pub project: String,
    pub service: String,
    #[serde(rename = "serviceIndicators")]
    pub service_indicators: Option<Value>,
    #[serde(rename = "serviceObjectives")]
    pub service_objectives: Option<Value>,
    pub remediation: Option<Value>,
}

/// One entry of an evaluation result
///
/// The value may be a scalar or a list; it stays untyped until read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDetail {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

impl EvaluationDetail {
    /// The value as a single string, if it is a scalar
    pub fn as_scalar(&self) -> Option<String> {
        match &self.value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// The value as a list; a scalar becomes a one-element list
    pub fn as_list(&self) -> Option<Vec<Value>> {
        match &self.value {
            Value::Array(items) => Some(items.clone()),
            Value::Null | Value::Object(_) => None,
            scalar => Some(vec![scalar.clone()]),
        }
    }
}

/// Payload of a completed evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationDoneEventData {
    #[serde(rename = "deploymentstrategy")]
    pub deployment_strategy: String,
    #[serde(rename = "evaluationdetails")]
    pub evaluation_details: Vec<EvaluationDetail>,
    #[serde(rename = "evaluationpassed")]
    pub evaluation_passed: bool,
    pub project: String,
    pub service: String,
    pub stage: String,
    #[serde(rename = "teststrategy")]
    pub test_strategy: String,
}

/// Payload of a completed deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentFinishedEventData {
    #[serde(rename = "deploymentstrategy")]
    pub deployment_strategy: String,
    pub project: String,
    pub service: String,
    pub stage: String,
    #[serde(rename = "teststrategy")]
    pub test_strategy: String,
}

/// Every event kind the dispatcher delivers
#[derive(Debug, Clone, PartialEq)]
pub enum KeptnEvent {
    ConfigurationChange(ConfigurationChangeEventData),
    DeploymentFinished(DeploymentFinishedEventData),
    EvaluationDone(EvaluationDoneEventData),
    TestsFinished(TestsFinishedEventData),
    Problem(ProblemEventData),
}

impl KeptnEvent {
    /// Decode the `data` of an envelope, keyed on its `type`
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, DispatchError> {
        Self::decode(&envelope.event_type, &envelope.data)
    }

    /// Decode a payload according to its type discriminator
    pub fn decode(event_type: &str, data: &Value) -> Result<Self, DispatchError> {
        fn payload<T: serde::de::DeserializeOwned>(
            event_type: &str,
            data: &Value,
        ) -> Result<T, DispatchError> {
            T::deserialize(data).map_err(|source| DispatchError::Payload {
                event_type: event_type.to_string(),
                source,
            })
        }

        match event_type {
            CONFIGURATION_CHANGE_EVENT_TYPE => {
                Ok(Self::ConfigurationChange(payload(event_type, data)?))
            }
            DEPLOYMENT_FINISHED_EVENT_TYPE => Ok(Self::DeploymentFinished(payload(event_type, data)?)),
            EVALUATION_DONE_EVENT_TYPE => Ok(Self::EvaluationDone(payload(event_type, data)?)),
            TESTS_FINISHED_LEGACY_EVENT_TYPE => Ok(Self::TestsFinished(payload(event_type, data)?)),
            PROBLEM_EVENT_TYPE => Ok(Self::Problem(payload(event_type, data)?)),
            other => Err(DispatchError::UnrecognizedEventType(other.to_string())),
        }
    }

    /// Type discriminator this event was decoded from
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConfigurationChange(_) => CONFIGURATION_CHANGE_EVENT_TYPE,
            Self::DeploymentFinished(_) => DEPLOYMENT_FINISHED_EVENT_TYPE,
            Self::EvaluationDone(_) => EVALUATION_DONE_EVENT_TYPE,
            Self::TestsFinished(_) => TESTS_FINISHED_LEGACY_EVENT_TYPE,
            Self::Problem(_) => PROBLEM_EVENT_TYPE,
        }
    }

    /// Payload serialized back to JSON
    pub fn data(&self) -> Value {
        let value = match self {
            Self::ConfigurationChange(data) => serde_json::to_value(data),
            Self::DeploymentFinished(data) => serde_json::to_value(data),
            Self::EvaluationDone(data) => serde_json::to_value(data),
            Self::TestsFinished(data) => serde_json::to_value(data),
            Self::Problem(data) => serde_json::to_value(data),
        };
        value.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_configuration_change() {
        let data = json!({
            "project": "sockshop",
            "service": "carts",
            "stage": "dev",
            "canary": {"value": 50, "action": "set"},
            "deploymentChanges": [{"propertyPath": "image", "value": "carts:0.9"}]
        });
        let event = KeptnEvent::decode(CONFIGURATION_CHANGE_EVENT_TYPE, &data).unwrap();
        let KeptnEvent::ConfigurationChange(change) = event else {
            panic!("wrong variant");
        };
        assert_eq!(change.project, "sockshop");
        assert_eq!(change.canary.unwrap().value, 50);
        assert_eq!(change.deployment_changes[0].value, json!("carts:0.9"));
    }

    #[test]
    fn test_canary_without_action_is_set() {
        let data = json!({
            "project": "sockshop",
            "canary": {"value": 50},
            "deploymentChanges": [{"value": "carts:0.9"}]
        });
        let KeptnEvent::ConfigurationChange(change) =
            KeptnEvent::decode(CONFIGURATION_CHANGE_EVENT_TYPE, &data).unwrap()
        else {
            panic!("wrong variant");
        };
        let canary = change.canary.unwrap();
        assert_eq!(canary.value, 50);
        assert_eq!(canary.action, CanaryAction::Set);
        assert_eq!(change.deployment_changes[0].property_path, "");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = KeptnEvent::decode("sh.keptn.events.unknown", &json!({})).unwrap_err();
        assert!(matches!(err, DispatchError::UnrecognizedEventType(t) if t == "sh.keptn.events.unknown"));
    }

    #[test]
    fn test_catalog_constant_is_not_dispatched() {
        // The newer tests.finished name is catalog data only
        let err = KeptnEvent::decode(TESTS_FINISHED_EVENT_TYPE, &json!({})).unwrap_err();
        assert!(matches!(err, DispatchError::UnrecognizedEventType(_)));
    }

    #[test]
    fn test_payload_type_mismatch_rejected() {
        let err = KeptnEvent::decode(PROBLEM_EVENT_TYPE, &json!({"state": 42})).unwrap_err();
        assert!(matches!(err, DispatchError::Payload { .. }));
        let err = KeptnEvent::decode(PROBLEM_EVENT_TYPE, &Value::Null).unwrap_err();
        assert!(matches!(err, DispatchError::Payload { .. }));
    }

    #[test]
    fn test_evaluation_detail_values() {
        let data = json!({
            "evaluationpassed": true,
            "evaluationdetails": [
                {"Key": "response_time", "Value": "320ms"},
                {"Key": "violations", "Value": ["a", "b"]}
            ]
        });
        let KeptnEvent::EvaluationDone(done) = KeptnEvent::decode(EVALUATION_DONE_EVENT_TYPE, &data).unwrap() else {
            panic!("wrong variant");
        };
        assert!(done.evaluation_passed);
        let scalar = &done.evaluation_details[0];
        assert_eq!(scalar.as_scalar().as_deref(), Some("320ms"));
        assert_eq!(scalar.as_list(), Some(vec![json!("320ms")]));
        let list = &done.evaluation_details[1];
        assert_eq!(list.as_scalar(), None);
        assert_eq!(list.as_list().map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_service_create_strategies() {
        let data: ServiceCreateEventData = serde_json::from_value(json!({
            "project": "sockshop",
            "service": "carts",
            "deploymentStrategies": {"dev": "direct", "production": "blue_green_service"}
        }))
        .unwrap();
        assert_eq!(
            data.deployment_strategies.get("production"),
            Some(&DeploymentStrategy::BlueGreenService)
        );
    }

    #[test]
    fn test_from_envelope_uses_type_and_data() {
        let envelope = Envelope::new(PROBLEM_EVENT_TYPE, "evt-1", json!({"state": "OPEN", "problemID": "P-1"}));
        let KeptnEvent::Problem(problem) = KeptnEvent::from_envelope(&envelope).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(problem.problem_id, "P-1");
    }

    #[test]
    fn test_event_type_round_trips_through_decode() {
        let event = KeptnEvent::decode(DEPLOYMENT_FINISHED_EVENT_TYPE, &json!({"project": "p"})).unwrap();
        assert_eq!(event.event_type(), DEPLOYMENT_FINISHED_EVENT_TYPE);
        assert_eq!(event.data()["project"], "p");
    }
}
