//! State machine resource
//!
//! In-memory representation of `.statemachine` files: parameters, layers,
//! states, and parameter-conditioned transitions, with JSON load/save.
//!
//! Resources are built by deserialisation or through the editing API, then
//! shared immutably (the editor clones before editing and swaps). Runtimes
//! never mutate a resource.

use std::path::Path;

use glam::Vec2;
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{AnimationError, AnimationResult};
use crate::value::{ComparisonOperator, ParameterKind, ParameterValue};

/// Document `type` tag of a state machine file
pub const STATE_MACHINE_DOC_TYPE: &str = "StateMachine";
/// Format version written on save
pub const FORMAT_VERSION: &str = "1.0";

/// A named, typed parameter declaration
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub default_value: ParameterValue,
}

impl AnimationParameter {
    /// Create a parameter with the kind's default value.
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default_value: ParameterValue::default_for(kind),
        }
    }

    /// Create a parameter with an explicit default value.
    pub fn with_default(name: impl Into<String>, default_value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            kind: default_value.kind(),
            default_value,
        }
    }
}

/// A single predicate over one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCondition {
    pub parameter_name: String,
    pub operator: ComparisonOperator,
    /// Compare value; its kind must match the referenced parameter's kind
    pub value: ParameterValue,
}

impl TransitionCondition {
    pub fn new(
        parameter_name: impl Into<String>,
        operator: ComparisonOperator,
        value: ParameterValue,
    ) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            operator,
            value,
        }
    }
}

/// A node in a layer's graph, pointing at a clip plus playback metadata
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationState {
    pub id: Uuid,
    /// Unique within the owning layer
    pub name: String,
    /// Clip name; may be empty for no-op states
    pub animation_clip: String,
    /// Playback speed multiplier
    pub speed: f32,
    pub looping: bool,
    /// Node position in the editor graph, preserved round-trip
    pub editor_position: Vec2,
}

impl AnimationState {
    pub fn new(name: impl Into<String>, animation_clip: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            animation_clip: animation_clip.into(),
            speed: 1.0,
            looping: true,
            editor_position: Vec2::ZERO,
        }
    }
}

/// A directed edge between two states in the same layer
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub id: Uuid,
    pub from_state: String,
    pub to_state: String,
    /// Evaluated in declaration order; all must hold
    pub conditions: Vec<TransitionCondition>,
    /// Cross-fade duration in seconds
    pub transition_duration: f32,
    /// Normalised exit threshold in [0, 1]
    pub exit_time: f32,
    pub has_exit_time: bool,
    pub can_transition_to_self: bool,
}

impl StateTransition {
    pub fn new(from_state: impl Into<String>, to_state: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_state: from_state.into(),
            to_state: to_state.into(),
            conditions: Vec::new(),
            transition_duration: 0.25,
            exit_time: 1.0,
            has_exit_time: false,
            can_transition_to_self: false,
        }
    }

    /// Builder-style: append a condition.
    pub fn with_condition(mut self, condition: TransitionCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Builder-style: set the cross-fade duration.
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.transition_duration = seconds;
        self
    }

    /// Builder-style: gate on a normalised exit time.
    pub fn with_exit_time(mut self, exit_time: f32) -> Self {
        self.exit_time = exit_time;
        self.has_exit_time = true;
        self
    }
}

/// An independently evaluated sub-state-machine
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachineLayer {
    pub name: String,
    /// Blend weight in [0, 1]
    pub weight: f32,
    pub additive: bool,
    /// Name of the state entered on bind; empty for none
    pub default_state: String,
    pub states: Vec<AnimationState>,
    pub transitions: Vec<StateTransition>,
}

impl StateMachineLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 1.0,
            additive: false,
            default_state: String::new(),
            states: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Find a state by name.
    pub fn state(&self, name: &str) -> Option<&AnimationState> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Transitions leaving `state_name`, in declaration order.
    pub fn transitions_from<'a>(
        &'a self,
        state_name: &'a str,
    ) -> impl Iterator<Item = &'a StateTransition> {
        self.transitions
            .iter()
            .filter(move |t| t.from_state == state_name)
    }

    /// Transitions entering `state_name`, in declaration order.
    pub fn transitions_to<'a>(
        &'a self,
        state_name: &'a str,
    ) -> impl Iterator<Item = &'a StateTransition> {
        self.transitions
            .iter()
            .filter(move |t| t.to_state == state_name)
    }
}

/// State machine animation resource (`.statemachine` files)
///
/// Name-keyed maps preserve insertion order, which defines layer evaluation
/// order at runtime and keeps save/load round-trips stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateMachineResource {
    parameters: IndexMap<String, AnimationParameter>,
    layers: IndexMap<String, StateMachineLayer>,
}

impl StateMachineResource {
    pub fn new() -> Self {
        Self::default()
    }

    // Parameter management

    /// Register a parameter declaration.
    ///
    /// Fails with [`AnimationError::KindMismatch`] when the default value's
    /// kind disagrees with the declared kind.
    pub fn add_parameter(&mut self, parameter: AnimationParameter) -> AnimationResult<()> {
        if parameter.default_value.kind() != parameter.kind {
            return Err(AnimationError::KindMismatch {
                parameter: parameter.name,
            });
        }
        self.parameters.insert(parameter.name.clone(), parameter);
        Ok(())
    }

    pub fn remove_parameter(&mut self, name: &str) {
        self.parameters.shift_remove(name);
    }

    pub fn parameter(&self, name: &str) -> Option<&AnimationParameter> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &AnimationParameter> {
        self.parameters.values()
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    // Layer management

    pub fn add_layer(&mut self, layer: StateMachineLayer) {
        self.layers.insert(layer.name.clone(), layer);
    }

    pub fn remove_layer(&mut self, name: &str) {
        self.layers.shift_remove(name);
    }

    pub fn layer(&self, name: &str) -> Option<&StateMachineLayer> {
        self.layers.get(name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut StateMachineLayer> {
        self.layers.get_mut(name)
    }

    pub fn layers(&self) -> impl Iterator<Item = &StateMachineLayer> {
        self.layers.values()
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer by evaluation-order index.
    pub fn layer_at(&self, index: usize) -> Option<&StateMachineLayer> {
        self.layers.get_index(index).map(|(_, layer)| layer)
    }

    /// Evaluation-order index of a layer.
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.get_index_of(name)
    }

    // State management

    pub fn add_state(&mut self, layer_name: &str, state: AnimationState) -> AnimationResult<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| AnimationError::unknown("layer", layer_name))?;
        layer.states.push(state);
        Ok(())
    }

    /// Remove a state and every transition touching it.
    pub fn remove_state(&mut self, layer_name: &str, state_name: &str) -> AnimationResult<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| AnimationError::unknown("layer", layer_name))?;
        layer.states.retain(|s| s.name != state_name);
        layer
            .transitions
            .retain(|t| t.from_state != state_name && t.to_state != state_name);
        if layer.default_state == state_name {
            layer.default_state.clear();
        }
        Ok(())
    }

    pub fn state(&self, layer_name: &str, state_name: &str) -> Option<&AnimationState> {
        self.layers.get(layer_name)?.state(state_name)
    }

    // Transition management

    /// Add a transition; both endpoints must name states in the layer.
    pub fn add_transition(
        &mut self,
        layer_name: &str,
        transition: StateTransition,
    ) -> AnimationResult<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| AnimationError::unknown("layer", layer_name))?;
        if layer.state(&transition.from_state).is_none() {
            return Err(AnimationError::unknown("state", &transition.from_state));
        }
        if layer.state(&transition.to_state).is_none() {
            return Err(AnimationError::unknown("state", &transition.to_state));
        }
        layer.transitions.push(transition);
        Ok(())
    }

    pub fn remove_transition(&mut self, layer_name: &str, id: &Uuid) -> AnimationResult<()> {
        let layer = self
            .layers
            .get_mut(layer_name)
            .ok_or_else(|| AnimationError::unknown("layer", layer_name))?;
        layer.transitions.retain(|t| t.id != *id);
        Ok(())
    }

    pub fn transition(&self, layer_name: &str, id: &Uuid) -> Option<&StateTransition> {
        self.layers
            .get(layer_name)?
            .transitions
            .iter()
            .find(|t| t.id == *id)
    }

    /// Transitions leaving a state, in declaration order.
    pub fn transitions_from<'a>(
        &'a self,
        layer_name: &str,
        state_name: &'a str,
    ) -> impl Iterator<Item = &'a StateTransition> {
        self.layers
            .get(layer_name)
            .into_iter()
            .flat_map(move |layer| layer.transitions_from(state_name))
    }

    /// Transitions entering a state, in declaration order.
    pub fn transitions_to<'a>(
        &'a self,
        layer_name: &str,
        state_name: &'a str,
    ) -> impl Iterator<Item = &'a StateTransition> {
        self.layers
            .get(layer_name)
            .into_iter()
            .flat_map(move |layer| layer.transitions_to(state_name))
    }

    // Serialization

    /// Serialise to the versioned JSON document format.
    pub fn to_json(&self) -> AnimationResult<String> {
        let parameters: Vec<Value> = self
            .parameters
            .values()
            .map(|param| {
                json!({
                    "name": param.name,
                    "type": param.kind.code(),
                    "default_value": parameter_value_to_json(param.default_value),
                })
            })
            .collect();

        let layers: Vec<Value> = self
            .layers
            .values()
            .map(|layer| {
                let states: Vec<Value> = layer
                    .states
                    .iter()
                    .map(|state| {
                        json!({
                            "id": state.id.to_string(),
                            "name": state.name,
                            "animation_clip": state.animation_clip,
                            "speed": state.speed,
                            "looping": state.looping,
                            "position": [state.editor_position.x, state.editor_position.y],
                        })
                    })
                    .collect();

                let transitions: Vec<Value> = layer
                    .transitions
                    .iter()
                    .map(|transition| {
                        let conditions: Vec<Value> = transition
                            .conditions
                            .iter()
                            .map(|condition| {
                                json!({
                                    "parameter_name": condition.parameter_name,
                                    "operator": condition.operator.code(),
                                    "value": parameter_value_to_json(condition.value),
                                })
                            })
                            .collect();
                        json!({
                            "id": transition.id.to_string(),
                            "from_state": transition.from_state,
                            "to_state": transition.to_state,
                            "transition_duration": transition.transition_duration,
                            "exit_time": transition.exit_time,
                            "has_exit_time": transition.has_exit_time,
                            "can_transition_to_self": transition.can_transition_to_self,
                            "conditions": conditions,
                        })
                    })
                    .collect();

                json!({
                    "name": layer.name,
                    "weight": layer.weight,
                    "additive": layer.additive,
                    "default_state": layer.default_state,
                    "states": states,
                    "transitions": transitions,
                })
            })
            .collect();

        let document = json!({
            "type": STATE_MACHINE_DOC_TYPE,
            "version": FORMAT_VERSION,
            "parameters": parameters,
            "layers": layers,
        });
        pretty_print(&document)
    }

    /// Parse the versioned JSON document format.
    ///
    /// Unknown fields are ignored. Missing optional fields take their
    /// documented defaults. A wrong document `type`, an unknown kind or
    /// operator code, or a malformed payload fails with
    /// [`AnimationError::InvalidFormat`]. Conditions referencing an unknown
    /// parameter are dropped with a warning; a `default_state` naming a
    /// missing state is cleared with a warning.
    pub fn from_json(data: &str) -> AnimationResult<Self> {
        let raw: RawStateMachineDoc = serde_json::from_str(data)
            .map_err(|e| AnimationError::InvalidFormat(e.to_string()))?;

        if raw.doc_type != STATE_MACHINE_DOC_TYPE {
            return Err(AnimationError::InvalidFormat(format!(
                "expected document type \"{STATE_MACHINE_DOC_TYPE}\", found \"{}\"",
                raw.doc_type
            )));
        }

        let mut resource = Self::new();

        for raw_param in raw.parameters {
            let kind = ParameterKind::from_code(raw_param.kind).ok_or_else(|| {
                AnimationError::InvalidFormat(format!(
                    "unknown parameter type code {} for \"{}\"",
                    raw_param.kind, raw_param.name
                ))
            })?;
            let default_value = parameter_value_from_json(kind, &raw_param.default_value)
                .ok_or_else(|| {
                    AnimationError::InvalidFormat(format!(
                        "malformed default value for parameter \"{}\"",
                        raw_param.name
                    ))
                })?;
            resource.parameters.insert(
                raw_param.name.clone(),
                AnimationParameter {
                    name: raw_param.name,
                    kind,
                    default_value,
                },
            );
        }

        for raw_layer in raw.layers {
            let mut layer = StateMachineLayer::new(raw_layer.name);
            layer.weight = raw_layer.weight;
            layer.additive = raw_layer.additive;
            layer.default_state = raw_layer.default_state;

            for raw_state in raw_layer.states {
                let position = raw_state.position;
                layer.states.push(AnimationState {
                    id: parse_uuid(raw_state.id.as_deref())?,
                    name: raw_state.name,
                    animation_clip: raw_state.animation_clip,
                    speed: raw_state.speed,
                    looping: raw_state.looping,
                    editor_position: Vec2::new(position[0], position[1]),
                });
            }

            for raw_transition in raw_layer.transitions {
                let mut conditions = Vec::with_capacity(raw_transition.conditions.len());
                for raw_condition in raw_transition.conditions {
                    let Some(parameter) = resource.parameters.get(&raw_condition.parameter_name)
                    else {
                        warn!(
                            "dropping condition on unknown parameter \"{}\" ({} -> {})",
                            raw_condition.parameter_name,
                            raw_transition.from_state,
                            raw_transition.to_state
                        );
                        continue;
                    };
                    let operator =
                        ComparisonOperator::from_code(raw_condition.operator).ok_or_else(
                            || {
                                AnimationError::InvalidFormat(format!(
                                    "unknown operator code {} in condition on \"{}\"",
                                    raw_condition.operator, raw_condition.parameter_name
                                ))
                            },
                        )?;
                    let value = parameter_value_from_json(parameter.kind, &raw_condition.value)
                        .ok_or_else(|| {
                            AnimationError::InvalidFormat(format!(
                                "malformed condition value for parameter \"{}\"",
                                raw_condition.parameter_name
                            ))
                        })?;
                    conditions.push(TransitionCondition {
                        parameter_name: raw_condition.parameter_name,
                        operator,
                        value,
                    });
                }

                layer.transitions.push(StateTransition {
                    id: parse_uuid(raw_transition.id.as_deref())?,
                    from_state: raw_transition.from_state,
                    to_state: raw_transition.to_state,
                    conditions,
                    transition_duration: raw_transition.transition_duration,
                    exit_time: raw_transition.exit_time,
                    has_exit_time: raw_transition.has_exit_time,
                    can_transition_to_self: raw_transition.can_transition_to_self,
                });
            }

            if !layer.default_state.is_empty() && layer.state(&layer.default_state).is_none() {
                warn!(
                    "layer \"{}\": default state \"{}\" does not exist, clearing",
                    layer.name, layer.default_state
                );
                layer.default_state.clear();
            }

            resource.layers.insert(layer.name.clone(), layer);
        }

        Ok(resource)
    }

    /// Save to a `.statemachine` file, pretty-printed.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> AnimationResult<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load from a `.statemachine` file.
    pub fn load_from_file(path: impl AsRef<Path>) -> AnimationResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnimationError::FileNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

/// Pretty-print a JSON document with four-space indentation.
pub(crate) fn pretty_print(document: &Value) -> AnimationResult<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(document, &mut serializer)
        .map_err(|e| AnimationError::InvalidFormat(e.to_string()))?;
    String::from_utf8(out).map_err(|e| AnimationError::InvalidFormat(e.to_string()))
}

fn parse_uuid(id: Option<&str>) -> AnimationResult<Uuid> {
    match id {
        None => Ok(Uuid::new_v4()),
        Some(s) => {
            Uuid::parse_str(s).map_err(|_| AnimationError::InvalidFormat(format!("bad UUID: {s}")))
        }
    }
}

fn parameter_value_to_json(value: ParameterValue) -> Value {
    match value {
        ParameterValue::Bool(v) | ParameterValue::Trigger(v) => Value::from(v),
        ParameterValue::Int(v) => Value::from(v),
        ParameterValue::Float(v) => Value::from(v),
    }
}

/// Coerce a raw JSON payload into a value of the given kind.
///
/// `null` (the serde default for a missing field) takes the kind's default.
fn parameter_value_from_json(kind: ParameterKind, value: &Value) -> Option<ParameterValue> {
    if value.is_null() {
        return Some(ParameterValue::default_for(kind));
    }
    match kind {
        ParameterKind::Bool => value.as_bool().map(ParameterValue::Bool),
        ParameterKind::Trigger => value.as_bool().map(ParameterValue::Trigger),
        ParameterKind::Int => value
            .as_i64()
            .map(|v| ParameterValue::Int(v as i32)),
        ParameterKind::Float => value
            .as_f64()
            .map(|v| ParameterValue::Float(v as f32)),
    }
}

// Raw document shapes. Serde ignores unknown fields by default, which gives
// the documented forward-compatibility for free.

#[derive(Deserialize)]
struct RawStateMachineDoc {
    #[serde(rename = "type")]
    doc_type: String,
    #[serde(default)]
    parameters: Vec<RawParameter>,
    #[serde(default)]
    layers: Vec<RawLayer>,
}

#[derive(Deserialize)]
struct RawParameter {
    name: String,
    #[serde(rename = "type")]
    kind: i64,
    #[serde(default)]
    default_value: Value,
}

#[derive(Deserialize)]
struct RawLayer {
    name: String,
    #[serde(default = "default_weight")]
    weight: f32,
    #[serde(default)]
    additive: bool,
    #[serde(default)]
    default_state: String,
    #[serde(default)]
    states: Vec<RawState>,
    #[serde(default)]
    transitions: Vec<RawTransition>,
}

#[derive(Deserialize)]
struct RawState {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    animation_clip: String,
    #[serde(default = "default_speed")]
    speed: f32,
    #[serde(default = "default_looping")]
    looping: bool,
    #[serde(default)]
    position: [f32; 2],
}

#[derive(Deserialize)]
struct RawTransition {
    #[serde(default)]
    id: Option<String>,
    from_state: String,
    to_state: String,
    #[serde(default = "default_transition_duration")]
    transition_duration: f32,
    #[serde(default = "default_exit_time")]
    exit_time: f32,
    #[serde(default)]
    has_exit_time: bool,
    #[serde(default)]
    can_transition_to_self: bool,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

#[derive(Deserialize)]
struct RawCondition {
    parameter_name: String,
    operator: i64,
    #[serde(default)]
    value: Value,
}

fn default_weight() -> f32 {
    1.0
}

fn default_speed() -> f32 {
    1.0
}

fn default_looping() -> bool {
    true
}

fn default_transition_duration() -> f32 {
    0.25
}

fn default_exit_time() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_resource() -> StateMachineResource {
        let mut resource = StateMachineResource::new();
        resource
            .add_parameter(AnimationParameter::new("Speed", ParameterKind::Float))
            .unwrap();

        let mut layer = StateMachineLayer::new("Base Layer");
        layer.default_state = String::from("Idle");
        resource.add_layer(layer);
        resource
            .add_state("Base Layer", AnimationState::new("Idle", "idle"))
            .unwrap();
        resource
            .add_state("Base Layer", AnimationState::new("Run", "run"))
            .unwrap();
        resource
            .add_transition(
                "Base Layer",
                StateTransition::new("Idle", "Run").with_condition(TransitionCondition::new(
                    "Speed",
                    ComparisonOperator::Gt,
                    ParameterValue::Float(0.1),
                )),
            )
            .unwrap();
        resource
    }

    #[test]
    fn test_round_trip() {
        let resource = two_state_resource();
        let json = resource.to_json().unwrap();
        let loaded = StateMachineResource::from_json(&json).unwrap();
        assert_eq!(resource, loaded);
    }

    #[test]
    fn test_wrong_doc_type_fails() {
        let err = StateMachineResource::from_json(r#"{"type":"SpriteAnimation"}"#).unwrap_err();
        assert!(matches!(err, AnimationError::InvalidFormat(_)));
    }

    #[test]
    fn test_unknown_kind_code_fails() {
        let doc = r#"{"type":"StateMachine","parameters":[{"name":"X","type":9}],"layers":[]}"#;
        let err = StateMachineResource::from_json(doc).unwrap_err();
        assert!(matches!(err, AnimationError::InvalidFormat(_)));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let doc = r#"{
            "type": "StateMachine",
            "layers": [{
                "name": "L",
                "states": [{"name": "A"}],
                "transitions": [{"from_state": "A", "to_state": "A"}]
            }]
        }"#;
        let resource = StateMachineResource::from_json(doc).unwrap();
        let layer = resource.layer("L").unwrap();
        assert_eq!(layer.weight, 1.0);
        assert!(!layer.additive);
        let state = layer.state("A").unwrap();
        assert_eq!(state.speed, 1.0);
        assert!(state.looping);
        assert_eq!(state.animation_clip, "");
        let transition = &layer.transitions[0];
        assert_eq!(transition.transition_duration, 0.25);
        assert_eq!(transition.exit_time, 1.0);
        assert!(!transition.has_exit_time);
        assert!(!transition.can_transition_to_self);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let doc = r#"{
            "type": "StateMachine",
            "editor_metadata": {"zoom": 2.0},
            "parameters": [],
            "layers": [{"name": "L", "grid_snap": true, "states": [], "transitions": []}]
        }"#;
        let resource = StateMachineResource::from_json(doc).unwrap();
        assert!(resource.layer("L").is_some());
    }

    #[test]
    fn test_condition_on_unknown_parameter_dropped() {
        let doc = r#"{
            "type": "StateMachine",
            "parameters": [],
            "layers": [{
                "name": "L",
                "states": [{"name": "A"}, {"name": "B"}],
                "transitions": [{
                    "from_state": "A", "to_state": "B",
                    "conditions": [{"parameter_name": "Ghost", "operator": 0, "value": true}]
                }]
            }]
        }"#;
        let resource = StateMachineResource::from_json(doc).unwrap();
        assert!(resource.layer("L").unwrap().transitions[0].conditions.is_empty());
    }

    #[test]
    fn test_dangling_default_state_cleared() {
        let doc = r#"{
            "type": "StateMachine",
            "parameters": [],
            "layers": [{"name": "L", "default_state": "Nope", "states": [], "transitions": []}]
        }"#;
        let resource = StateMachineResource::from_json(doc).unwrap();
        assert_eq!(resource.layer("L").unwrap().default_state, "");
    }

    #[test]
    fn test_condition_value_typed_from_parameter() {
        let doc = r#"{
            "type": "StateMachine",
            "parameters": [{"name": "Hits", "type": 1, "default_value": 0}],
            "layers": [{
                "name": "L",
                "states": [{"name": "A"}, {"name": "B"}],
                "transitions": [{
                    "from_state": "A", "to_state": "B",
                    "conditions": [{"parameter_name": "Hits", "operator": 3, "value": 2}]
                }]
            }]
        }"#;
        let resource = StateMachineResource::from_json(doc).unwrap();
        let condition = &resource.layer("L").unwrap().transitions[0].conditions[0];
        assert_eq!(condition.value, ParameterValue::Int(2));
        assert_eq!(condition.operator, ComparisonOperator::Ge);
    }

    #[test]
    fn test_add_parameter_kind_mismatch() {
        let mut resource = StateMachineResource::new();
        let parameter = AnimationParameter {
            name: String::from("Broken"),
            kind: ParameterKind::Int,
            default_value: ParameterValue::Bool(true),
        };
        let err = resource.add_parameter(parameter).unwrap_err();
        assert!(matches!(err, AnimationError::KindMismatch { .. }));
    }

    #[test]
    fn test_remove_state_removes_touching_transitions() {
        let mut resource = two_state_resource();
        resource.remove_state("Base Layer", "Run").unwrap();
        let layer = resource.layer("Base Layer").unwrap();
        assert!(layer.state("Run").is_none());
        assert!(layer.transitions.is_empty());
    }

    #[test]
    fn test_add_transition_validates_endpoints() {
        let mut resource = two_state_resource();
        let err = resource
            .add_transition("Base Layer", StateTransition::new("Idle", "Nope"))
            .unwrap_err();
        assert!(matches!(err, AnimationError::ReferenceError { .. }));
    }

    #[test]
    fn test_save_emits_version_and_type() {
        let resource = two_state_resource();
        let json = resource.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "StateMachine");
        assert_eq!(value["version"], "1.0");
        // Four-space indentation.
        assert!(json.contains("\n    \"type\""));
    }
}
