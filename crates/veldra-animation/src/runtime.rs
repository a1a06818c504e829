//! State machine runtime
//!
//! Per-instance execution of a shared [`StateMachineResource`]: the typed
//! parameter store, the transition predicate, and the per-layer advancement
//! that drives cross-fades.
//!
//! Single-threaded per instance: `update`, setters, and queries belong to
//! one owner task and the runtime performs no internal locking. Separate
//! instances sharing one resource may run on different threads.

use std::cell::RefCell;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;
use log::warn;
use smallvec::SmallVec;

use crate::machine::{StateMachineResource, StateTransition};
use crate::value::ParameterValue;

/// Supplies clip durations to the runtime
///
/// Implemented by whoever owns the actual clip data; the [`Animator`]
/// implements it over its attached resources. A return of `0.0` means the
/// duration is unknown, in which case exit-time gating falls back to
/// comparing raw elapsed seconds against the normalised threshold.
///
/// [`Animator`]: crate::animator::Animator
pub trait ClipDurationProvider {
    /// Total duration of the named clip in seconds; 0.0 when unknown.
    fn duration_of(&self, clip: &str) -> f32;
}

/// Adapter exposing a plain function as a [`ClipDurationProvider`]
pub struct FnDurationProvider<F>(pub F);

impl<F> ClipDurationProvider for FnDurationProvider<F>
where
    F: Fn(&str) -> f32,
{
    fn duration_of(&self, clip: &str) -> f32 {
        (self.0)(clip)
    }
}

/// Name-keyed parameter values mirroring a resource's declarations
///
/// Setters are no-ops when the name is unknown or the kind disagrees, so a
/// misconfigured caller can never corrupt the store.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: AHashMap<String, ParameterValue>,
}

impl ParameterStore {
    /// Seed the store with every declared parameter's default value.
    pub fn from_resource(resource: &StateMachineResource) -> Self {
        let values = resource
            .parameters()
            .map(|p| (p.name.clone(), p.default_value))
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.values.get(name).copied()
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        if let Some(slot @ ParameterValue::Bool(_)) = self.values.get_mut(name) {
            *slot = ParameterValue::Bool(value);
        }
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        if let Some(slot @ ParameterValue::Int(_)) = self.values.get_mut(name) {
            *slot = ParameterValue::Int(value);
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        if let Some(slot @ ParameterValue::Float(_)) = self.values.get_mut(name) {
            *slot = ParameterValue::Float(value);
        }
    }

    /// Raise a trigger; it stays raised until the end of the next update.
    pub fn set_trigger(&mut self, name: &str) {
        if let Some(slot @ ParameterValue::Trigger(_)) = self.values.get_mut(name) {
            *slot = ParameterValue::Trigger(true);
        }
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).and_then(ParameterValue::as_bool).unwrap_or(false)
    }

    pub fn get_int(&self, name: &str) -> i32 {
        self.get(name).and_then(ParameterValue::as_int).unwrap_or(0)
    }

    pub fn get_float(&self, name: &str) -> f32 {
        self.get(name).and_then(ParameterValue::as_float).unwrap_or(0.0)
    }

    /// Sweep every trigger back to false.
    pub fn reset_triggers(&mut self) {
        for value in self.values.values_mut() {
            if let ParameterValue::Trigger(raised) = value {
                *raised = false;
            }
        }
    }
}

/// Decide whether a transition may fire right now.
///
/// Pure: identical inputs give identical answers and nothing is mutated.
/// Triggers are not consumed here; the runtime sweeps them after the update.
///
/// The checks, in order:
/// 1. self-transitions are rejected unless explicitly allowed;
/// 2. with an exit-time gate, elapsed time normalised by the clip duration
///    (raw seconds when no positive duration is available) must reach
///    `exit_time`;
/// 3. every condition must hold, evaluated in declaration order; a condition
///    over a missing or kind-mismatched parameter is false.
pub fn can_fire(
    transition: &StateTransition,
    current_state: &str,
    params: &ParameterStore,
    elapsed_in_state: f32,
    clip_duration: Option<f32>,
) -> bool {
    if transition.to_state == current_state && !transition.can_transition_to_self {
        return false;
    }

    if transition.has_exit_time {
        let normalized = match clip_duration {
            Some(duration) if duration > 0.0 => elapsed_in_state / duration,
            _ => elapsed_in_state,
        };
        if normalized < transition.exit_time {
            return false;
        }
    }

    transition.conditions.iter().all(|condition| {
        params
            .get(&condition.parameter_name)
            .is_some_and(|value| value.compare(condition.operator, condition.value))
    })
}

/// Transient per-layer playback state
#[derive(Debug, Clone, Default)]
pub struct LayerRuntime {
    /// Name of the active state; empty when the layer has none
    pub current_state: String,
    /// Cross-fade target while transitioning
    pub next_state: Option<String>,
    /// Seconds spent in the current state
    pub elapsed_in_state: f32,
    /// Seconds into the in-flight cross-fade
    pub transition_elapsed: f32,
    /// Total cross-fade duration
    pub transition_total: f32,
    pub is_transitioning: bool,
    pub is_playing: bool,
}

/// One per-layer blend emitted by an update, with states as indices into the
/// resource (`layer` into the layer map, states into that layer's state list)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendOutput {
    pub layer: usize,
    pub from_state: usize,
    /// Present only while the layer is cross-fading
    pub to_state: Option<usize>,
    /// Cross-fade progress in [0, 1]; 0 outside a transition
    pub blend_t: f32,
    /// The layer's blend weight
    pub weight: f32,
    pub additive: bool,
}

/// The per-layer blend state visible through [`StateMachineRuntime::active_blend`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveBlend<'a> {
    /// Clip of the current state
    pub from_clip: &'a str,
    /// Clip of the cross-fade target, while transitioning
    pub to_clip: Option<&'a str>,
    /// Cross-fade progress in [0, 1]; 0 outside a transition
    pub blend_t: f32,
    pub layer_weight: f32,
    pub additive: bool,
}

/// Executes a state machine resource for one animated entity
///
/// Owns its parameter store and per-layer runtime state; shares the resource
/// immutably. Layer evaluation order is the resource's layer order,
/// transition evaluation order is declaration order, and the first eligible
/// transition wins.
pub struct StateMachineRuntime {
    resource: Arc<StateMachineResource>,
    parameters: ParameterStore,
    layers: IndexMap<String, LayerRuntime>,
    outputs: SmallVec<[BlendOutput; 4]>,
    warned: RefCell<AHashSet<String>>,
}

impl StateMachineRuntime {
    /// Bind a resource: every layer enters its default state with all times
    /// zero and playback stopped; parameters take their declared defaults.
    pub fn new(resource: Arc<StateMachineResource>) -> Self {
        let parameters = ParameterStore::from_resource(&resource);
        let layers = resource
            .layers()
            .map(|layer| {
                let runtime = LayerRuntime {
                    current_state: layer.default_state.clone(),
                    ..LayerRuntime::default()
                };
                (layer.name.clone(), runtime)
            })
            .collect();
        Self {
            resource,
            parameters,
            layers,
            outputs: SmallVec::new(),
            warned: RefCell::new(AHashSet::new()),
        }
    }

    pub fn resource(&self) -> &Arc<StateMachineResource> {
        &self.resource
    }

    // Parameter control

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.parameters.set_bool(name, value);
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.parameters.set_int(name, value);
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.parameters.set_float(name, value);
    }

    pub fn set_trigger(&mut self, name: &str) {
        self.parameters.set_trigger(name);
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.parameters.get_bool(name)
    }

    pub fn get_int(&self, name: &str) -> i32 {
        self.parameters.get_int(name)
    }

    pub fn get_float(&self, name: &str) -> f32 {
        self.parameters.get_float(name)
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    // Playback control

    /// Start playback on the named layer, or on every layer when `None`.
    /// Positions are preserved.
    pub fn play(&mut self, layer_name: Option<&str>) {
        match layer_name {
            None => {
                for runtime in self.layers.values_mut() {
                    runtime.is_playing = true;
                }
            }
            Some(name) => {
                if !self.layers.contains_key(name) {
                    self.warn_once("layer", name);
                } else if let Some(runtime) = self.layers.get_mut(name) {
                    runtime.is_playing = true;
                }
            }
        }
    }

    /// Stop every layer: playback off, in-flight transitions cleared,
    /// elapsed times reset. Current states are left in place.
    pub fn stop(&mut self) {
        for runtime in self.layers.values_mut() {
            runtime.is_playing = false;
            runtime.is_transitioning = false;
            runtime.next_state = None;
            runtime.elapsed_in_state = 0.0;
            runtime.transition_elapsed = 0.0;
            runtime.transition_total = 0.0;
        }
    }

    /// Halt playback on every layer without touching positions.
    pub fn pause(&mut self) {
        for runtime in self.layers.values_mut() {
            runtime.is_playing = false;
        }
    }

    /// Continue playback on every layer from where it paused.
    pub fn resume(&mut self) {
        for runtime in self.layers.values_mut() {
            runtime.is_playing = true;
        }
    }

    /// Force a layer directly into a state, bypassing transitions.
    pub fn play_state(&mut self, layer_name: &str, state_name: &str) {
        let Some(layer) = self.resource.layer(layer_name) else {
            self.warn_once("layer", layer_name);
            return;
        };
        if layer.state(state_name).is_none() {
            self.warn_once("state", state_name);
            return;
        }
        let Some(runtime) = self.layers.get_mut(layer_name) else {
            return;
        };
        runtime.current_state.clear();
        runtime.current_state.push_str(state_name);
        runtime.next_state = None;
        runtime.elapsed_in_state = 0.0;
        runtime.transition_elapsed = 0.0;
        runtime.transition_total = 0.0;
        runtime.is_transitioning = false;
        runtime.is_playing = true;
    }

    // Queries

    /// Runtime state of a layer; an empty name means the first layer.
    pub fn layer_runtime(&self, layer_name: &str) -> Option<&LayerRuntime> {
        if layer_name.is_empty() {
            self.layers.first().map(|(_, runtime)| runtime)
        } else {
            self.layers.get(layer_name)
        }
    }

    /// Runtime state of a layer by evaluation-order index.
    pub fn layer_runtime_at(&self, index: usize) -> Option<&LayerRuntime> {
        self.layers.get_index(index).map(|(_, runtime)| runtime)
    }

    /// Name of the active state; an empty layer name means the first layer.
    pub fn current_state(&self, layer_name: &str) -> Option<&str> {
        self.layer_runtime(layer_name)
            .map(|r| r.current_state.as_str())
    }

    /// Seconds spent in the active state.
    pub fn current_state_time(&self, layer_name: &str) -> f32 {
        self.layer_runtime(layer_name)
            .map(|r| r.elapsed_in_state)
            .unwrap_or(0.0)
    }

    /// Elapsed time in the active state divided by its clip duration.
    ///
    /// Falls back to raw elapsed seconds when the provider does not know the
    /// clip (returns 0.0 for it), matching the exit-time fallback.
    pub fn current_state_normalized_time(
        &self,
        layer_name: &str,
        durations: Option<&dyn ClipDurationProvider>,
    ) -> f32 {
        let Some(runtime) = self.layer_runtime(layer_name) else {
            return 0.0;
        };
        let duration = self
            .clip_of(layer_name, &runtime.current_state)
            .zip(durations)
            .map(|(clip, provider)| provider.duration_of(clip))
            .unwrap_or(0.0);
        if duration > 0.0 {
            runtime.elapsed_in_state / duration
        } else {
            runtime.elapsed_in_state
        }
    }

    pub fn is_in_transition(&self, layer_name: &str) -> bool {
        self.layer_runtime(layer_name)
            .map(|r| r.is_transitioning)
            .unwrap_or(false)
    }

    /// The layer's current blend: active clip, cross-fade target, and
    /// weights. `None` when the layer or its current state does not resolve.
    pub fn active_blend(&self, layer_name: &str) -> Option<ActiveBlend<'_>> {
        let (name, runtime) = if layer_name.is_empty() {
            self.layers.first()?
        } else {
            self.layers.get_key_value(layer_name)?
        };
        let layer = self.resource.layer(name)?;
        let from = layer.state(&runtime.current_state)?;
        let to_clip = if runtime.is_transitioning {
            runtime
                .next_state
                .as_deref()
                .and_then(|next| layer.state(next))
                .map(|s| s.animation_clip.as_str())
        } else {
            None
        };
        Some(ActiveBlend {
            from_clip: &from.animation_clip,
            to_clip,
            blend_t: blend_progress(runtime),
            layer_weight: layer.weight,
            additive: layer.additive,
        })
    }

    /// The blend entries emitted by the most recent update, one per playing
    /// layer whose current state resolves, in layer order.
    pub fn blend_outputs(&self) -> &[BlendOutput] {
        &self.outputs
    }

    /// Advance every playing layer by `dt` seconds.
    ///
    /// Transitioning layers accumulate cross-fade time and commit when it
    /// reaches the total (the committed state starts at zero next tick).
    /// Steady layers accumulate state time, then fire the first eligible
    /// transition in declaration order. A zero-duration transition commits
    /// on the following tick. After all layers, triggers are swept. Never
    /// fails; `dt` must be non-negative.
    pub fn update(&mut self, dt: f32, durations: Option<&dyn ClipDurationProvider>) {
        self.outputs.clear();

        for layer_index in 0..self.layers.len() {
            let Some(layer) = self.resource.layer_at(layer_index) else {
                continue;
            };
            let Some((_, runtime)) = self.layers.get_index_mut(layer_index) else {
                continue;
            };
            if !runtime.is_playing {
                continue;
            }

            if runtime.is_transitioning {
                runtime.transition_elapsed += dt;
                if runtime.transition_elapsed >= runtime.transition_total {
                    // Commit; the entered state starts at zero next tick so an
                    // overshooting dt is not double-counted.
                    runtime.current_state = runtime.next_state.take().unwrap_or_default();
                    runtime.elapsed_in_state = 0.0;
                    runtime.transition_elapsed = 0.0;
                    runtime.transition_total = 0.0;
                    runtime.is_transitioning = false;
                }
            } else {
                runtime.elapsed_in_state += dt;

                let clip_duration = layer
                    .state(&runtime.current_state)
                    .zip(durations)
                    .map(|(state, provider)| provider.duration_of(&state.animation_clip));
                for transition in layer.transitions_from(&runtime.current_state) {
                    if can_fire(
                        transition,
                        &runtime.current_state,
                        &self.parameters,
                        runtime.elapsed_in_state,
                        clip_duration,
                    ) {
                        runtime.next_state = Some(transition.to_state.clone());
                        runtime.transition_total = transition.transition_duration;
                        runtime.transition_elapsed = 0.0;
                        runtime.is_transitioning = true;
                        break;
                    }
                }
            }

            if let Some(from_state) = layer
                .states
                .iter()
                .position(|s| s.name == runtime.current_state)
            {
                let to_state = if runtime.is_transitioning {
                    runtime
                        .next_state
                        .as_deref()
                        .and_then(|next| layer.states.iter().position(|s| s.name == next))
                } else {
                    None
                };
                self.outputs.push(BlendOutput {
                    layer: layer_index,
                    from_state,
                    to_state,
                    blend_t: blend_progress(runtime),
                    weight: layer.weight,
                    additive: layer.additive,
                });
            }
        }

        self.parameters.reset_triggers();
    }

    fn clip_of(&self, layer_name: &str, state_name: &str) -> Option<&str> {
        let layer = if layer_name.is_empty() {
            self.resource.layers().next()?
        } else {
            self.resource.layer(layer_name)?
        };
        layer
            .state(state_name)
            .map(|state| state.animation_clip.as_str())
    }

    fn warn_once(&self, kind: &str, name: &str) {
        let key = format!("{kind}:{name}");
        if self.warned.borrow_mut().insert(key) {
            warn!("unknown {kind} \"{name}\"");
        }
    }
}

fn blend_progress(runtime: &LayerRuntime) -> f32 {
    if runtime.is_transitioning && runtime.transition_total > 0.0 {
        (runtime.transition_elapsed / runtime.transition_total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{
        AnimationParameter, AnimationState, StateMachineLayer, StateTransition,
        TransitionCondition,
    };
    use crate::value::{ComparisonOperator, ParameterKind};

    fn idle_run_resource() -> Arc<StateMachineResource> {
        let mut resource = StateMachineResource::new();
        resource
            .add_parameter(AnimationParameter::new("Speed", ParameterKind::Float))
            .unwrap();
        resource
            .add_parameter(AnimationParameter::new("Attack", ParameterKind::Trigger))
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
            .add_transition(
                "Base Layer",
                StateTransition::new("Run", "Idle").with_condition(TransitionCondition::new(
                    "Speed",
                    ComparisonOperator::Le,
                    ParameterValue::Float(0.1),
                )),
            )
            .unwrap();
        Arc::new(resource)
    }

    #[test]
    fn test_initialisation() {
        let runtime = StateMachineRuntime::new(idle_run_resource());
        assert_eq!(runtime.current_state(""), Some("Idle"));
        assert_eq!(runtime.current_state_time(""), 0.0);
        assert!(!runtime.is_in_transition(""));
        assert_eq!(runtime.get_float("Speed"), 0.0);
    }

    #[test]
    fn test_stopped_layer_does_not_advance() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.update(1.0, None);
        assert_eq!(runtime.current_state_time(""), 0.0);
    }

    #[test]
    fn test_float_gated_crossfade_progress() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.play(None);
        runtime.set_float("Speed", 1.0);
        runtime.update(0.0, None);
        runtime.update(0.10, None);

        assert!(runtime.is_in_transition(""));
        let blend = runtime.active_blend("").unwrap();
        assert_eq!(blend.from_clip, "idle");
        assert_eq!(blend.to_clip, Some("run"));
        assert!((blend.blend_t - 0.40).abs() < 1e-6);
    }

    #[test]
    fn test_crossfade_commits_and_reverses() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.play(None);
        runtime.set_float("Speed", 1.0);
        runtime.update(0.0, None);
        runtime.update(0.25, None);
        // Commit tick.
        runtime.update(0.0, None);
        assert_eq!(runtime.current_state(""), Some("Run"));
        assert!(!runtime.is_in_transition(""));
        assert_eq!(runtime.current_state_time(""), 0.0);

        runtime.set_float("Speed", 0.0);
        runtime.update(0.016, None);
        assert!(runtime.is_in_transition(""));
        assert_eq!(runtime.active_blend("").unwrap().to_clip, Some("idle"));
    }

    #[test]
    fn test_trigger_resets_after_update() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.play(None);
        runtime.set_trigger("Attack");
        assert!(runtime.get_bool("Attack"));
        runtime.update(0.016, None);
        assert!(!runtime.get_bool("Attack"));
    }

    #[test]
    fn test_setter_kind_mismatch_is_noop() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.set_bool("Speed", true);
        runtime.set_int("Speed", 3);
        assert_eq!(runtime.get_float("Speed"), 0.0);
        runtime.set_float("Ghost", 1.0);
        assert_eq!(runtime.get_float("Ghost"), 0.0);
    }

    #[test]
    fn test_unconditional_transition_fires_immediately() {
        let mut resource = StateMachineResource::new();
        let mut layer = StateMachineLayer::new("L");
        layer.default_state = String::from("A");
        resource.add_layer(layer);
        resource.add_state("L", AnimationState::new("A", "a")).unwrap();
        resource.add_state("L", AnimationState::new("B", "b")).unwrap();
        resource
            .add_transition("L", StateTransition::new("A", "B").with_duration(0.0))
            .unwrap();

        let mut runtime = StateMachineRuntime::new(Arc::new(resource));
        runtime.play(None);
        runtime.update(0.016, None);
        assert!(runtime.is_in_transition("L"));
        // Zero-duration cross-fade commits on the following tick.
        runtime.update(0.0, None);
        assert_eq!(runtime.current_state("L"), Some("B"));
    }

    #[test]
    fn test_first_declared_transition_wins() {
        let mut resource = StateMachineResource::new();
        let mut layer = StateMachineLayer::new("L");
        layer.default_state = String::from("A");
        resource.add_layer(layer);
        for (name, clip) in [("A", "a"), ("B", "b"), ("C", "c")] {
            resource.add_state("L", AnimationState::new(name, clip)).unwrap();
        }
        resource
            .add_transition("L", StateTransition::new("A", "B").with_duration(0.0))
            .unwrap();
        resource
            .add_transition("L", StateTransition::new("A", "C").with_duration(0.0))
            .unwrap();

        let mut runtime = StateMachineRuntime::new(Arc::new(resource));
        runtime.play(None);
        runtime.update(0.016, None);
        runtime.update(0.0, None);
        assert_eq!(runtime.current_state("L"), Some("B"));
    }

    #[test]
    fn test_exit_time_gate() {
        let mut resource = StateMachineResource::new();
        let mut layer = StateMachineLayer::new("L");
        layer.default_state = String::from("Jump");
        resource.add_layer(layer);
        resource
            .add_state("L", AnimationState::new("Jump", "jump"))
            .unwrap();
        resource
            .add_state("L", AnimationState::new("Land", "land"))
            .unwrap();
        resource
            .add_transition(
                "L",
                StateTransition::new("Jump", "Land")
                    .with_exit_time(0.75)
                    .with_duration(0.0),
            )
            .unwrap();

        let durations = FnDurationProvider(|clip: &str| if clip == "jump" { 1.0 } else { 0.0 });
        let mut runtime = StateMachineRuntime::new(Arc::new(resource));
        runtime.play(None);

        runtime.update(0.7, Some(&durations));
        assert_eq!(runtime.current_state("L"), Some("Jump"));
        assert!(!runtime.is_in_transition("L"));

        runtime.update(0.1, Some(&durations));
        assert!(runtime.is_in_transition("L"));

        runtime.update(0.0, Some(&durations));
        assert_eq!(runtime.current_state("L"), Some("Land"));
    }

    #[test]
    fn test_exit_time_fallback_without_duration() {
        // With no known clip duration, elapsed seconds are compared against
        // the normalised threshold directly.
        let mut resource = StateMachineResource::new();
        let mut layer = StateMachineLayer::new("L");
        layer.default_state = String::from("A");
        resource.add_layer(layer);
        resource.add_state("L", AnimationState::new("A", "a")).unwrap();
        resource.add_state("L", AnimationState::new("B", "b")).unwrap();
        resource
            .add_transition(
                "L",
                StateTransition::new("A", "B").with_exit_time(0.5).with_duration(0.0),
            )
            .unwrap();

        let mut runtime = StateMachineRuntime::new(Arc::new(resource));
        runtime.play(None);
        runtime.update(0.4, None);
        assert!(!runtime.is_in_transition("L"));
        runtime.update(0.2, None);
        assert!(runtime.is_in_transition("L"));
    }

    #[test]
    fn test_predicate_is_pure() {
        let resource = idle_run_resource();
        let layer = resource.layer("Base Layer").unwrap();
        let transition = &layer.transitions[0];
        let mut params = ParameterStore::from_resource(&resource);
        params.set_float("Speed", 1.0);

        let first = can_fire(transition, "Idle", &params, 0.5, Some(1.0));
        let second = can_fire(transition, "Idle", &params, 0.5, Some(1.0));
        assert!(first && second);
        // The trigger is untouched by evaluation.
        assert_eq!(params.get("Attack"), Some(ParameterValue::Trigger(false)));
    }

    #[test]
    fn test_self_transition_blocked_by_default() {
        let mut resource = StateMachineResource::new();
        let mut layer = StateMachineLayer::new("L");
        layer.default_state = String::from("A");
        resource.add_layer(layer);
        resource.add_state("L", AnimationState::new("A", "a")).unwrap();
        resource
            .add_transition("L", StateTransition::new("A", "A").with_duration(0.0))
            .unwrap();

        let mut runtime = StateMachineRuntime::new(Arc::new(resource));
        runtime.play(None);
        runtime.update(0.016, None);
        assert!(!runtime.is_in_transition("L"));
    }

    #[test]
    fn test_stop_resets_times_keeps_state() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.play(None);
        runtime.set_float("Speed", 1.0);
        runtime.update(0.1, None);
        assert!(runtime.is_in_transition(""));

        runtime.stop();
        assert_eq!(runtime.current_state(""), Some("Idle"));
        assert_eq!(runtime.current_state_time(""), 0.0);
        assert!(!runtime.is_in_transition(""));

        // Paused layers hold position instead.
        runtime.set_float("Speed", 0.0);
        runtime.play(None);
        runtime.update(0.1, None);
        runtime.pause();
        let held = runtime.current_state_time("");
        runtime.update(0.5, None);
        assert_eq!(runtime.current_state_time(""), held);
        runtime.resume();
        runtime.update(0.1, None);
        assert!(runtime.current_state_time("") > held);
    }

    #[test]
    fn test_play_state_forces_state() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.play_state("Base Layer", "Run");
        assert_eq!(runtime.current_state(""), Some("Run"));
        assert_eq!(runtime.current_state_time(""), 0.0);

        // Unknown names leave the runtime untouched.
        runtime.play_state("Base Layer", "Ghost");
        assert_eq!(runtime.current_state(""), Some("Run"));
    }

    #[test]
    fn test_normalized_time() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.play(None);
        runtime.update(0.5, None);
        let durations = FnDurationProvider(|clip: &str| if clip == "idle" { 2.0 } else { 0.0 });
        let normalized = runtime.current_state_normalized_time("", Some(&durations));
        assert!((normalized - 0.25).abs() < 1e-6);
        // Unknown duration falls back to raw seconds.
        assert_eq!(runtime.current_state_normalized_time("", None), 0.5);
    }

    #[test]
    fn test_blend_outputs_indices() {
        let mut runtime = StateMachineRuntime::new(idle_run_resource());
        runtime.play(None);
        runtime.set_float("Speed", 1.0);
        runtime.update(0.0, None);
        runtime.update(0.1, None);

        let outputs = runtime.blend_outputs();
        assert_eq!(outputs.len(), 1);
        let output = outputs[0];
        assert_eq!(output.layer, 0);
        assert_eq!(output.from_state, 0);
        assert_eq!(output.to_state, Some(1));
        assert!((output.blend_t - 0.4).abs() < 1e-6);
        assert_eq!(output.weight, 1.0);
    }
}
