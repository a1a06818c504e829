//! Animator orchestration
//!
//! The component a scene node owns: wires a state machine runtime to sprite
//! cursors and property-track sampling, and translates per-layer blend
//! outputs into renderer regions and property writes.
//!
//! The scene graph stays outside the core: node lookup and property
//! mutation go through the [`PropertyWriter`] collaborator, and the
//! animator itself answers clip-duration queries from its attached
//! resources.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use glam::Vec4;
use log::warn;
use smallvec::SmallVec;

use crate::clip::{PropertyAnimationClip, PropertyAnimationResource};
use crate::error::AnimationResult;
use crate::machine::{AnimationState, StateMachineResource};
use crate::runtime::{BlendOutput, ClipDurationProvider, StateMachineRuntime};
use crate::sprite::{SpriteAnimationResource, SpriteCursor};
use crate::value::AnimationValue;

/// Opaque handle to a scene node, minted by the property writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Applies blended property writes to scene nodes
///
/// Implemented by the host on top of its scene graph. `weight` is the blend
/// weight in [0, 1] the write should be applied with; `additive` is set for
/// additive layers and the writer decides how (or whether) to honour it.
/// The core never downgrades an additive write to a replace.
pub trait PropertyWriter {
    /// Resolve a node path to a handle; `None` when the path does not exist.
    fn resolve_node(&mut self, path: &str) -> Option<NodeHandle>;

    /// Apply a weighted write to one property of one node.
    fn set_property(
        &mut self,
        node: NodeHandle,
        property: &str,
        value: &AnimationValue,
        weight: f32,
        additive: bool,
    );

    /// Read a property back, if the node and property exist.
    fn get_property(&self, node: NodeHandle, property: &str) -> Option<AnimationValue>;
}

/// A property writer that resolves nothing and drops every write
///
/// Useful for sprite-only hosts that have no property tracks to apply.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPropertyWriter;

impl PropertyWriter for NullPropertyWriter {
    fn resolve_node(&mut self, _path: &str) -> Option<NodeHandle> {
        None
    }

    fn set_property(
        &mut self,
        _node: NodeHandle,
        _property: &str,
        _value: &AnimationValue,
        _weight: f32,
        _additive: bool,
    ) {
    }

    fn get_property(&self, _node: NodeHandle, _property: &str) -> Option<AnimationValue> {
        None
    }
}

/// Animator playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Per-layer sprite frame pair handed to the renderer
///
/// Outside a cross-fade `to_region` is `None` and `blend_t` is 0. During
/// one, the renderer may hard-cut to `to_region` at `blend_t >= 0.5` or
/// draw both with alphas `1 - blend_t` and `blend_t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteOutput {
    /// Layer index in evaluation order
    pub layer: usize,
    pub from_region: Vec4,
    pub to_region: Option<Vec4>,
    pub blend_t: f32,
    /// The layer's blend weight
    pub weight: f32,
    pub additive: bool,
}

/// Sprite cursor pair for one layer: the active clip and, during a
/// cross-fade, the target clip
#[derive(Debug, Clone, Default)]
struct LayerCursors {
    from: SpriteCursor,
    from_clip: String,
    to: SpriteCursor,
    to_clip: String,
}

/// Blend output plus the layer times sampling needs
#[derive(Debug, Clone, Copy)]
struct LayerBlendContext {
    output: BlendOutput,
    elapsed: f32,
    transition_elapsed: f32,
}

/// Duration lookup over the animator's attached resources
struct ResourceDurations<'a> {
    sprites: Option<&'a SpriteAnimationResource>,
    clips: Option<&'a PropertyAnimationResource>,
}

impl ClipDurationProvider for ResourceDurations<'_> {
    fn duration_of(&self, clip: &str) -> f32 {
        if let Some(animation) = self.sprites.and_then(|s| s.animation(clip)) {
            return animation.total_duration();
        }
        if let Some(clip) = self.clips.and_then(|c| c.clip(clip)) {
            return clip.duration;
        }
        0.0
    }
}

/// Drives state-machine animation for one scene node
///
/// Owns a [`StateMachineRuntime`] and per-layer sprite cursors, shares the
/// authored resources by handle, and pushes results to the renderer (via
/// [`Animator::sprite_outputs`]) and the scene graph (via the
/// [`PropertyWriter`] passed to [`Animator::update`]).
#[derive(Default)]
pub struct Animator {
    runtime: Option<StateMachineRuntime>,
    sprite_resource: Option<Arc<SpriteAnimationResource>>,
    property_resource: Option<Arc<PropertyAnimationResource>>,
    playback: PlaybackState,
    auto_play: bool,
    cursors: Vec<LayerCursors>,
    sprite_outputs: SmallVec<[SpriteOutput; 4]>,
    node_cache: AHashMap<String, Option<NodeHandle>>,
    warned: AHashSet<String>,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    // Resource wiring

    /// Bind a state machine resource, resetting all runtime state.
    pub fn set_state_machine(&mut self, resource: Arc<StateMachineResource>) {
        self.cursors.clear();
        self.cursors
            .resize_with(resource.layer_count(), Default::default);
        self.runtime = Some(StateMachineRuntime::new(resource));
        self.playback = PlaybackState::Stopped;
    }

    /// Load and bind a `.statemachine` file.
    pub fn load_state_machine(&mut self, path: impl AsRef<std::path::Path>) -> AnimationResult<()> {
        let resource = StateMachineResource::load_from_file(path)?;
        self.set_state_machine(Arc::new(resource));
        Ok(())
    }

    /// Bind the sprite animations the states refer to.
    pub fn set_sprite_animations(&mut self, resource: Arc<SpriteAnimationResource>) {
        self.sprite_resource = Some(resource);
        for cursors in &mut self.cursors {
            *cursors = LayerCursors::default();
        }
    }

    /// Load and bind a `.spriteanim` file.
    pub fn load_sprite_animations(
        &mut self,
        path: impl AsRef<std::path::Path>,
    ) -> AnimationResult<()> {
        let resource = SpriteAnimationResource::load_from_file(path)?;
        self.set_sprite_animations(Arc::new(resource));
        Ok(())
    }

    /// Bind the property clips the states refer to.
    pub fn set_property_animations(&mut self, resource: Arc<PropertyAnimationResource>) {
        self.property_resource = Some(resource);
    }

    /// Load and bind an `.anim` file.
    pub fn load_property_animations(
        &mut self,
        path: impl AsRef<std::path::Path>,
    ) -> AnimationResult<()> {
        let resource = PropertyAnimationResource::load_from_file(path)?;
        self.set_property_animations(Arc::new(resource));
        Ok(())
    }

    pub fn runtime(&self) -> Option<&StateMachineRuntime> {
        self.runtime.as_ref()
    }

    pub fn runtime_mut(&mut self) -> Option<&mut StateMachineRuntime> {
        self.runtime.as_mut()
    }

    /// Forget cached node resolutions, e.g. after the host rebuilds its
    /// scene tree.
    pub fn clear_node_cache(&mut self) {
        self.node_cache.clear();
    }

    // Playback control

    /// When set, the first update starts playback by itself.
    pub fn set_auto_play(&mut self, auto_play: bool) {
        self.auto_play = auto_play;
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    pub fn play(&mut self) {
        self.playback = PlaybackState::Playing;
        if let Some(runtime) = &mut self.runtime {
            runtime.play(None);
        }
    }

    pub fn stop(&mut self) {
        self.playback = PlaybackState::Stopped;
        if let Some(runtime) = &mut self.runtime {
            runtime.stop();
        }
        for cursors in &mut self.cursors {
            *cursors = LayerCursors::default();
        }
        self.sprite_outputs.clear();
    }

    pub fn pause(&mut self) {
        if self.playback == PlaybackState::Playing {
            self.playback = PlaybackState::Paused;
            if let Some(runtime) = &mut self.runtime {
                runtime.pause();
            }
        }
    }

    pub fn resume(&mut self) {
        if self.playback == PlaybackState::Paused {
            self.playback = PlaybackState::Playing;
            if let Some(runtime) = &mut self.runtime {
                runtime.resume();
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.playback == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.playback == PlaybackState::Stopped
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
    }

    /// Force a layer directly into a state, bypassing transitions.
    pub fn play_state(&mut self, layer_name: &str, state_name: &str) {
        if let Some(runtime) = &mut self.runtime {
            runtime.play_state(layer_name, state_name);
        }
    }

    // Parameter control

    pub fn set_bool(&mut self, name: &str, value: bool) {
        if let Some(runtime) = &mut self.runtime {
            runtime.set_bool(name, value);
        }
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        if let Some(runtime) = &mut self.runtime {
            runtime.set_int(name, value);
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        if let Some(runtime) = &mut self.runtime {
            runtime.set_float(name, value);
        }
    }

    pub fn set_trigger(&mut self, name: &str) {
        if let Some(runtime) = &mut self.runtime {
            runtime.set_trigger(name);
        }
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.runtime.as_ref().is_some_and(|r| r.get_bool(name))
    }

    pub fn get_int(&self, name: &str) -> i32 {
        self.runtime.as_ref().map(|r| r.get_int(name)).unwrap_or(0)
    }

    pub fn get_float(&self, name: &str) -> f32 {
        self.runtime.as_ref().map(|r| r.get_float(name)).unwrap_or(0.0)
    }

    // State queries

    /// Name of the active state; an empty layer name means the first layer.
    pub fn current_state(&self, layer_name: &str) -> Option<&str> {
        self.runtime.as_ref()?.current_state(layer_name)
    }

    pub fn current_state_time(&self, layer_name: &str) -> f32 {
        self.runtime
            .as_ref()
            .map(|r| r.current_state_time(layer_name))
            .unwrap_or(0.0)
    }

    /// Elapsed time in the active state normalised by its clip duration,
    /// derived from the attached resources; raw seconds when unknown.
    pub fn current_state_normalized_time(&self, layer_name: &str) -> f32 {
        let Some(runtime) = self.runtime.as_ref() else {
            return 0.0;
        };
        let durations = ResourceDurations {
            sprites: self.sprite_resource.as_deref(),
            clips: self.property_resource.as_deref(),
        };
        runtime.current_state_normalized_time(layer_name, Some(&durations))
    }

    pub fn is_in_transition(&self, layer_name: &str) -> bool {
        self.runtime
            .as_ref()
            .is_some_and(|r| r.is_in_transition(layer_name))
    }

    /// State names of a layer, for tooling.
    pub fn available_states(&self, layer_name: &str) -> Vec<String> {
        self.runtime
            .as_ref()
            .and_then(|r| r.resource().layer(layer_name))
            .map(|layer| layer.states.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Declared parameter names, for tooling.
    pub fn available_parameters(&self) -> Vec<String> {
        self.runtime
            .as_ref()
            .map(|r| r.resource().parameter_names().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Layer names in evaluation order, for tooling.
    pub fn available_layers(&self) -> Vec<String> {
        self.runtime
            .as_ref()
            .map(|r| r.resource().layer_names().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// The per-layer sprite frames produced by the most recent update.
    pub fn sprite_outputs(&self) -> &[SpriteOutput] {
        &self.sprite_outputs
    }

    /// Advance the whole animation stack by `dt` seconds.
    ///
    /// Runs the state machine, keeps per-layer sprite cursors on the active
    /// (and, mid-fade, target) clips, publishes [`SpriteOutput`] entries,
    /// samples property tracks, and pushes weighted writes through `writer`.
    /// Never fails; resources that do not resolve degrade to no output for
    /// the affected layer.
    pub fn update(&mut self, dt: f32, writer: &mut dyn PropertyWriter) {
        if self.auto_play && self.playback == PlaybackState::Stopped {
            self.play();
        }
        if self.playback != PlaybackState::Playing {
            return;
        }

        let sprites = self.sprite_resource.clone();
        let clips = self.property_resource.clone();

        {
            let durations = ResourceDurations {
                sprites: sprites.as_deref(),
                clips: clips.as_deref(),
            };
            let Some(runtime) = self.runtime.as_mut() else {
                return;
            };
            runtime.update(dt, Some(&durations));
        }

        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };
        let resource = Arc::clone(runtime.resource());
        let mut contexts: SmallVec<[LayerBlendContext; 4]> = SmallVec::new();
        for output in runtime.blend_outputs() {
            let (elapsed, transition_elapsed) = runtime
                .layer_runtime_at(output.layer)
                .map(|r| (r.elapsed_in_state, r.transition_elapsed))
                .unwrap_or((0.0, 0.0));
            contexts.push(LayerBlendContext {
                output: *output,
                elapsed,
                transition_elapsed,
            });
        }

        if self.cursors.len() != resource.layer_count() {
            self.cursors
                .resize_with(resource.layer_count(), Default::default);
        }
        self.sprite_outputs.clear();

        for ctx in contexts {
            let Some(layer) = resource.layer_at(ctx.output.layer) else {
                continue;
            };
            let Some(from_state) = layer.states.get(ctx.output.from_state) else {
                continue;
            };
            let to_state = ctx.output.to_state.and_then(|i| layer.states.get(i));

            if let Some(sprites) = sprites.as_deref() {
                self.advance_sprites(sprites, dt, &ctx, from_state, to_state);
            }
            if let Some(clips) = clips.as_deref() {
                self.apply_property_tracks(clips, &ctx, from_state, to_state, writer);
            }
        }
    }

    /// Keep the layer's cursor pair on the right clips, advance them, and
    /// publish the frame pair.
    fn advance_sprites(
        &mut self,
        sprites: &SpriteAnimationResource,
        dt: f32,
        ctx: &LayerBlendContext,
        from_state: &AnimationState,
        to_state: Option<&AnimationState>,
    ) {
        let cursors = &mut self.cursors[ctx.output.layer];

        if from_state.animation_clip.is_empty() {
            *cursors = LayerCursors::default();
            return;
        }

        if cursors.from_clip != from_state.animation_clip {
            if cursors.to_clip == from_state.animation_clip {
                // A cross-fade just committed; the target cursor keeps its
                // position as the new active cursor.
                std::mem::swap(&mut cursors.from, &mut cursors.to);
                std::mem::swap(&mut cursors.from_clip, &mut cursors.to_clip);
            } else {
                cursors.from.set_animation(sprites, &from_state.animation_clip);
                cursors.from_clip.clone_from(&from_state.animation_clip);
            }
        }
        let from_region = cursors.from.advance(sprites, dt * from_state.speed);

        let to_region = to_state.and_then(|state| {
            if state.animation_clip.is_empty() {
                return None;
            }
            if cursors.to_clip != state.animation_clip {
                cursors.to.set_animation(sprites, &state.animation_clip);
                cursors.to_clip.clone_from(&state.animation_clip);
            }
            cursors.to.advance(sprites, dt * state.speed)
        });
        if to_state.is_none() {
            cursors.to_clip.clear();
        }

        if let Some(from_region) = from_region {
            self.sprite_outputs.push(SpriteOutput {
                layer: ctx.output.layer,
                from_region,
                to_region,
                blend_t: ctx.output.blend_t,
                weight: ctx.output.weight,
                additive: ctx.output.additive,
            });
        }
    }

    /// Sample the layer's clip (pair) and push weighted writes.
    fn apply_property_tracks(
        &mut self,
        clips: &PropertyAnimationResource,
        ctx: &LayerBlendContext,
        from_state: &AnimationState,
        to_state: Option<&AnimationState>,
        writer: &mut dyn PropertyWriter,
    ) {
        let t = ctx.output.blend_t;
        let layer_weight = ctx.output.weight;
        let additive = ctx.output.additive;

        let from_clip = self.lookup_clip(clips, &from_state.animation_clip);
        let to_pair = to_state.and_then(|state| {
            self.lookup_clip(clips, &state.animation_clip)
                .map(|clip| (clip, state))
        });

        match (from_clip, to_pair) {
            (Some(from), Some((to, to_state))) if t > 0.0 => {
                let from_time = from.wrap_time(ctx.elapsed * from_state.speed);
                let to_time = to.wrap_time(ctx.transition_elapsed * to_state.speed);
                for track in &from.tracks {
                    let Some(a) = track.sample(from_time) else {
                        continue;
                    };
                    let matching = to
                        .tracks
                        .iter()
                        .find(|other| {
                            other.target == track.target && other.property == track.property
                        })
                        .and_then(|other| other.sample(to_time));
                    match matching {
                        Some(b) => {
                            let value = AnimationValue::blend(&a, &b, t);
                            self.write(writer, &track.target, &track.property, &value,
                                layer_weight, additive);
                        }
                        None => {
                            self.write(writer, &track.target, &track.property, &a,
                                (1.0 - t) * layer_weight, additive);
                        }
                    }
                }
                // Tracks only the target clip animates fade in with t.
                for track in &to.tracks {
                    let covered = from.tracks.iter().any(|other| {
                        other.target == track.target && other.property == track.property
                    });
                    if covered {
                        continue;
                    }
                    if let Some(b) = track.sample(to_time) {
                        self.write(writer, &track.target, &track.property, &b,
                            t * layer_weight, additive);
                    }
                }
            }
            (Some(from), _) => {
                let from_time = from.wrap_time(ctx.elapsed * from_state.speed);
                for track in &from.tracks {
                    if let Some(value) = track.sample(from_time) {
                        self.write(writer, &track.target, &track.property, &value,
                            layer_weight, additive);
                    }
                }
            }
            (None, Some((to, to_state))) => {
                let to_time = to.wrap_time(ctx.transition_elapsed * to_state.speed);
                for track in &to.tracks {
                    if let Some(value) = track.sample(to_time) {
                        self.write(writer, &track.target, &track.property, &value,
                            t * layer_weight, additive);
                    }
                }
            }
            (None, None) => {}
        }
    }

    fn lookup_clip<'a>(
        &mut self,
        clips: &'a PropertyAnimationResource,
        name: &str,
    ) -> Option<&'a PropertyAnimationClip> {
        if name.is_empty() {
            return None;
        }
        let clip = clips.clip(name);
        if clip.is_none() && self.warned.insert(format!("clip:{name}")) {
            warn!("unknown animation clip \"{name}\"");
        }
        clip
    }

    /// Resolve the target node (cached) and apply the write. Unresolvable
    /// (path, property) pairs warn once and write nothing.
    fn write(
        &mut self,
        writer: &mut dyn PropertyWriter,
        path: &str,
        property: &str,
        value: &AnimationValue,
        weight: f32,
        additive: bool,
    ) {
        let node = match self.node_cache.get(path).copied() {
            Some(cached) => cached,
            None => {
                let resolved = writer.resolve_node(path);
                self.node_cache.insert(path.to_owned(), resolved);
                resolved
            }
        };
        match node {
            Some(node) => writer.set_property(node, property, value, weight, additive),
            None => {
                if self.warned.insert(format!("{path}/{property}")) {
                    warn!("no node at \"{path}\" for property \"{property}\", skipping writes");
                }
            }
        }
    }
}

impl ClipDurationProvider for Animator {
    /// Clip duration from the attached sprite (total frame time) or
    /// property (authored duration) resources; 0.0 when neither knows it.
    fn duration_of(&self, clip: &str) -> f32 {
        ResourceDurations {
            sprites: self.sprite_resource.as_deref(),
            clips: self.property_resource.as_deref(),
        }
        .duration_of(clip)
    }
}
