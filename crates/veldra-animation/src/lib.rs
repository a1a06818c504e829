//! # Veldra Animation
//!
//! Animation runtime for the Veldra engine.
//!
//! Two engines share one resource model and one update contract:
//! - **State machines**: layered graphs of states joined by
//!   parameter-conditioned transitions, cross-faded per layer
//!   (`.statemachine` files, [`StateMachineRuntime`])
//! - **Sprite animation**: timed frame sequences over a sprite atlas
//!   (`.spriteanim` files, [`SpriteCursor`])
//!
//! Property-track clips ([`PropertyAnimationClip`]) carry typed keyframes
//! for node properties; the [`Animator`] orchestrates all three against the
//! host's scene through the [`PropertyWriter`] collaborator.
//!
//! Everything is driven by `update(delta_time)` from the owner's task; the
//! runtime never locks, never blocks, and never fails mid-update. Authored
//! resources are JSON documents, immutable once loaded and shared between
//! instances via `Arc`.

pub mod animator;
pub mod clip;
pub mod error;
pub mod machine;
pub mod runtime;
pub mod sprite;
pub mod value;

pub use animator::{
    Animator, NodeHandle, NullPropertyWriter, PlaybackState, PropertyWriter, SpriteOutput,
};
pub use clip::{AnimationTrack, Keyframe, PropertyAnimationClip, PropertyAnimationResource};
pub use error::{AnimationError, AnimationResult};
pub use machine::{
    AnimationParameter, AnimationState, StateMachineLayer, StateMachineResource, StateTransition,
    TransitionCondition,
};
pub use runtime::{
    ActiveBlend, BlendOutput, ClipDurationProvider, FnDurationProvider, LayerRuntime,
    ParameterStore, StateMachineRuntime, can_fire,
};
pub use sprite::{SpriteAnimation, SpriteAnimationResource, SpriteCursor, SpriteFrame};
pub use value::{
    AnimationValue, Color, ComparisonOperator, FLOAT_EQ_TOLERANCE, InterpolationKind,
    ParameterKind, ParameterValue,
};
