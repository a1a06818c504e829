//! Property animation clips
//!
//! Time-indexed tracks of typed keyframes targeting node properties, plus
//! the clip-map resource (`.anim` files) and the track sampler.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AnimationError, AnimationResult};
use crate::machine::pretty_print;
use crate::value::{AnimationValue, InterpolationKind};

/// Document `type` tag of a property animation file
pub const ANIMATION_DOC_TYPE: &str = "Animation";

/// A single keyframe on a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time in seconds, non-negative
    pub time: f32,
    pub value: AnimationValue,
    /// Curve applied on the segment leaving this key
    #[serde(default)]
    pub interpolation: InterpolationKind,
}

impl Keyframe {
    pub fn new(time: f32, value: AnimationValue) -> Self {
        Self {
            time,
            value,
            interpolation: InterpolationKind::Linear,
        }
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationKind) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// Keyframes for one property of one node
///
/// Keyframe times are strictly increasing; [`AnimationTrack::add_keyframe`]
/// maintains the order and load validates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationTrack {
    /// Path of the target node, resolved by the property writer
    pub target: String,
    /// Property name on the target node
    pub property: String,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

impl AnimationTrack {
    pub fn new(target: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            property: property.into(),
            keyframes: Vec::new(),
        }
    }

    /// Insert a keyframe at its sorted position.
    ///
    /// A keyframe at an already-present time replaces the existing one.
    pub fn add_keyframe(&mut self, keyframe: Keyframe) {
        match self
            .keyframes
            .binary_search_by(|k| k.time.total_cmp(&keyframe.time))
        {
            Ok(i) => self.keyframes[i] = keyframe,
            Err(i) => self.keyframes.insert(i, keyframe),
        }
    }

    /// Check the non-negative, strictly increasing time invariant.
    pub fn validate(&self) -> AnimationResult<()> {
        let mut previous = -1.0f32;
        for keyframe in &self.keyframes {
            if keyframe.time < 0.0 || !keyframe.time.is_finite() {
                return Err(AnimationError::InvalidFormat(format!(
                    "track \"{}/{}\": keyframe time {} out of range",
                    self.target, self.property, keyframe.time
                )));
            }
            if keyframe.time <= previous {
                return Err(AnimationError::InvalidFormat(format!(
                    "track \"{}/{}\": keyframe times must be strictly increasing",
                    self.target, self.property
                )));
            }
            previous = keyframe.time;
        }
        Ok(())
    }

    /// Sample the track at time `t`.
    ///
    /// Times before the first key clamp to the first value, times after the
    /// last clamp to the last (looping is the caller's wrap). Between two
    /// keys the left key's interpolation curve maps the segment position,
    /// then the two values blend by kind.
    pub fn sample(&self, t: f32) -> Option<AnimationValue> {
        let first = self.keyframes.first()?;
        if t <= first.time {
            return Some(first.value.clone());
        }
        let last = self.keyframes.last()?;
        if t >= last.time {
            return Some(last.value.clone());
        }

        // Index of the first key with time > t; the segment is [i-1, i].
        let i = self.keyframes.partition_point(|k| k.time <= t);
        let a = &self.keyframes[i - 1];
        let b = &self.keyframes[i];
        let u = (t - a.time) / (b.time - a.time);
        let u = a.interpolation.apply(u);
        Some(AnimationValue::blend(&a.value, &b.value, u))
    }
}

/// A named collection of tracks with a shared duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAnimationClip {
    pub name: String,
    /// Total duration in seconds, >= 0
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub looping: bool,
    #[serde(default)]
    pub tracks: Vec<AnimationTrack>,
}

impl PropertyAnimationClip {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            looping: false,
            tracks: Vec::new(),
        }
    }

    /// Map an unbounded playback time into this clip's domain.
    ///
    /// Looping clips wrap modulo the duration; non-looping clips clamp.
    pub fn wrap_time(&self, t: f32) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        if self.looping {
            t.rem_euclid(self.duration)
        } else {
            t.clamp(0.0, self.duration)
        }
    }
}

/// Property animation resource (`.anim` files): a name-keyed clip map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyAnimationResource {
    clips: IndexMap<String, PropertyAnimationClip>,
}

impl PropertyAnimationResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_clip(&mut self, clip: PropertyAnimationClip) {
        self.clips.insert(clip.name.clone(), clip);
    }

    pub fn remove_clip(&mut self, name: &str) {
        self.clips.shift_remove(name);
    }

    pub fn clip(&self, name: &str) -> Option<&PropertyAnimationClip> {
        self.clips.get(name)
    }

    pub fn clips(&self) -> impl Iterator<Item = &PropertyAnimationClip> {
        self.clips.values()
    }

    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }

    /// Serialise to the versioned JSON document format.
    pub fn to_json(&self) -> AnimationResult<String> {
        let clips = serde_json::to_value(self.clips.values().collect::<Vec<_>>())
            .map_err(|e| AnimationError::InvalidFormat(e.to_string()))?;
        let document = json!({
            "type": ANIMATION_DOC_TYPE,
            "version": crate::machine::FORMAT_VERSION,
            "clips": clips,
        });
        pretty_print(&document)
    }

    /// Parse the versioned JSON document format, validating track invariants.
    pub fn from_json(data: &str) -> AnimationResult<Self> {
        #[derive(Deserialize)]
        struct RawDoc {
            #[serde(rename = "type")]
            doc_type: String,
            #[serde(default)]
            clips: Vec<PropertyAnimationClip>,
        }

        let raw: RawDoc = serde_json::from_str(data)
            .map_err(|e| AnimationError::InvalidFormat(e.to_string()))?;
        if raw.doc_type != ANIMATION_DOC_TYPE {
            return Err(AnimationError::InvalidFormat(format!(
                "expected document type \"{ANIMATION_DOC_TYPE}\", found \"{}\"",
                raw.doc_type
            )));
        }

        let mut resource = Self::new();
        for clip in raw.clips {
            for track in &clip.tracks {
                track.validate()?;
            }
            resource.add_clip(clip);
        }
        Ok(resource)
    }

    /// Save to an `.anim` file, pretty-printed.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> AnimationResult<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load from an `.anim` file.
    pub fn load_from_file(path: impl AsRef<Path>) -> AnimationResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnimationError::FileNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_track() -> AnimationTrack {
        let mut track = AnimationTrack::new("Player/Body", "x");
        track.add_keyframe(Keyframe::new(0.0, AnimationValue::Float(0.0)));
        track.add_keyframe(Keyframe::new(1.0, AnimationValue::Float(10.0)));
        track
    }

    #[test]
    fn test_linear_sample() {
        let track = linear_track();
        assert_eq!(track.sample(0.3), Some(AnimationValue::Float(3.0)));
        assert_eq!(track.sample(0.5), Some(AnimationValue::Float(5.0)));
    }

    #[test]
    fn test_sample_clamps_at_ends() {
        let track = linear_track();
        assert_eq!(track.sample(-1.0), Some(AnimationValue::Float(0.0)));
        assert_eq!(track.sample(2.0), Some(AnimationValue::Float(10.0)));
    }

    #[test]
    fn test_empty_track_samples_none() {
        let track = AnimationTrack::new("Player", "x");
        assert_eq!(track.sample(0.5), None);
    }

    #[test]
    fn test_step_holds_left_value() {
        let mut track = AnimationTrack::new("Player", "visible");
        track.add_keyframe(
            Keyframe::new(0.0, AnimationValue::Float(1.0))
                .with_interpolation(InterpolationKind::Step),
        );
        track.add_keyframe(Keyframe::new(1.0, AnimationValue::Float(5.0)));
        assert_eq!(track.sample(0.99), Some(AnimationValue::Float(1.0)));
        assert_eq!(track.sample(1.0), Some(AnimationValue::Float(5.0)));
    }

    #[test]
    fn test_segment_lookup_with_many_keys() {
        let mut track = AnimationTrack::new("Player", "x");
        for i in 0..5 {
            track.add_keyframe(Keyframe::new(i as f32, AnimationValue::Float(i as f32 * 2.0)));
        }
        assert_eq!(track.sample(2.5), Some(AnimationValue::Float(5.0)));
        assert_eq!(track.sample(3.0), Some(AnimationValue::Float(6.0)));
    }

    #[test]
    fn test_add_keyframe_keeps_order() {
        let mut track = AnimationTrack::new("Player", "x");
        track.add_keyframe(Keyframe::new(1.0, AnimationValue::Float(1.0)));
        track.add_keyframe(Keyframe::new(0.25, AnimationValue::Float(0.25)));
        track.add_keyframe(Keyframe::new(0.5, AnimationValue::Float(0.5)));
        let times: Vec<f32> = track.keyframes.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.25, 0.5, 1.0]);
        assert!(track.validate().is_ok());
    }

    #[test]
    fn test_wrap_time() {
        let mut clip = PropertyAnimationClip::new("walk", 2.0);
        clip.looping = true;
        assert!((clip.wrap_time(2.5) - 0.5).abs() < 1e-6);
        clip.looping = false;
        assert_eq!(clip.wrap_time(2.5), 2.0);
    }

    #[test]
    fn test_non_monotonic_keyframes_fail_load() {
        let doc = r#"{
            "type": "Animation",
            "clips": [{
                "name": "broken",
                "duration": 1.0,
                "tracks": [{
                    "target": "A", "property": "x",
                    "keyframes": [
                        {"time": 0.5, "value": {"kind": "float", "value": 1.0}},
                        {"time": 0.25, "value": {"kind": "float", "value": 2.0}}
                    ]
                }]
            }]
        }"#;
        let err = PropertyAnimationResource::from_json(doc).unwrap_err();
        assert!(matches!(err, AnimationError::InvalidFormat(_)));
    }

    #[test]
    fn test_resource_round_trip() {
        let mut clip = PropertyAnimationClip::new("walk", 1.0);
        clip.looping = true;
        clip.tracks.push(linear_track());
        let mut offsets = AnimationTrack::new("Player/Body", "offset");
        offsets.add_keyframe(Keyframe::new(0.0, AnimationValue::Vec2(glam::Vec2::ZERO)));
        offsets.add_keyframe(
            Keyframe::new(0.5, AnimationValue::Vec2(glam::Vec2::new(1.0, 2.0)))
                .with_interpolation(InterpolationKind::Ease),
        );
        clip.tracks.push(offsets);
        let mut resource = PropertyAnimationResource::new();
        resource.add_clip(clip);

        let json = resource.to_json().unwrap();
        let loaded = PropertyAnimationResource::from_json(&json).unwrap();
        assert_eq!(resource, loaded);
    }
}
