//! Sprite animation
//!
//! Timed frame sequences over a sprite atlas: the `.spriteanim` resource
//! (animations, atlas metadata, grid slicing) and the playback cursor that
//! advances frames with variable durations, looping, and speed scaling.

use std::path::Path;

use glam::{UVec2, Vec4};
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AnimationError, AnimationResult};
use crate::machine::{FORMAT_VERSION, pretty_print};

/// Document `type` tag of a sprite animation file
pub const SPRITE_ANIMATION_DOC_TYPE: &str = "SpriteAnimation";

/// Frame duration assigned by the editor when none is authored
pub const DEFAULT_FRAME_DURATION: f32 = 0.1;

/// One frame of a sprite animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteFrame {
    /// Normalised UV rectangle (u, v, w, h) into the atlas texture
    pub region: Vec4,
    /// Display time in seconds, > 0
    pub duration: f32,
}

impl SpriteFrame {
    pub fn new(region: Vec4, duration: f32) -> Self {
        Self { region, duration }
    }
}

/// A named sequence of frames
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteAnimation {
    pub name: String,
    pub looping: bool,
    /// Playback rate multiplier, > 0
    pub speed_scale: f32,
    /// Ordered, non-empty frame list
    pub frames: Vec<SpriteFrame>,
}

impl SpriteAnimation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            looping: true,
            speed_scale: 1.0,
            frames: Vec::new(),
        }
    }

    /// Sum of all frame durations, in seconds.
    pub fn total_duration(&self) -> f32 {
        self.frames.iter().map(|f| f.duration).sum()
    }
}

/// Sprite animation resource (`.spriteanim` files)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteAnimationResource {
    /// Path of the atlas texture, relative to the project
    pub texture_path: String,
    /// Atlas dimensions in pixels; zero means unknown
    pub sheet_size: UVec2,
    /// Grid cell size in pixels, for auto-sliced sheets
    pub sprite_size: UVec2,
    /// Animation played on bind when none is requested
    pub default_animation: Option<String>,
    animations: IndexMap<String, SpriteAnimation>,
}

impl SpriteAnimationResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_animation(&mut self, animation: SpriteAnimation) {
        self.animations.insert(animation.name.clone(), animation);
    }

    pub fn remove_animation(&mut self, name: &str) {
        self.animations.shift_remove(name);
    }

    pub fn animation(&self, name: &str) -> Option<&SpriteAnimation> {
        self.animations.get(name)
    }

    pub fn animations(&self) -> impl Iterator<Item = &SpriteAnimation> {
        self.animations.values()
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.animations.keys().map(String::as_str)
    }

    /// Number of grid columns, from the atlas and cell sizes.
    fn grid_columns(&self) -> u32 {
        if self.sprite_size.x == 0 {
            0
        } else {
            self.sheet_size.x / self.sprite_size.x
        }
    }

    /// UV region of a grid cell, counting cells left-to-right, top-to-bottom.
    ///
    /// Falls back to the full texture when the grid is not configured.
    pub fn region_for_cell(&self, index: u32) -> Vec4 {
        let columns = self.grid_columns();
        if columns == 0 || self.sheet_size.y == 0 {
            return Vec4::new(0.0, 0.0, 1.0, 1.0);
        }
        let col = index % columns;
        let row = index / columns;
        let sheet = self.sheet_size.as_vec2();
        let cell = self.sprite_size.as_vec2();
        Vec4::new(
            col as f32 * cell.x / sheet.x,
            row as f32 * cell.y / sheet.y,
            cell.x / sheet.x,
            cell.y / sheet.y,
        )
    }

    /// Grid cell index whose top-left corner matches a UV region, if any.
    pub fn cell_for_region(&self, region: Vec4) -> Option<u32> {
        let columns = self.grid_columns();
        if columns == 0 || self.sheet_size.y == 0 {
            return None;
        }
        let x = (region.x * self.sheet_size.x as f32).round() as u32;
        let y = (region.y * self.sheet_size.y as f32).round() as u32;
        let col = x / self.sprite_size.x;
        let row = y / self.sprite_size.y;
        Some(row * columns + col)
    }

    /// Serialise to the versioned JSON document format.
    ///
    /// Frame regions are written as pixel rects when the atlas size is
    /// known, matching the editor's output; otherwise as UV rects.
    pub fn to_json(&self) -> AnimationResult<String> {
        let pixel_space = self.sheet_size.x > 0 && self.sheet_size.y > 0;
        let sheet = self.sheet_size.as_vec2();

        let mut animations = serde_json::Map::new();
        for animation in self.animations.values() {
            let frames: Vec<Value> = animation
                .frames
                .iter()
                .map(|frame| {
                    let r = frame.region;
                    let region = if pixel_space {
                        [r.x * sheet.x, r.y * sheet.y, r.z * sheet.x, r.w * sheet.y]
                    } else {
                        [r.x, r.y, r.z, r.w]
                    };
                    json!({ "region": region, "duration": frame.duration })
                })
                .collect();
            animations.insert(
                animation.name.clone(),
                json!({
                    "looping": animation.looping,
                    "speed_scale": animation.speed_scale,
                    "frames": frames,
                }),
            );
        }

        let document = json!({
            "type": SPRITE_ANIMATION_DOC_TYPE,
            "version": FORMAT_VERSION,
            "texture": self.texture_path,
            "sheet_size": [self.sheet_size.x, self.sheet_size.y],
            "sprite_size": [self.sprite_size.x, self.sprite_size.y],
            "default_animation": self.default_animation,
            "animations": animations,
        });
        pretty_print(&document)
    }

    /// Parse the versioned JSON document format.
    ///
    /// Frames accept either a `region` (pixel rect when any component
    /// exceeds 1, normalised against the atlas size; UV rect otherwise) or a
    /// `grid_index` resolved through the configured cell grid. Non-positive
    /// durations or speed scales and empty frame lists are rejected.
    pub fn from_json(data: &str) -> AnimationResult<Self> {
        let raw: RawSpriteDoc = serde_json::from_str(data)
            .map_err(|e| AnimationError::InvalidFormat(e.to_string()))?;
        if raw.doc_type != SPRITE_ANIMATION_DOC_TYPE {
            return Err(AnimationError::InvalidFormat(format!(
                "expected document type \"{SPRITE_ANIMATION_DOC_TYPE}\", found \"{}\"",
                raw.doc_type
            )));
        }

        let mut resource = Self {
            texture_path: raw.texture,
            sheet_size: UVec2::new(raw.sheet_size[0], raw.sheet_size[1]),
            sprite_size: UVec2::new(raw.sprite_size[0], raw.sprite_size[1]),
            default_animation: raw.default_animation,
            animations: IndexMap::new(),
        };

        for (name, raw_animation) in raw.animations {
            if raw_animation.speed_scale <= 0.0 {
                return Err(AnimationError::InvalidFormat(format!(
                    "animation \"{name}\": speed_scale must be positive"
                )));
            }
            if raw_animation.frames.is_empty() {
                return Err(AnimationError::InvalidFormat(format!(
                    "animation \"{name}\": frame list is empty"
                )));
            }

            let mut animation = SpriteAnimation::new(name.clone());
            animation.looping = raw_animation.looping;
            animation.speed_scale = raw_animation.speed_scale;
            for raw_frame in raw_animation.frames {
                if raw_frame.duration <= 0.0 {
                    return Err(AnimationError::InvalidFormat(format!(
                        "animation \"{name}\": frame duration must be positive"
                    )));
                }
                let region = resource.resolve_region(&name, &raw_frame)?;
                animation.frames.push(SpriteFrame::new(region, raw_frame.duration));
            }
            resource.animations.insert(name, animation);
        }

        if let Some(default) = &resource.default_animation {
            if !resource.animations.contains_key(default) {
                warn!("default animation \"{default}\" does not exist, clearing");
                resource.default_animation = None;
            }
        }

        Ok(resource)
    }

    fn resolve_region(&self, animation: &str, raw: &RawFrame) -> AnimationResult<Vec4> {
        if let Some(index) = raw.grid_index {
            return Ok(self.region_for_cell(index));
        }
        let Some(r) = raw.region else {
            return Err(AnimationError::InvalidFormat(format!(
                "animation \"{animation}\": frame needs a region or grid_index"
            )));
        };
        let region = Vec4::new(r[0], r[1], r[2], r[3]);
        if r.iter().any(|&c| c > 1.0) {
            // Pixel rect; normalise against the atlas.
            if self.sheet_size.x == 0 || self.sheet_size.y == 0 {
                return Err(AnimationError::InvalidFormat(format!(
                    "animation \"{animation}\": pixel region without a sheet_size"
                )));
            }
            let sheet = self.sheet_size.as_vec2();
            Ok(Vec4::new(
                region.x / sheet.x,
                region.y / sheet.y,
                region.z / sheet.x,
                region.w / sheet.y,
            ))
        } else {
            Ok(region)
        }
    }

    /// Save to a `.spriteanim` file, pretty-printed.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> AnimationResult<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load from a `.spriteanim` file.
    pub fn load_from_file(path: impl AsRef<Path>) -> AnimationResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnimationError::FileNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

#[derive(Deserialize)]
struct RawSpriteDoc {
    #[serde(rename = "type")]
    doc_type: String,
    #[serde(default)]
    texture: String,
    #[serde(default)]
    sheet_size: [u32; 2],
    #[serde(default)]
    sprite_size: [u32; 2],
    #[serde(default)]
    default_animation: Option<String>,
    #[serde(default)]
    animations: IndexMap<String, RawAnimation>,
}

#[derive(Deserialize)]
struct RawAnimation {
    #[serde(default = "default_looping")]
    looping: bool,
    #[serde(default = "default_speed_scale")]
    speed_scale: f32,
    #[serde(default)]
    frames: Vec<RawFrame>,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    region: Option<[f32; 4]>,
    #[serde(default)]
    grid_index: Option<u32>,
    #[serde(default = "default_frame_duration")]
    duration: f32,
}

fn default_looping() -> bool {
    true
}

fn default_speed_scale() -> f32 {
    1.0
}

fn default_frame_duration() -> f32 {
    DEFAULT_FRAME_DURATION
}

/// Playback position within one sprite animation
///
/// The cursor owns only transient state and borrows the resource on every
/// call, so many cursors can share one resource.
#[derive(Debug, Clone, Default)]
pub struct SpriteCursor {
    animation: String,
    /// Time into the current frame, already speed-scaled
    elapsed: f32,
    frame_index: usize,
    playing: bool,
    paused: bool,
}

impl SpriteCursor {
    /// An idle cursor pointing at no animation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to the named animation and restart from the first frame.
    ///
    /// An unknown name idles the cursor: it stops emitting regions until the
    /// next successful `set_animation`.
    pub fn set_animation(&mut self, resource: &SpriteAnimationResource, name: &str) {
        if resource.animation(name).is_none() {
            warn!("unknown sprite animation \"{name}\"");
            self.animation.clear();
            self.playing = false;
            self.paused = false;
            return;
        }
        self.animation.clear();
        self.animation.push_str(name);
        self.elapsed = 0.0;
        self.frame_index = 0;
        self.playing = true;
        self.paused = false;
    }

    /// Name of the current animation, empty when idle.
    pub fn animation_name(&self) -> &str {
        &self.animation
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Time into the current frame, in speed-scaled seconds.
    pub fn frame_elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Restart the current animation from its first frame.
    pub fn restart(&mut self) {
        if !self.animation.is_empty() {
            self.elapsed = 0.0;
            self.frame_index = 0;
            self.playing = true;
        }
    }

    /// Advance by `dt` seconds and return the current frame's UV region.
    ///
    /// Walks whole frame durations: looping animations wrap to frame zero,
    /// non-looping animations clamp on the last frame and stop. With
    /// positive durations the walk is bounded by
    /// `ceil(dt * speed / min_duration) + 1` iterations.
    pub fn advance(&mut self, resource: &SpriteAnimationResource, dt: f32) -> Option<Vec4> {
        let animation = resource.animation(&self.animation)?;
        if animation.frames.is_empty() {
            return None;
        }
        if self.frame_index >= animation.frames.len() {
            self.frame_index = animation.frames.len() - 1;
        }

        if self.playing && !self.paused && dt > 0.0 {
            self.elapsed += dt * animation.speed_scale;
            loop {
                let duration = animation.frames[self.frame_index].duration;
                if self.elapsed < duration {
                    break;
                }
                self.elapsed -= duration;
                self.frame_index += 1;
                if self.frame_index >= animation.frames.len() {
                    if animation.looping {
                        self.frame_index = 0;
                    } else {
                        self.frame_index = animation.frames.len() - 1;
                        self.elapsed = animation.frames[self.frame_index].duration;
                        self.playing = false;
                        break;
                    }
                }
            }
        }

        Some(animation.frames[self.frame_index].region)
    }

    /// Current frame region without advancing time.
    pub fn region(&self, resource: &SpriteAnimationResource) -> Option<Vec4> {
        let animation = resource.animation(&self.animation)?;
        animation
            .frames
            .get(self.frame_index.min(animation.frames.len().saturating_sub(1)))
            .map(|f| f.region)
    }
}
