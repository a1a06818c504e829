//! Value and parameter model
//!
//! Typed values shared by the state machine and the track sampler:
//! - [`ParameterValue`]: the externally mutable inputs conditions test against
//! - [`AnimationValue`]: the per-property outputs tracks produce and blend

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Absolute tolerance used for float parameter equality.
///
/// `Eq`/`Ne` comparisons between float parameters and condition values pass
/// when `|a - b| < 1e-3`. The value is part of the authored-asset contract
/// and must not change, or existing state machines fire differently.
pub const FLOAT_EQ_TOLERANCE: f32 = 1e-3;

/// Kind of an animation parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Plain boolean flag
    Bool,
    /// 32-bit signed integer
    Int,
    /// 32-bit float
    Float,
    /// Boolean that resets to `false` at the end of every runtime update
    Trigger,
}

impl ParameterKind {
    /// Decode the numeric wire representation (0=Bool, 1=Int, 2=Float, 3=Trigger).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Bool),
            1 => Some(Self::Int),
            2 => Some(Self::Float),
            3 => Some(Self::Trigger),
            _ => None,
        }
    }

    /// Numeric wire representation.
    pub fn code(self) -> i64 {
        match self {
            Self::Bool => 0,
            Self::Int => 1,
            Self::Float => 2,
            Self::Trigger => 3,
        }
    }
}

/// A typed parameter value, one variant per [`ParameterKind`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// Boolean payload
    Bool(bool),
    /// Integer payload
    Int(i32),
    /// Float payload
    Float(f32),
    /// Trigger payload; carries a bool like [`ParameterValue::Bool`] but is
    /// swept back to `false` after every update
    Trigger(bool),
}

impl ParameterValue {
    /// The kind this value belongs to.
    pub fn kind(self) -> ParameterKind {
        match self {
            Self::Bool(_) => ParameterKind::Bool,
            Self::Int(_) => ParameterKind::Int,
            Self::Float(_) => ParameterKind::Float,
            Self::Trigger(_) => ParameterKind::Trigger,
        }
    }

    /// The default value for a kind (false / 0 / 0.0).
    pub fn default_for(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::Bool => Self::Bool(false),
            ParameterKind::Int => Self::Int(0),
            ParameterKind::Float => Self::Float(0.0),
            ParameterKind::Trigger => Self::Trigger(false),
        }
    }

    /// Boolean payload, if this is a bool or trigger value.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(v) | Self::Trigger(v) => Some(v),
            _ => None,
        }
    }

    /// Integer payload, if this is an int value.
    pub fn as_int(self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Float payload, if this is a float value.
    pub fn as_float(self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Compare against another value of the same kind.
    ///
    /// Returns `false` when the kinds disagree, when the operator does not
    /// apply to the kind (ordered comparisons on bools), or when the
    /// comparison itself fails. Float equality uses [`FLOAT_EQ_TOLERANCE`];
    /// ordered float comparisons are strict IEEE-754.
    pub fn compare(self, op: ComparisonOperator, rhs: Self) -> bool {
        use ComparisonOperator::*;
        match (self, rhs) {
            (Self::Bool(a), Self::Bool(b)) | (Self::Trigger(a), Self::Trigger(b)) => match op {
                Eq => a == b,
                Ne => a != b,
                _ => false,
            },
            (Self::Int(a), Self::Int(b)) => match op {
                Eq => a == b,
                Ne => a != b,
                Gt => a > b,
                Ge => a >= b,
                Lt => a < b,
                Le => a <= b,
            },
            (Self::Float(a), Self::Float(b)) => match op {
                Eq => (a - b).abs() < FLOAT_EQ_TOLERANCE,
                Ne => (a - b).abs() >= FLOAT_EQ_TOLERANCE,
                Gt => a > b,
                Ge => a >= b,
                Lt => a < b,
                Le => a <= b,
            },
            _ => false,
        }
    }
}

/// Comparison operators for transition conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOperator {
    /// Decode the numeric wire representation (0=Eq, 1=Ne, 2=Gt, 3=Ge, 4=Lt, 5=Le).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Eq),
            1 => Some(Self::Ne),
            2 => Some(Self::Gt),
            3 => Some(Self::Ge),
            4 => Some(Self::Lt),
            5 => Some(Self::Le),
            _ => None,
        }
    }

    /// Numeric wire representation.
    pub fn code(self) -> i64 {
        match self {
            Self::Eq => 0,
            Self::Ne => 1,
            Self::Gt => 2,
            Self::Ge => 3,
            Self::Lt => 4,
            Self::Le => 5,
        }
    }
}

/// RGBA color with f32 components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    /// Create a color from components
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Component-wise linear interpolation
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// A value an animation track can produce for a node property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnimationValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Color(Color),
    Bool(bool),
    String(String),
}

impl AnimationValue {
    /// Short name of the carried kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Vec4(_) => "vec4",
            Self::Color(_) => "color",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
        }
    }

    /// Whether two values share a kind and can be numerically blended.
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Blend two values with weight `t` toward `b`.
    ///
    /// Numeric kinds interpolate component-wise. Bools, strings, and
    /// mismatched kinds pick the nearest neighbour: `a` for `t < 0.5`,
    /// `b` otherwise.
    pub fn blend(a: &Self, b: &Self, t: f32) -> Self {
        match (a, b) {
            (Self::Float(x), Self::Float(y)) => Self::Float(x + (y - x) * t),
            (Self::Vec2(x), Self::Vec2(y)) => Self::Vec2(x.lerp(*y, t)),
            (Self::Vec3(x), Self::Vec3(y)) => Self::Vec3(x.lerp(*y, t)),
            (Self::Vec4(x), Self::Vec4(y)) => Self::Vec4(x.lerp(*y, t)),
            (Self::Color(x), Self::Color(y)) => Self::Color(x.lerp(*y, t)),
            _ => {
                if t < 0.5 {
                    a.clone()
                } else {
                    b.clone()
                }
            }
        }
    }
}

/// Keyframe interpolation curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationKind {
    /// Straight lerp between keys
    #[default]
    Linear,
    /// Smoothstep easing
    Ease,
    /// Hold the left key until the right key's time
    Step,
    /// Cubic Hermite with zero tangents at both endpoints
    CubicHermite,
}

impl InterpolationKind {
    /// Map a normalised segment position `u` in [0, 1] through the curve.
    pub fn apply(self, u: f32) -> f32 {
        match self {
            Self::Linear => u,
            Self::Ease => u * u * (3.0 - 2.0 * u),
            Self::Step => 0.0,
            Self::CubicHermite => {
                // Hermite basis with m0 = m1 = 0: value = a*h00 + b*h01,
                // so the blend factor is h01.
                let u2 = u * u;
                let u3 = u2 * u;
                -2.0 * u3 + 3.0 * u2
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for code in 0..4 {
            let kind = ParameterKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert!(ParameterKind::from_code(4).is_none());
        assert!(ComparisonOperator::from_code(6).is_none());
    }

    #[test]
    fn test_float_equality_tolerance() {
        let a = ParameterValue::Float(1.0);
        assert!(a.compare(ComparisonOperator::Eq, ParameterValue::Float(1.0005)));
        assert!(!a.compare(ComparisonOperator::Eq, ParameterValue::Float(1.002)));
        assert!(a.compare(ComparisonOperator::Ne, ParameterValue::Float(1.002)));
    }

    #[test]
    fn test_ordered_comparison_on_bool_is_false() {
        let a = ParameterValue::Bool(true);
        assert!(!a.compare(ComparisonOperator::Gt, ParameterValue::Bool(false)));
        assert!(a.compare(ComparisonOperator::Eq, ParameterValue::Bool(true)));
    }

    #[test]
    fn test_kind_mismatch_compares_false() {
        let a = ParameterValue::Int(1);
        assert!(!a.compare(ComparisonOperator::Eq, ParameterValue::Float(1.0)));
        // Bool and Trigger are distinct kinds even though both carry a bool.
        let b = ParameterValue::Bool(true);
        assert!(!b.compare(ComparisonOperator::Eq, ParameterValue::Trigger(true)));
    }

    #[test]
    fn test_int_comparisons() {
        let a = ParameterValue::Int(3);
        assert!(a.compare(ComparisonOperator::Ge, ParameterValue::Int(3)));
        assert!(a.compare(ComparisonOperator::Lt, ParameterValue::Int(5)));
        assert!(!a.compare(ComparisonOperator::Gt, ParameterValue::Int(3)));
    }

    #[test]
    fn test_blend_numeric() {
        let a = AnimationValue::Float(0.0);
        let b = AnimationValue::Float(10.0);
        assert_eq!(AnimationValue::blend(&a, &b, 0.3), AnimationValue::Float(3.0));

        let a = AnimationValue::Vec3(Vec3::ZERO);
        let b = AnimationValue::Vec3(Vec3::splat(2.0));
        assert_eq!(
            AnimationValue::blend(&a, &b, 0.5),
            AnimationValue::Vec3(Vec3::splat(1.0))
        );
    }

    #[test]
    fn test_blend_nearest_neighbour() {
        let a = AnimationValue::String(String::from("walk"));
        let b = AnimationValue::String(String::from("run"));
        assert_eq!(AnimationValue::blend(&a, &b, 0.49), a);
        assert_eq!(AnimationValue::blend(&a, &b, 0.5), b);

        // Mismatched kinds degrade to nearest neighbour too.
        let a = AnimationValue::Float(1.0);
        let b = AnimationValue::Bool(true);
        assert_eq!(AnimationValue::blend(&a, &b, 0.2), a);
    }

    #[test]
    fn test_interpolation_curves() {
        assert_eq!(InterpolationKind::Linear.apply(0.25), 0.25);
        assert_eq!(InterpolationKind::Step.apply(0.99), 0.0);
        // Smoothstep and zero-tangent Hermite agree at the midpoint.
        assert!((InterpolationKind::Ease.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((InterpolationKind::CubicHermite.apply(0.5) - 0.5).abs() < 1e-6);
        assert_eq!(InterpolationKind::Ease.apply(0.0), 0.0);
        assert_eq!(InterpolationKind::Ease.apply(1.0), 1.0);
    }
}
