//! Named draw parameters.
//!
//! A draw call consumes an ordered sequence of [`Param`]s. Callers either
//! build a fresh sequence per draw (typically an
//! [`ImmutableList`](crate::ImmutableList) extended from a shared base) or
//! keep a [`MutableParameterSet`] and overwrite entries in place frame to
//! frame.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::registry::{BufferId, TextureId};
use crate::types::UniformValue;

/// The value bound to one named shader input.
///
/// `VertexStream` feeds an attribute; every other variant is a uniform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ParamValue {
    /// A vertex buffer bound to the attribute of the same name.
    VertexStream(BufferId),
    /// Sampled through the texture's unit.
    Texture(TextureId),
    /// `float` uniform.
    Float(f32),
    /// `int` (or `bool`) uniform.
    Int(i32),
    /// `vec2` uniform.
    Vec2([f32; 2]),
    /// `vec3` uniform.
    Vec3([f32; 3]),
    /// `vec4` uniform.
    Vec4([f32; 4]),
    /// Column-major 3x3 matrix.
    Mat3([f32; 9]),
    /// Column-major 4x4 matrix.
    Mat4([f32; 16]),
}

impl ParamValue {
    /// Whether this value feeds a vertex attribute rather than a uniform.
    #[must_use]
    pub const fn is_vertex_stream(&self) -> bool {
        matches!(self, ParamValue::VertexStream(_))
    }

    /// The uniform upload for every variant except the two that need a
    /// context lookup (`VertexStream`, `Texture`).
    pub(crate) const fn plain_uniform(&self) -> Option<UniformValue> {
        Some(match *self {
            ParamValue::VertexStream(_) | ParamValue::Texture(_) => return None,
            ParamValue::Float(v) => UniformValue::Float(v),
            ParamValue::Int(v) => UniformValue::Int(v),
            ParamValue::Vec2(v) => UniformValue::Vec2(v),
            ParamValue::Vec3(v) => UniformValue::Vec3(v),
            ParamValue::Vec4(v) => UniformValue::Vec4(v),
            ParamValue::Mat3(m) => UniformValue::Mat3(m),
            ParamValue::Mat4(m) => UniformValue::Mat4(m),
        })
    }
}

impl From<BufferId> for ParamValue {
    fn from(id: BufferId) -> Self {
        Self::VertexStream(id)
    }
}

impl From<TextureId> for ParamValue {
    fn from(id: TextureId) -> Self {
        Self::Texture(id)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<[f32; 2]> for ParamValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(v)
    }
}

impl From<[f32; 3]> for ParamValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(v)
    }
}

impl From<[f32; 4]> for ParamValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(v)
    }
}

impl From<[f32; 9]> for ParamValue {
    fn from(m: [f32; 9]) -> Self {
        Self::Mat3(m)
    }
}

impl From<[f32; 16]> for ParamValue {
    fn from(m: [f32; 16]) -> Self {
        Self::Mat4(m)
    }
}

/// Columns of a 3x3 matrix.
impl From<[[f32; 3]; 3]> for ParamValue {
    fn from(columns: [[f32; 3]; 3]) -> Self {
        Self::Mat3(bytemuck::cast(columns))
    }
}

/// Columns of a 4x4 matrix.
impl From<[[f32; 4]; 4]> for ParamValue {
    fn from(columns: [[f32; 4]; 4]) -> Self {
        Self::Mat4(bytemuck::cast(columns))
    }
}

/// One `(name, value)` binding for a draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Attribute or uniform name as declared in the shader.
    pub name: Cow<'static, str>,
    /// What to bind to it.
    pub value: ParamValue,
}

impl Param {
    /// Bind `value` to the shader input called `name`.
    pub fn new(name: impl Into<Cow<'static, str>>, value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A name-keyed, insertion-ordered parameter set updated in place.
///
/// Setting an existing name replaces its value and keeps its position, so a
/// draw loop can refresh per-frame uniforms without rebuilding the sequence.
#[derive(Debug, Default, Clone)]
pub struct MutableParameterSet {
    params: Vec<Param>,
    positions: HashMap<Cow<'static, str>, usize>,
}

impl MutableParameterSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(name, value)` pairs. Later duplicates overwrite
    /// earlier ones in place.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<Cow<'static, str>>,
        V: Into<ParamValue>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.set(name, value);
        }
        set
    }

    /// Insert or overwrite the parameter called `name`.
    pub fn set(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(&position) = self.positions.get(&name) {
            self.params[position].value = value;
        } else {
            self.positions.insert(name.clone(), self.params.len());
            self.params.push(Param { name, value });
        }
    }

    /// Current value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.positions
            .get(name)
            .map(|&position| &self.params[position].value)
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in first-insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.params.iter()
    }
}

impl FromIterator<Param> for MutableParameterSet {
    fn from_iter<I: IntoIterator<Item = Param>>(iter: I) -> Self {
        Self::from_pairs(iter.into_iter().map(|param| (param.name, param.value)))
    }
}

impl<'a> IntoIterator for &'a MutableParameterSet {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
