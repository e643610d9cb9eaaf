use arbor_common::{Color, LightKind, Transform};
use arbor_device::GraphicsDevice;
use arbor_resource::{Material, SphereParams};
use glam::{EulerRot, Quat, Vec3};

use crate::camera::{Camera, CameraError, Plane};
use crate::error::BindingError;
use crate::node::{Capabilities, NodeId, NodeKind, Relation};
use crate::scene::Scene;

/// A dynamically typed value crossing the scripting boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Vec3(Vec3),
    Quat(Quat),
    Node(NodeId),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Vec3(_) => "vec3",
            Value::Quat(_) => "quat",
            Value::Node(_) => "node",
            Value::List(_) => "list",
        }
    }

    fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Vec3(v) => Some(*v),
            Value::List(items) if items.len() == 3 => {
                let n = numbers(items)?;
                Some(Vec3::new(n[0], n[1], n[2]))
            }
            _ => None,
        }
    }

    /// Quaternions also accept `[x, y, z, w]` lists and XYZ Euler angles in
    /// degrees. Zero-length and non-finite quaternions are rejected.
    fn as_quat(&self) -> Option<Quat> {
        match self {
            Value::Quat(q) => unit_quat(*q),
            Value::List(items) if items.len() == 4 => {
                let n = numbers(items)?;
                unit_quat(Quat::from_xyzw(n[0], n[1], n[2], n[3]))
            }
            other => other.as_vec3().map(|e| {
                Quat::from_euler(
                    EulerRot::XYZ,
                    e.x.to_radians(),
                    e.y.to_radians(),
                    e.z.to_radians(),
                )
            }),
        }
    }
}

fn unit_quat(q: Quat) -> Option<Quat> {
    let len = q.length();
    (len.is_finite() && len > f32::EPSILON).then(|| q / len)
}

fn numbers(items: &[Value]) -> Option<Vec<f32>> {
    items
        .iter()
        .map(|v| match v {
            Value::Number(n) => Some(*n as f32),
            _ => None,
        })
        .collect()
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vec3(v)
    }
}

impl From<Quat> for Value {
    fn from(v: Quat) -> Self {
        Value::Quat(v)
    }
}

impl From<NodeId> for Value {
    fn from(v: NodeId) -> Self {
        Value::Node(v)
    }
}

/// Positional argument reader producing typed errors.
struct Args<'a>(&'a [Value]);

impl Args<'_> {
    fn get(&self, position: usize) -> Option<&Value> {
        self.0.get(position).filter(|v| **v != Value::Nil)
    }

    fn mismatch(&self, position: usize, expected: &'static str) -> BindingError {
        match self.get(position) {
            Some(v) => BindingError::Argument {
                position,
                expected,
                found: v.type_name().to_string(),
            },
            None => BindingError::MissingArgument { position, expected },
        }
    }

    fn number_or(&self, position: usize, default: f32) -> Result<f32, BindingError> {
        match self.get(position) {
            None => Ok(default),
            Some(Value::Number(n)) => Ok(*n as f32),
            Some(_) => Err(self.mismatch(position, "number")),
        }
    }

    fn vec3(&self, position: usize) -> Result<Vec3, BindingError> {
        self.get(position)
            .and_then(Value::as_vec3)
            .ok_or_else(|| self.mismatch(position, "vec3"))
    }

    fn vec3_or(&self, position: usize, default: Vec3) -> Result<Vec3, BindingError> {
        match self.get(position) {
            None => Ok(default),
            Some(_) => self.vec3(position),
        }
    }

    fn str_or<'s>(&'s self, position: usize, default: &'s str) -> Result<&'s str, BindingError> {
        match self.get(position) {
            None => Ok(default),
            Some(Value::Str(s)) => Ok(s),
            Some(_) => Err(self.mismatch(position, "string")),
        }
    }

    /// Every node from `position` on; lists are flattened.
    fn nodes_from(&self, position: usize) -> Result<Vec<NodeId>, BindingError> {
        let mut out = Vec::new();
        for (offset, value) in self.0.iter().enumerate().skip(position) {
            collect_nodes(value, offset, &mut out)?;
        }
        Ok(out)
    }
}

fn collect_nodes(value: &Value, position: usize, out: &mut Vec<NodeId>) -> Result<(), BindingError> {
    match value {
        Value::Node(id) => out.push(*id),
        Value::List(items) => {
            for item in items {
                collect_nodes(item, position, out)?;
            }
        }
        other => {
            return Err(BindingError::Argument {
                position,
                expected: "node",
                found: other.type_name().to_string(),
            });
        }
    }
    Ok(())
}

fn expect_bool(value: &Value) -> Result<bool, BindingError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(wrong_value("bool", other)),
    }
}

fn expect_number(value: &Value) -> Result<f32, BindingError> {
    match value {
        Value::Number(n) => Ok(*n as f32),
        other => Err(wrong_value("number", other)),
    }
}

fn expect_vec3(value: &Value) -> Result<Vec3, BindingError> {
    value.as_vec3().ok_or_else(|| wrong_value("vec3", value))
}

fn wrong_value(expected: &'static str, found: &Value) -> BindingError {
    BindingError::Argument {
        position: 0,
        expected,
        found: found.type_name().to_string(),
    }
}

const CAMERA_PROPERTIES: [&str; 9] = [
    "fov", "aspect", "near", "far", "zoom", "left", "right", "top", "bottom",
];

impl<D: GraphicsDevice> Scene<D> {
    /// Build a node of the named kind from positional arguments.
    pub fn construct(&mut self, kind: &str, tag: &str, args: &[Value]) -> Result<NodeId, BindingError> {
        let a = Args(args);
        let id = match kind {
            "dummy" => self.dummy(tag),
            "root" => self.root(tag),
            "group" => {
                let children = a.nodes_from(0)?;
                self.group(tag, &children)?
            }
            "translate" => self.translate(tag, a.vec3(0)?),
            "scale" => {
                let v = match a.get(0) {
                    Some(Value::Number(n)) => Vec3::splat(*n as f32),
                    _ => a.vec3(0)?,
                };
                self.scale(tag, v)
            }
            "rotate" => {
                let q = match (a.get(0), a.get(1)) {
                    (Some(axis), Some(Value::Number(deg))) => {
                        let axis = axis.as_vec3().ok_or_else(|| a.mismatch(0, "vec3 axis"))?;
                        Quat::from_axis_angle(axis.normalize_or(Vec3::Y), (*deg as f32).to_radians())
                    }
                    (Some(v), None) => v.as_quat().ok_or_else(|| a.mismatch(0, "quat"))?,
                    (_, Some(_)) => return Err(a.mismatch(1, "angle in degrees")),
                    (None, None) => return Err(a.mismatch(0, "quat")),
                };
                self.rotate(tag, q)
            }
            "position" => {
                let t = Transform::from_translation(a.vec3_or(0, Vec3::ZERO)?);
                self.position(tag, t)
            }
            "camera" => {
                let camera = match a.str_or(0, "perspective")?.to_ascii_lowercase().as_str() {
                    "perspective" => Camera::perspective(
                        a.number_or(1, 65.0)?,
                        a.number_or(2, 1.0)?,
                        a.number_or(3, 0.01)?,
                        a.number_or(4, 1000.0)?,
                    ),
                    "orthographic" => Camera::orthographic(
                        a.number_or(1, -2.0)?,
                        a.number_or(2, 2.0)?,
                        a.number_or(3, 2.0)?,
                        a.number_or(4, -2.0)?,
                        a.number_or(5, 0.01)?,
                        a.number_or(6, 100.0)?,
                    ),
                    other => return Err(CameraError::UnknownProjection(other.to_string()).into()),
                };
                self.camera(tag, camera)
            }
            "ambient" | "directional" | "point" | "spot" => {
                let light_kind: LightKind = kind
                    .parse()
                    .map_err(|_| BindingError::UnknownKind(kind.to_string()))?;
                let color = a.vec3_or(0, Vec3::ONE)?;
                let intensity = a.number_or(1, 1.0)?;
                self.light(tag, light_kind, color.into(), intensity)
            }
            "sphere" => {
                let params = SphereParams::with_radius(a.number_or(0, 1.0)?);
                let color: Color = a.vec3_or(1, Vec3::ONE)?.into();
                self.sphere(tag, &params, Material::standard(color))
            }
            "axis" => self.axis(tag, a.number_or(0, 1.0)?),
            other => return Err(BindingError::UnknownKind(other.to_string())),
        };
        tracing::debug!(kind, tag, ?id, "node constructed");
        Ok(id)
    }

    pub fn get_property(&self, id: NodeId, name: &str) -> Result<Value, BindingError> {
        let node = self.graph().get(id)?;
        let class = node.class();
        let caps = class.capabilities;
        let value = match name {
            "tag" => Value::Str(node.tag.clone()),
            "hidden" => Value::Bool(node.hidden),
            "paused" => Value::Bool(node.paused),
            "terminal" => Value::Bool(node.terminal),
            "recursion_limit" => Value::Number(node.recursion.limit as f64),
            "id" => Value::Number(node.entity().0 as f64),
            "class" => Value::Str(class.name.to_string()),
            "translate" | "scale" | "rotation" | "direction"
                if caps.contains(Capabilities::TRANSFORM) =>
            {
                match node.kind.transform() {
                    Some(t) => match name {
                        "translate" => Value::Vec3(t.translate),
                        "scale" => Value::Vec3(t.scale),
                        "rotation" => Value::Quat(t.rotation),
                        _ => Value::Vec3(t.direction),
                    },
                    None => return Err(unknown_property(class.name, name)),
                }
            }
            _ if caps.contains(Capabilities::CAMERA) && is_camera_property(name) => {
                let NodeKind::Camera(camera) = &node.kind else {
                    return Err(unknown_property(class.name, name));
                };
                match name {
                    "target" => Value::Vec3(camera.target()),
                    "up" => Value::Vec3(camera.up()),
                    plane => Value::Number(camera.plane(parse_plane(plane)?)? as f64),
                }
            }
            "color" | "intensity" | "direction" | "slot" if caps.contains(Capabilities::LIGHT) => {
                let NodeKind::Light(light) = &node.kind else {
                    return Err(unknown_property(class.name, name));
                };
                match name {
                    "color" => Value::Vec3(light.color.into()),
                    "intensity" => Value::Number(light.intensity as f64),
                    "direction" => Value::Vec3(light.direction),
                    _ => Value::Number(light.slot() as f64),
                }
            }
            "renderable" if caps.contains(Capabilities::MESH) => match node.kind.drawable() {
                Some(d) => Value::Bool(d.renderable),
                None => return Err(unknown_property(class.name, name)),
            },
            _ => return Err(unknown_property(class.name, name)),
        };
        Ok(value)
    }

    pub fn set_property(&mut self, id: NodeId, name: &str, value: Value) -> Result<(), BindingError> {
        let node = self.graph_mut().get_mut(id)?;
        let class = node.class();
        let caps = class.capabilities;
        match name {
            "id" | "class" | "slot" => return Err(BindingError::ReadOnly(name.to_string())),
            "tag" => match value {
                Value::Str(s) => node.tag = s,
                other => return Err(wrong_value("string", &other)),
            },
            "hidden" => node.hidden = expect_bool(&value)?,
            "paused" => node.paused = expect_bool(&value)?,
            "terminal" => node.terminal = expect_bool(&value)?,
            "recursion_limit" => {
                let n = expect_number(&value)?;
                if n < 0.0 {
                    return Err(wrong_value("non-negative number", &value));
                }
                node.recursion.limit = n as u32;
            }
            "translate" | "scale" | "rotation" | "direction"
                if caps.contains(Capabilities::TRANSFORM) =>
            {
                let Some(t) = node.kind.transform_mut() else {
                    return Err(unknown_property(class.name, name));
                };
                match name {
                    "translate" => t.translate = expect_vec3(&value)?,
                    "scale" => t.scale = expect_vec3(&value)?,
                    "rotation" => {
                        t.rotation = value.as_quat().ok_or_else(|| wrong_value("quat", &value))?
                    }
                    _ => t.direction = expect_vec3(&value)?,
                }
            }
            _ if caps.contains(Capabilities::CAMERA) && is_camera_property(name) => {
                let NodeKind::Camera(camera) = &mut node.kind else {
                    return Err(unknown_property(class.name, name));
                };
                match name {
                    "target" => camera.look_at(expect_vec3(&value)?),
                    "up" => camera.set_up(expect_vec3(&value)?),
                    plane => camera.set_plane(parse_plane(plane)?, expect_number(&value)?)?,
                }
            }
            "color" | "intensity" | "direction" if caps.contains(Capabilities::LIGHT) => {
                let NodeKind::Light(light) = &mut node.kind else {
                    return Err(unknown_property(class.name, name));
                };
                match name {
                    "color" => light.color = expect_vec3(&value)?.into(),
                    "intensity" => light.intensity = expect_number(&value)?,
                    _ => light.direction = expect_vec3(&value)?,
                }
            }
            "renderable" if caps.contains(Capabilities::MESH) => {
                let NodeKind::Mesh(mesh) = &mut node.kind else {
                    return Err(unknown_property(class.name, name));
                };
                mesh.drawable.renderable = expect_bool(&value)?;
            }
            _ => return Err(unknown_property(class.name, name)),
        }
        Ok(())
    }

    /// Invoke a node method: `append`, `prepend`, `remove` or `replace`.
    pub fn call_method(&mut self, id: NodeId, name: &str, args: &[Value]) -> Result<Value, BindingError> {
        let class = self.graph().get(id)?.class();
        let a = Args(args);
        match name {
            "append" | "prepend" => {
                let (relation, first) = match a.get(0) {
                    Some(Value::Str(dir)) => (Relation::parse(dir, name)?, 1),
                    _ => (Relation::Out, 0),
                };
                let nodes = a.nodes_from(first)?;
                let graph = self.graph_mut();
                if name == "append" {
                    graph.append(id, relation, &nodes)?;
                } else {
                    graph.prepend(id, relation, &nodes)?;
                }
                Ok(Value::Nil)
            }
            "remove" => match a.get(0) {
                None => {
                    self.graph_mut().remove(id)?;
                    Ok(Value::Nil)
                }
                Some(Value::Str(tag)) => Ok(Value::Node(self.graph_mut().remove_by_tag(id, tag)?)),
                Some(Value::Node(child)) => {
                    self.graph_mut().remove_descendant(id, *child)?;
                    Ok(Value::Nil)
                }
                Some(_) => Err(a.mismatch(0, "tag or node")),
            },
            "replace" => match a.get(0) {
                Some(Value::Node(with)) => {
                    self.graph_mut().replace(id, *with)?;
                    Ok(Value::Nil)
                }
                _ => Err(a.mismatch(0, "node")),
            },
            _ => Err(BindingError::UnknownMethod {
                class: class.name,
                method: name.to_string(),
            }),
        }
    }
}

fn is_camera_property(name: &str) -> bool {
    name == "target" || name == "up" || CAMERA_PROPERTIES.contains(&name)
}

fn parse_plane(name: &str) -> Result<Plane, BindingError> {
    Ok(name.parse::<Plane>()?)
}

fn unknown_property(class: &'static str, property: &str) -> BindingError {
    BindingError::UnknownProperty {
        class,
        property: property.to_string(),
    }
}
