use std::collections::BTreeMap;
use std::path::Path;

use arbor_device::GraphicsDevice;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::bindings::Value;
use crate::error::{BindingError, SceneError};
use crate::node::{NodeId, Relation};
use crate::scene::Scene;

/// Declarative scene: a forest of node specs attached in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDescription {
    #[serde(default)]
    pub roots: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub kind: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub args: Vec<ArgValue>,
    #[serde(default)]
    pub properties: BTreeMap<String, ArgValue>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

/// Literal argument. Three-element vectors become `vec3`, four-element
/// vectors become `quat` (`x, y, z, w`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Vector(Vec<f64>),
}

impl From<&ArgValue> for Value {
    fn from(arg: &ArgValue) -> Self {
        match arg {
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Number(n) => Value::Number(*n),
            ArgValue::Text(s) => Value::Str(s.clone()),
            ArgValue::Vector(v) => match v.as_slice() {
                [x, y, z] => Value::Vec3(Vec3::new(*x as f32, *y as f32, *z as f32)),
                [x, y, z, w] => {
                    Value::Quat(Quat::from_xyzw(*x as f32, *y as f32, *z as f32, *w as f32))
                }
                other => Value::List(other.iter().map(|n| Value::Number(*n)).collect()),
            },
        }
    }
}

impl SceneDescription {
    pub fn from_yaml(text: &str) -> Result<Self, SceneError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml(&text),
            "json" => Self::from_json(&text),
            other => Err(SceneError::Format(other.to_string())),
        }
    }

    /// Total node specs, children included.
    pub fn node_count(&self) -> usize {
        fn count(spec: &NodeSpec) -> usize {
            1 + spec.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }
}

impl<D: GraphicsDevice> Scene<D> {
    /// Construct every node of `description` and attach its roots.
    ///
    /// On failure every node built so far is destroyed again, so resources
    /// and light slots are left as they were.
    pub fn build(&mut self, description: &SceneDescription) -> Result<Vec<NodeId>, SceneError> {
        let _span = tracing::debug_span!("build_scene", nodes = description.node_count()).entered();
        let mut created = Vec::new();
        let built = self.build_roots(description, &mut created);
        if built.is_err() {
            self.discard(&created);
        }
        built
    }

    fn build_roots(
        &mut self,
        description: &SceneDescription,
        created: &mut Vec<NodeId>,
    ) -> Result<Vec<NodeId>, SceneError> {
        let mut roots = Vec::with_capacity(description.roots.len());
        for (i, spec) in description.roots.iter().enumerate() {
            let path = format!("roots[{i}]");
            roots.push(self.build_node(spec, &path, created)?);
        }
        self.attach(&roots)?;
        Ok(roots)
    }

    fn build_node(
        &mut self,
        spec: &NodeSpec,
        path: &str,
        created: &mut Vec<NodeId>,
    ) -> Result<NodeId, SceneError> {
        let in_node = |source: BindingError| SceneError::Node {
            path: format!("{path} ({})", spec.kind),
            source,
        };
        let args: Vec<Value> = spec.args.iter().map(Value::from).collect();
        let id = self
            .construct(&spec.kind, &spec.tag, &args)
            .map_err(in_node)?;
        created.push(id);
        for (name, value) in &spec.properties {
            self.set_property(id, name, value.into()).map_err(in_node)?;
        }
        let mut children = Vec::with_capacity(spec.children.len());
        for (i, child) in spec.children.iter().enumerate() {
            let child_path = format!("{path}.children[{i}]");
            children.push(self.build_node(child, &child_path, created)?);
        }
        self.graph_mut().append(id, Relation::Out, &children)?;
        Ok(id)
    }

    /// Destroy `nodes` newest first.
    fn discard(&mut self, nodes: &[NodeId]) {
        for id in nodes.iter().rev() {
            if let Err(e) = self.destroy(*id) {
                tracing::warn!(node = ?id, error = %e, "could not discard partially built node");
            }
        }
        tracing::debug!(nodes = nodes.len(), "discarded partial build");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_device::RecordingDevice;

    const ORBIT: &str = r#"
roots:
  - kind: camera
    tag: eye
    args: [perspective, 60, 1.5]
    properties:
      translate: [0, 1, 6]
  - kind: ambient
    tag: fill
    args: [[0.2, 0.2, 0.2]]
  - kind: translate
    tag: p
    args: [[0, 2, 0]]
    children:
      - kind: translate
        tag: t
        args: [[1, 0, 0]]
        children:
          - kind: sphere
            tag: ball
            args: [0.5]
"#;

    #[test]
    fn yaml_description_builds_and_renders() {
        let desc = SceneDescription::from_yaml(ORBIT).unwrap();
        assert_eq!(desc.node_count(), 5);
        let mut s = Scene::with_device(RecordingDevice::new());
        let roots = s.build(&desc).unwrap();
        assert_eq!(roots.len(), 3);
        assert_eq!(s.count(), 3);
        let report = s.render();
        assert!(report.is_ok(), "{:?}", report.errors);
        assert_eq!(report.draw_calls, 1);
        assert_eq!(report.visited.len(), 5);
    }

    #[test]
    fn json_description_parses() {
        let desc = SceneDescription::from_json(
            r#"{"roots": [{"kind": "group", "tag": "g", "children": [{"kind": "axis", "args": [2]}]}]}"#,
        )
        .unwrap();
        assert_eq!(desc.roots[0].children[0].args, vec![ArgValue::Number(2.0)]);
        let mut s = Scene::with_device(RecordingDevice::new());
        s.build(&desc).unwrap();
        assert_eq!(s.node_count(), 2);
    }

    #[test]
    fn errors_name_the_failing_node() {
        let desc = SceneDescription::from_yaml(
            "roots:\n  - kind: group\n    children:\n      - kind: translate\n        args: [oops]\n",
        )
        .unwrap();
        let mut s = Scene::with_device(RecordingDevice::new());
        let err = s.build(&desc).unwrap_err();
        assert_eq!(
            err.to_string(),
            "in node roots[0].children[0] (translate): argument 0: expected vec3, found string"
        );
        assert!(s.roots().is_empty());
    }

    #[test]
    fn failed_build_leaves_scene_untouched() {
        let broken = SceneDescription::from_yaml(
            "roots:\n  - kind: point\n  - kind: sphere\n  - kind: translate\n    args: [oops]\n",
        )
        .unwrap();
        let mut s = Scene::with_device(RecordingDevice::new());
        assert!(s.build(&broken).is_err());
        assert_eq!(s.graph().len(), 0);
        assert_eq!(s.resources().material_count(), 0);
        assert_eq!(s.resources().geometry_count(), 0);

        let ok = SceneDescription::from_yaml("roots:\n  - kind: sphere\n").unwrap();
        s.build(&ok).unwrap();
        let report = s.render();
        assert!(report.is_ok(), "{:?}", report.errors);
        assert_eq!(report.draw_calls, 1);
        assert_eq!(s.renderer().light_counts().point, 0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(SceneDescription::from_yaml("roots:\n  - kind: dummy\n    colour: red\n").is_err());
    }

    #[test]
    fn vectors_map_by_length() {
        assert_eq!(
            Value::from(&ArgValue::Vector(vec![1.0, 2.0, 3.0])),
            Value::Vec3(Vec3::new(1.0, 2.0, 3.0))
        );
        assert_eq!(
            Value::from(&ArgValue::Vector(vec![0.0, 0.0, 0.0, 1.0])),
            Value::Quat(Quat::IDENTITY)
        );
        assert_eq!(
            Value::from(&ArgValue::Vector(vec![1.0, 2.0])),
            Value::List(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn bundled_scenes_render_cleanly() {
        let orbit = SceneDescription::from_yaml(include_str!("../../../scenes/orbit.yaml")).unwrap();
        let shared = SceneDescription::from_json(include_str!("../../../scenes/shared.json")).unwrap();
        for desc in [orbit, shared] {
            let mut s = Scene::with_device(RecordingDevice::new());
            s.build(&desc).unwrap();
            for _ in 0..2 {
                let report = s.render();
                assert!(report.is_ok(), "{:?}", report.errors);
                assert!(report.draw_calls >= 2);
            }
        }
    }

    #[test]
    fn unsupported_extension() {
        let dir = std::env::temp_dir().join(format!("arbor-desc-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("scene.toml");
        std::fs::write(&file, "roots = []").unwrap();
        assert!(matches!(
            SceneDescription::load(&file),
            Err(SceneError::Format(ext)) if ext == "toml"
        ));
        let yaml = dir.join("scene.yaml");
        std::fs::write(&yaml, "roots: []\n").unwrap();
        assert_eq!(SceneDescription::load(&yaml).unwrap().roots.len(), 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
