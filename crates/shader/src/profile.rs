use std::collections::BTreeMap;

use arbor_common::LightCounts;
use arbor_resource::{Material, UseLights};

use crate::templates::TemplateContext;

pub const DEFAULT_VERSION: &str = "410 core";

/// The templates one program is built from. An empty key skips that stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramSource {
    pub tag: String,
    pub version: String,
    pub fragment: String,
    pub geometry: String,
    pub vertex: String,
}

impl ProgramSource {
    pub fn new(tag: &str, vertex: &str, fragment: &str) -> Self {
        Self {
            tag: tag.to_string(),
            version: DEFAULT_VERSION.to_string(),
            fragment: fragment.to_string(),
            geometry: String::new(),
            vertex: vertex.to_string(),
        }
    }

    pub fn with_geometry(mut self, geometry: &str) -> Self {
        self.geometry = geometry.to_string();
        self
    }

    fn same_keys(&self, other: &ProgramSource) -> bool {
        self.fragment == other.fragment
            && self.geometry == other.geometry
            && self.vertex == other.vertex
    }
}

/// Registered program sources by tag. Unknown tags resolve to `basic`.
#[derive(Debug, Clone)]
pub struct ShaderSources {
    by_tag: BTreeMap<String, ProgramSource>,
}

impl Default for ShaderSources {
    fn default() -> Self {
        let mut s = Self {
            by_tag: BTreeMap::new(),
        };
        s.register(ProgramSource::new("basic", "basic.vert", "basic.frag"));
        s.register(ProgramSource::new("standard", "standard.vert", "standard.frag"));
        s
    }
}

impl ShaderSources {
    pub fn register(&mut self, source: ProgramSource) {
        self.by_tag.insert(source.tag.clone(), source);
    }

    pub fn get(&self, tag: &str) -> &ProgramSource {
        match self.by_tag.get(tag) {
            Some(s) => s,
            None => {
                tracing::debug!(tag, "unknown shader tag, using basic");
                // registered by Default and never removed
                &self.by_tag["basic"]
            }
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }
}

/// What a material needs from a program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Profile {
    pub source: ProgramSource,
    pub independent: bool,
    pub lights: UseLights,
    pub lights_max: LightCounts,
    pub textures_max: u32,
}

impl Profile {
    /// Profile for `material` under the scene's current light counts.
    pub fn for_material(material: &Material, scene_lights: LightCounts, sources: &ShaderSources) -> Self {
        let source = sources.get(&material.shader).clone();
        if material.independent {
            return Self {
                source,
                independent: true,
                lights: material.lights,
                lights_max: LightCounts::default(),
                textures_max: 0,
            };
        }
        Self {
            source,
            independent: false,
            lights: material.lights,
            lights_max: material.lights.filter(scene_lights),
            textures_max: material.textures().len() as u32,
        }
    }

    /// Whether a program built for `self` can serve `requested`.
    ///
    /// Tag and template keys must agree. An independent request ignores the
    /// light and texture counts; otherwise every count must match.
    pub fn matches(&self, requested: &Profile) -> bool {
        if self.source.tag != requested.source.tag || !self.source.same_keys(&requested.source) {
            return false;
        }
        if requested.independent {
            return true;
        }
        self.lights_max == requested.lights_max && self.textures_max == requested.textures_max
    }

    pub fn context(&self) -> TemplateContext {
        TemplateContext {
            version: self.source.version.clone(),
            ambient_lights_max: self.lights_max.ambient,
            directional_lights_max: self.lights_max.directional,
            point_lights_max: self.lights_max.point,
            spot_lights_max: self.lights_max.spot,
            material_textures_max: self.textures_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::Color;

    fn lights(ambient: u32, point: u32) -> LightCounts {
        LightCounts {
            ambient,
            point,
            ..LightCounts::default()
        }
    }

    #[test]
    fn unknown_tag_falls_back_to_basic() {
        let s = ShaderSources::default();
        assert_eq!(s.get("toon").tag, "basic");
        assert_eq!(s.get("standard").tag, "standard");
    }

    #[test]
    fn independent_profiles_ignore_light_counts() {
        let s = ShaderSources::default();
        let m = Material::basic();
        let a = Profile::for_material(&m, lights(1, 0), &s);
        let mut b = Profile::for_material(&m, lights(3, 4), &s);
        b.lights_max = lights(3, 4);
        assert!(a.matches(&b));
        assert!(b.matches(&a));
    }

    #[test]
    fn dependent_profiles_need_equal_counts() {
        let s = ShaderSources::default();
        let m = Material::standard(Color::WHITE);
        let a = Profile::for_material(&m, lights(1, 0), &s);
        let b = Profile::for_material(&m, lights(1, 2), &s);
        assert!(!a.matches(&b));
        assert!(a.matches(&Profile::for_material(&m, lights(1, 0), &s)));
    }

    #[test]
    fn different_tags_never_match() {
        let s = ShaderSources::default();
        let a = Profile::for_material(&Material::basic(), LightCounts::default(), &s);
        let b = Profile {
            independent: true,
            ..Profile::for_material(&Material::standard(Color::WHITE), LightCounts::default(), &s)
        };
        assert!(!a.matches(&b));
    }

    #[test]
    fn light_mask_limits_profile_counts() {
        let s = ShaderSources::default();
        let mut m = Material::standard(Color::WHITE);
        m.lights = UseLights::AMBIENT;
        let p = Profile::for_material(&m, lights(2, 5), &s);
        assert_eq!(p.lights_max, lights(2, 0));
        assert_eq!(p.context().ambient_lights_max, 2);
    }
}
