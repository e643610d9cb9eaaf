use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;

use crate::error::ShaderError;

/// Extensions a template directory may serve.
pub const DEFAULT_EXTENSIONS: &[&str] = &["vert", "frag", "geom", "glsl"];

/// Variables visible to every shader template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateContext {
    pub version: String,
    pub ambient_lights_max: u32,
    pub directional_lights_max: u32,
    pub point_lights_max: u32,
    pub spot_lights_max: u32,
    pub material_textures_max: u32,
}

/// Named GLSL templates with `include` support.
///
/// Lookup order: templates added with [`Templates::insert`], then the
/// optional directory, then the built-in set.
pub struct Templates {
    env: Environment<'static>,
    directory: Option<PathBuf>,
}

impl fmt::Debug for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templates")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Templates {
    /// Only the built-in templates.
    pub fn builtin() -> Self {
        Self::build(None, Vec::new())
    }

    /// Serve templates from `dir` (restricted to `extensions`) before the
    /// built-in ones.
    pub fn with_directory(dir: impl Into<PathBuf>, extensions: &[&str]) -> Result<Self, ShaderError> {
        let dir = dir.into();
        let meta = std::fs::metadata(&dir).map_err(|source| ShaderError::Directory {
            path: dir.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(ShaderError::Directory {
                path: dir,
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }
        let exts = extensions.iter().map(|e| e.to_ascii_lowercase()).collect();
        Ok(Self::build(Some(dir), exts))
    }

    fn build(directory: Option<PathBuf>, extensions: Vec<String>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        let dir = directory.clone();
        env.set_loader(move |name| {
            if let Some(dir) = &dir
                && let Some(src) = load_from_dir(dir, &extensions, name)?
            {
                return Ok(Some(src));
            }
            Ok(builtin(name).map(str::to_string))
        });
        Self { env, directory }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Add or override a template. Syntax errors surface here.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<(), ShaderError> {
        let name = name.into();
        self.env
            .add_template_owned(name.clone(), source.into())
            .map_err(|e| ShaderError::template(&name, e))
    }

    /// Render `name` with `ctx`. Blank output is an error.
    pub fn render(&self, name: &str, ctx: &TemplateContext) -> Result<String, ShaderError> {
        let tmpl = self
            .env
            .get_template(name)
            .map_err(|e| ShaderError::template(name, e))?;
        let out = tmpl.render(ctx).map_err(|e| ShaderError::template(name, e))?;
        if out.trim().is_empty() {
            return Err(ShaderError::EmptySource(name.to_string()));
        }
        Ok(out)
    }
}

fn load_from_dir(
    dir: &Path,
    extensions: &[String],
    name: &str,
) -> Result<Option<String>, minijinja::Error> {
    let rel = Path::new(name);
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Ok(None);
    }
    let allowed = rel
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
    if !allowed {
        return Ok(None);
    }
    match std::fs::read_to_string(dir.join(rel)) {
        Ok(src) => Ok(Some(src)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("could not read template {name:?}"),
        )
        .with_source(e)),
    }
}

/// Built-in template sources.
pub fn builtin(name: &str) -> Option<&'static str> {
    match name {
        "basic.vert" => Some(BASIC_VERT),
        "basic.frag" => Some(BASIC_FRAG),
        "standard.vert" => Some(STANDARD_VERT),
        "standard.frag" => Some(STANDARD_FRAG),
        "lights.glsl" => Some(LIGHTS),
        "material.glsl" => Some(MATERIAL),
        "phong.glsl" => Some(PHONG),
        _ => None,
    }
}

const BASIC_VERT: &str = r#"#version {{ Version }}
in vec3 VertexPosition;
in vec3 VertexColor;

uniform mat4 MVP;

out vec3 Color;

void main() {
    Color = VertexColor;
    gl_Position = MVP * vec4(VertexPosition, 1.0);
}
"#;

const BASIC_FRAG: &str = r#"#version {{ Version }}
in vec3 Color;
out vec4 FragColor;

void main() {
    FragColor = vec4(Color, 1.0);
}
"#;

const LIGHTS: &str = r#"{% if AmbientLightsMax > 0 %}
uniform vec3 AmbientLightColor[{{ AmbientLightsMax }}];
{% endif %}
{% if DirectionalLightsMax > 0 %}
uniform vec3 DirLight[{{ 2 * DirectionalLightsMax }}];
#define DirLightColor(a) DirLight[2*a]
#define DirLightPosition(a) DirLight[2*a+1]
{% endif %}
{% if PointLightsMax > 0 %}
uniform vec3 PointLight[{{ 3 * PointLightsMax }}];
#define PointLightColor(a) PointLight[3*a]
#define PointLightPosition(a) PointLight[3*a+1]
#define PointLightLinearDecay(a) PointLight[3*a+2].x
#define PointLightQuadraticDecay(a) PointLight[3*a+2].y
{% endif %}
{% if SpotLightsMax > 0 %}
uniform vec3 SpotLight[{{ 5 * SpotLightsMax }}];
#define SpotLightColor(a) SpotLight[5*a]
#define SpotLightPosition(a) SpotLight[5*a+1]
#define SpotLightDirection(a) SpotLight[5*a+2]
#define SpotLightAngularDecay(a) SpotLight[5*a+3].x
#define SpotLightCutoffAngle(a) SpotLight[5*a+3].y
#define SpotLightLinearDecay(a) SpotLight[5*a+3].z
#define SpotLightQuadraticDecay(a) SpotLight[5*a+4].x
{% endif %}
"#;

const MATERIAL: &str = r#"uniform vec3 Material[5];
#define MatAmbientColor Material[0]
#define MatDiffuseColor Material[1]
#define MatSpecularColor Material[2]
#define MatEmissiveColor Material[3]
#define MatShininess Material[4].x
#define MatOpacity Material[4].y
{% if MaterialTexturesMax > 0 %}
uniform sampler2D MatTexture[{{ MaterialTexturesMax }}];
{% endif %}
"#;

const STANDARD_VERT: &str = r#"#version {{ Version }}
in vec3 VertexPosition;
in vec3 VertexNormal;
in vec2 VertexTexcoord;

uniform mat4 ModelMatrix;
uniform mat4 MVP;

out vec3 Position;
out vec3 Normal;
out vec2 FragTexcoord;

void main() {
    Position = vec3(ModelMatrix * vec4(VertexPosition, 1.0));
    Normal = normalize(mat3(transpose(inverse(ModelMatrix))) * VertexNormal);
    FragTexcoord = VertexTexcoord;
    gl_Position = MVP * vec4(VertexPosition, 1.0);
}
"#;

const PHONG: &str = r#"vec3 phong(vec3 position, vec3 normal, vec3 viewDir, vec3 diffuse) {
    vec3 color = MatEmissiveColor;
{% if AmbientLightsMax > 0 %}
    for (int i = 0; i < {{ AmbientLightsMax }}; i++) {
        color += AmbientLightColor[i] * MatAmbientColor;
    }
{% endif %}
{% if DirectionalLightsMax > 0 %}
    for (int i = 0; i < {{ DirectionalLightsMax }}; i++) {
        vec3 l = normalize(-DirLightPosition(i));
        float d = max(dot(normal, l), 0.0);
        vec3 h = normalize(l + viewDir);
        float s = pow(max(dot(normal, h), 0.0), MatShininess);
        color += DirLightColor(i) * (diffuse * d + MatSpecularColor * s);
    }
{% endif %}
{% if PointLightsMax > 0 %}
    for (int i = 0; i < {{ PointLightsMax }}; i++) {
        vec3 delta = PointLightPosition(i) - position;
        float dist = length(delta);
        vec3 l = delta / dist;
        float att = 1.0 / (1.0 + PointLightLinearDecay(i) * dist + PointLightQuadraticDecay(i) * dist * dist);
        float d = max(dot(normal, l), 0.0);
        color += PointLightColor(i) * diffuse * d * att;
    }
{% endif %}
{% if SpotLightsMax > 0 %}
    for (int i = 0; i < {{ SpotLightsMax }}; i++) {
        vec3 delta = SpotLightPosition(i) - position;
        float dist = length(delta);
        vec3 l = delta / dist;
        float angle = degrees(acos(dot(-l, normalize(SpotLightDirection(i)))));
        if (angle < SpotLightCutoffAngle(i)) {
            float spot = pow(max(dot(-l, normalize(SpotLightDirection(i))), 0.0), SpotLightAngularDecay(i));
            float att = 1.0 / (1.0 + SpotLightLinearDecay(i) * dist + SpotLightQuadraticDecay(i) * dist * dist);
            color += SpotLightColor(i) * diffuse * max(dot(normal, l), 0.0) * spot * att;
        }
    }
{% endif %}
    return color;
}
"#;

const STANDARD_FRAG: &str = r#"#version {{ Version }}
{% include "lights.glsl" %}
{% include "material.glsl" %}

uniform vec3 CameraPosition;

in vec3 Position;
in vec3 Normal;
in vec2 FragTexcoord;
out vec4 FragColor;

{% include "phong.glsl" %}

void main() {
    vec3 diffuse = MatDiffuseColor;
{% if MaterialTexturesMax > 0 %}
    diffuse *= texture(MatTexture[0], FragTexcoord).rgb;
{% endif %}
    vec3 viewDir = normalize(CameraPosition - Position);
    vec3 n = gl_FrontFacing ? normalize(Normal) : -normalize(Normal);
    FragColor = vec4(phong(Position, n, viewDir, diffuse), MatOpacity);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TemplateContext {
        TemplateContext {
            version: "410 core".into(),
            ..TemplateContext::default()
        }
    }

    #[test]
    fn renders_version() {
        let t = Templates::builtin();
        let src = t.render("basic.vert", &ctx()).unwrap();
        assert!(src.starts_with("#version 410 core"));
    }

    #[test]
    fn light_arrays_sized_from_context() {
        let t = Templates::builtin();
        let c = TemplateContext {
            ambient_lights_max: 1,
            point_lights_max: 2,
            ..ctx()
        };
        let src = t.render("standard.frag", &c).unwrap();
        assert!(src.contains("uniform vec3 AmbientLightColor[1];"));
        assert!(src.contains("uniform vec3 PointLight[6];"));
        assert!(!src.contains("DirLight["));
        assert!(!src.contains("MatTexture"));
    }

    #[test]
    fn inserted_template_overrides_builtin() {
        let mut t = Templates::builtin();
        t.insert("basic.frag", "override {{ Version }}").unwrap();
        assert_eq!(t.render("basic.frag", &ctx()).unwrap(), "override 410 core");
    }

    #[test]
    fn missing_template_is_reported() {
        let t = Templates::builtin();
        let err = t.render("nope.frag", &ctx()).unwrap_err();
        assert!(matches!(err, ShaderError::MissingTemplate(ref n) if n == "nope.frag"));
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let mut t = Templates::builtin();
        t.insert("bad.frag", "{{ NotAVariable }}").unwrap();
        assert!(matches!(
            t.render("bad.frag", &ctx()),
            Err(ShaderError::Template { .. })
        ));
    }

    #[test]
    fn unbalanced_block_fails_on_insert() {
        let mut t = Templates::builtin();
        let err = t.insert("broken.frag", "{% if Version %}no end").unwrap_err();
        assert!(matches!(err, ShaderError::Template { ref name, .. } if name == "broken.frag"));
        assert!(t.insert("stray.frag", "x {% endif %}").is_err());
    }

    #[test]
    fn include_cycle_is_an_error() {
        let mut t = Templates::builtin();
        t.insert("a.glsl", "a {% include \"b.glsl\" %}").unwrap();
        t.insert("b.glsl", "b {% include \"a.glsl\" %}").unwrap();
        assert!(matches!(
            t.render("a.glsl", &ctx()),
            Err(ShaderError::Template { .. })
        ));
    }

    #[test]
    fn blank_render_is_empty_source() {
        let mut t = Templates::builtin();
        t.insert("blank.geom", "{% if PointLightsMax > 0 %}x{% endif %}").unwrap();
        assert!(matches!(
            t.render("blank.geom", &ctx()),
            Err(ShaderError::EmptySource(_))
        ));
    }

    #[test]
    fn directory_templates_come_first() {
        let dir = std::env::temp_dir().join(format!("arbor-shader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("basic.frag"), "from disk {{ Version }}").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let t = Templates::with_directory(&dir, DEFAULT_EXTENSIONS).unwrap();
        assert_eq!(t.render("basic.frag", &ctx()).unwrap(), "from disk 410 core");
        assert!(t.render("basic.vert", &ctx()).unwrap().contains("VertexPosition"));
        assert!(matches!(
            t.render("notes.txt", &ctx()),
            Err(ShaderError::MissingTemplate(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_rejected() {
        let err = Templates::with_directory("/definitely/not/here", DEFAULT_EXTENSIONS).unwrap_err();
        assert!(matches!(err, ShaderError::Directory { .. }));
    }
}
