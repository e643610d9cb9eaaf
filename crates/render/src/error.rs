use arbor_resource::ResourceError;
use arbor_shader::ShaderError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
