use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("shader template {0:?} not found")]
    MissingTemplate(String),
    #[error("shader template {0:?} rendered to an empty source")]
    EmptySource(String),
    #[error("failed to render shader template {name:?}: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("failed to compile {stage} shader {name:?}: {log}")]
    Compile {
        stage: &'static str,
        name: String,
        log: String,
    },
    #[error("failed to link program {tag:?}: {log}")]
    Link { tag: String, log: String },
    #[error("shader template directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ShaderError {
    pub(crate) fn template(name: &str, source: minijinja::Error) -> Self {
        if source.kind() == minijinja::ErrorKind::TemplateNotFound {
            ShaderError::MissingTemplate(name.to_string())
        } else {
            ShaderError::Template {
                name: name.to_string(),
                source,
            }
        }
    }
}
