use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use arbor_device::RecordingDevice;
use arbor_kernel::{Engine, EngineConfig};
use arbor_render::{RenderSettings, Renderer};
use arbor_scene::{Scene, SceneDescription, SceneSystem};
use arbor_shader::{DEFAULT_EXTENSIONS, ShaderCache, Templates};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Scene used when no `--scene` file is given.
const DEMO_SCENE: &str = r#"
roots:
  - kind: camera
    tag: eye
    args: [perspective, 65, 1.333]
    properties:
      translate: [0, 2, 8]
  - kind: ambient
    tag: fill
    args: [[0.2, 0.2, 0.2]]
  - kind: point
    tag: lamp
    args: [[1, 1, 0.9], 1.5]
  - kind: axis
    tag: origin
    args: [2]
  - kind: translate
    tag: orbit
    args: [[0, 1, 0]]
    children:
      - kind: sphere
        tag: planet
        args: [1, [0.2, 0.4, 1]]
      - kind: translate
        tag: moon-offset
        args: [[2, 0, 0]]
        children:
          - kind: sphere
            tag: moon
            args: [0.3]
"#;

#[derive(Parser)]
#[command(name = "arbor-cli", about = "Headless frame driver for arbor scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Render frames on the recording device and print per-frame reports
    Render {
        /// Scene description (.yaml, .yml or .json); a demo scene otherwise
        #[arg(short, long)]
        scene: Option<PathBuf>,
        /// Number of frames to run
        #[arg(short, long, default_value = "1")]
        frames: u64,
        /// Directory searched for shader templates before the built-ins
        #[arg(short, long)]
        templates: Option<PathBuf>,
        /// Print the recording device's call summary at the end
        #[arg(long)]
        device: bool,
    },
    /// Print the node tree of a scene description
    Inspect {
        /// Scene description (.yaml, .yml or .json); a demo scene otherwise
        #[arg(short, long)]
        scene: Option<PathBuf>,
    },
}

fn load_description(path: Option<&Path>) -> anyhow::Result<SceneDescription> {
    match path {
        Some(p) => SceneDescription::load(p)
            .with_context(|| format!("loading scene description {}", p.display())),
        None => Ok(SceneDescription::from_yaml(DEMO_SCENE)?),
    }
}

fn build_scene(
    description: &SceneDescription,
    templates: Option<&Path>,
) -> anyhow::Result<Scene<RecordingDevice>> {
    let templates = match templates {
        Some(dir) => Templates::with_directory(dir, DEFAULT_EXTENSIONS)
            .with_context(|| format!("opening template directory {}", dir.display()))?,
        None => Templates::builtin(),
    };
    let renderer = Renderer::new(
        RecordingDevice::new(),
        ShaderCache::new(templates),
        RenderSettings::default(),
    );
    let mut scene = Scene::new(renderer);
    scene.build(description)?;
    Ok(scene)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("arbor-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", arbor_common::crate_info());
            println!("device: {}", arbor_device::crate_info());
            println!("resource: {}", arbor_resource::crate_info());
            println!("shader: {}", arbor_shader::crate_info());
            println!("render: {}", arbor_render::crate_info());
            println!("scene: {}", arbor_scene::crate_info());
            println!("kernel: {}", arbor_kernel::crate_info());
        }
        Commands::Render {
            scene,
            frames,
            templates,
            device,
        } => {
            let description = load_description(scene.as_deref())?;
            let scene = build_scene(&description, templates.as_deref())?;
            println!(
                "Scene: roots={}, nodes={}, leaves={}",
                scene.roots().len(),
                scene.node_count(),
                scene.count()
            );

            let device_summary = Rc::new(RefCell::new(String::new()));
            let summary_out = device_summary.clone();
            let system = SceneSystem::new(scene).with_observer(Box::new(move |report, scene| {
                println!(
                    "Frame {}: visited={}, draws={}, compiled={}, errors={}",
                    report.frame,
                    report.visited.len(),
                    report.draw_calls,
                    report.programs_compiled,
                    report.errors.len()
                );
                for e in &report.errors {
                    println!("  error: {e}");
                }
                *summary_out.borrow_mut() = scene.renderer().device().summary();
            }));

            let mut engine = Engine::new(EngineConfig {
                max_frames: Some(frames),
                ..EngineConfig::default()
            });
            engine.add_system(Box::new(system));
            tracing::info!(frames, "starting render run");
            let run = engine.run();
            tracing::info!(
                frames = run.frames,
                errors = run.errors,
                killed = run.killed,
                "render run finished"
            );

            println!(
                "Run: frames={}, errors={}, killed={}",
                run.frames, run.errors, run.killed
            );
            if device {
                print!("{}", device_summary.borrow());
            }
            if let Some(e) = run.last_error {
                anyhow::bail!("stopped after a failed frame: {e}");
            }
        }
        Commands::Inspect { scene } => {
            let description = load_description(scene.as_deref())?;
            let scene = build_scene(&description, None)?;
            print!("{}", scene.outline());
            println!(
                "roots={}, nodes={}, leaves={}",
                scene.roots().len(),
                scene.node_count(),
                scene.count()
            );
        }
    }

    Ok(())
}
