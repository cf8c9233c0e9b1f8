use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gmdc_tools_lib::{build_bones, import_file, GmdcFile, ImportOptions, SceneDocument, Skeleton};

/// Decode a GMDC file and report what an import would create.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GMDC file to inspect
    file: PathBuf,

    /// TOML file with import options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the imported scene as JSON
    #[arg(long)]
    json: bool,

    /// Print the bone hierarchy
    #[arg(long)]
    tree: bool,

    /// Do not create an armature
    #[arg(long)]
    no_skeleton: bool,

    /// Keep file coordinates instead of mirroring
    #[arg(long)]
    no_mirror: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut options = match &args.config {
        Some(path) => ImportOptions::load(path)?,
        None => ImportOptions::default(),
    };
    if args.no_skeleton {
        options.import_skeleton = false;
    }
    if args.no_mirror {
        options.mirror = None;
    }

    let mut scene = SceneDocument::new();
    let report = import_file(&args.file, &mut scene, &options)
        .with_context(|| format!("Failed to import {}", args.file.display()))?;

    if args.tree {
        let data = GmdcFile::open(&args.file)?.data()?;
        let skeleton =
            Skeleton::build(build_bones(&data.bone_links)?, options.zero_length_epsilon);
        print!("{}", skeleton.tree_string()?);
    }

    if args.json {
        println!("{}", scene.to_json()?);
    } else {
        println!("{}: {} bones", args.file.display(), report.bone_count);
        for mesh in &scene.meshes {
            println!(
                "  {}: {} vertices, {} faces",
                mesh.name,
                mesh.vertices.len(),
                mesh.faces.len()
            );
        }
    }

    for line in report.messages() {
        eprintln!("{}", line);
    }

    Ok(())
}
