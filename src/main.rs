use std::{env, path::PathBuf, process};

use rigimport::convert::{build_import_report, import_scene, write_import_report};
use rigimport::init_logging;
use rigimport::scene::SceneDump;
use rigimport::settings::{ImportSettings, load_import_settings};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if !(2..=4).contains(&args.len()) {
        eprintln!("Usage: rigimport <scene.json> [settings.json] [report.json]");
        process::exit(2);
    }

    init_logging(env::var_os("RIGIMPORT_VERBOSE").is_some());

    let scene_path = PathBuf::from(&args[1]);
    let settings = match args.get(2) {
        Some(path) => load_import_settings(&PathBuf::from(path))?,
        None => ImportSettings::default(),
    };

    let scene = SceneDump::load(&scene_path)?;
    let asset = import_scene(&scene, &settings, None)?;
    let report = build_import_report(&asset);

    println!(
        "Bones: {} (root: {})",
        report.bone_count,
        report.root_bone.as_deref().unwrap_or("-")
    );
    for mesh in &report.meshes {
        println!(
            "Mesh '{}': {} control points -> {} vertices ({} seam duplicates), {} triangles",
            mesh.name, mesh.control_points, mesh.vertices, mesh.seam_duplicates, mesh.triangles
        );
    }
    for clip in &report.clips {
        println!(
            "Clip '{}': {} frames every {:.4}s",
            clip.name, clip.frames, clip.frame_interval
        );
    }
    for failure in &report.failures {
        println!("Failed [{}] {}", failure.code, failure.message);
    }

    if let Some(path) = args.get(3) {
        let report_path = PathBuf::from(path);
        write_import_report(&report_path, &report)?;
        println!("Report: {}", report_path.display());
    }

    Ok(())
}
