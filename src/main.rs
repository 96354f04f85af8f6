use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};

mod audio;
mod block;
mod catalog;
mod compose;
mod config;
mod extract;
mod generate;
mod labels;
mod metadata;

use audio::{AudioCodec, FfmpegCodec};
use block::{BlockType, SliceSpec};
use catalog::Catalog;
use compose::Composer;
use config::Settings;
use extract::Extractor;
use labels::parse_labels;

const USAGE: &str = "staccato - slice audio into tagged blocks and sequence them

USAGE:
  staccato slice   <audio-file> <blocks-dir> [label-file]
  staccato random  <audio-file> <blocks-dir> [minutes]
  staccato build   <blocks-dir> <output-file> [minutes]
  staccato check   <blocks-dir>
  staccato rebuild <blocks-dir>

slice    cut blocks at the climax points listed in the label file
         (defaults to the audio file with a .txt extension)
random   cut blocks at random climax points; with [minutes], a balanced
         amount per type, otherwise scaled to the source length
build    mix cataloged blocks into one sequence plus a timeline manifest
check    compare the catalog against the files actually present
rebuild  reconstruct the catalog from the files and their embedded tags";

fn main() -> Result<(), Box<dyn Error>> {
    let settings = Settings::load()?;
    settings.validate()?;

    let args: Vec<String> = env::args().collect();
    let arg = |i: usize| args.get(i).map(PathBuf::from);

    match args.get(1).map(String::as_str) {
        Some("slice") => {
            let (Some(audio), Some(dir)) = (arg(2), arg(3)) else {
                return usage();
            };
            cmd_slice(&settings, &audio, &dir, arg(4))
        }
        Some("random") => {
            let (Some(audio), Some(dir)) = (arg(2), arg(3)) else {
                return usage();
            };
            let minutes = args.get(4).map(|m| m.parse::<f64>()).transpose()?;
            cmd_random(&settings, &audio, &dir, minutes)
        }
        Some("build") => {
            let (Some(dir), Some(output)) = (arg(2), arg(3)) else {
                return usage();
            };
            let minutes = args.get(4).map(|m| m.parse::<f64>()).transpose()?;
            cmd_build(&settings, &dir, &output, minutes)
        }
        Some("check") => {
            let Some(dir) = arg(2) else { return usage() };
            cmd_check(&settings, &dir)
        }
        Some("rebuild") => {
            let Some(dir) = arg(2) else { return usage() };
            cmd_rebuild(&settings, &dir)
        }
        _ => usage(),
    }
}

fn usage() -> Result<(), Box<dyn Error>> {
    eprintln!("{USAGE}");
    Err("missing or unknown command".into())
}

fn cmd_slice(
    settings: &Settings,
    audio: &Path,
    blocks_dir: &Path,
    labels: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let labels_path = labels.unwrap_or_else(|| audio.with_extension("txt"));
    if !labels_path.exists() {
        return Err(format!(
            "label file not found: {}\n\
             export labels from your audio editor (in Audacity: place labels at the \
             climax points, then File -> Export Other -> Export Labels) and save them \
             next to the audio file",
            labels_path.display()
        )
        .into());
    }

    let codec = FfmpegCodec;
    println!("loading {}...", audio.display());
    let source = codec.decode(audio)?;
    let duration_secs = source.len_ms() as f64 / 1000.0;
    println!("audio loaded: {duration_secs:.2} seconds");

    let text = std::fs::read_to_string(&labels_path)?;
    let parsed = parse_labels(&text, settings.slicer.slice_secs, Some(duration_secs));
    for d in &parsed.diagnostics {
        eprintln!("warning: {d}");
    }
    if parsed.specs.is_empty() {
        println!("no valid slices found in {}", labels_path.display());
        return Ok(());
    }

    run_extraction(settings, &codec, &source, audio, &parsed.specs, blocks_dir)
}

fn cmd_random(
    settings: &Settings,
    audio: &Path,
    blocks_dir: &Path,
    minutes: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let codec = FfmpegCodec;
    println!("loading {}...", audio.display());
    let source = codec.decode(audio)?;
    let duration_secs = source.len_ms() as f64 / 1000.0;
    println!("audio loaded: {duration_secs:.2} seconds");

    let mut rng = rand::rng();
    let outcome = match minutes {
        Some(minutes) => generate::balanced(duration_secs, minutes, &settings.slicer, &mut rng)?,
        None => generate::density_based(duration_secs, &settings.slicer, &mut rng),
    };
    for d in &outcome.diagnostics {
        eprintln!("warning: {d}");
    }
    if outcome.specs.is_empty() {
        println!("no slice positions could be placed");
        return Ok(());
    }

    run_extraction(settings, &codec, &source, audio, &outcome.specs, blocks_dir)
}

fn run_extraction(
    settings: &Settings,
    codec: &FfmpegCodec,
    source: &audio::AudioBuffer,
    origin: &Path,
    specs: &[SliceSpec],
    blocks_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    println!("found {} slices to process", specs.len());
    for (i, spec) in specs.iter().enumerate() {
        println!(
            "  {}. {} at {:.1}s: {}",
            i + 1,
            spec.block_type,
            spec.climax_secs,
            spec.description
        );
    }

    std::fs::create_dir_all(blocks_dir)?;
    let mut catalog = Catalog::load(&blocks_dir.join(&settings.library.catalog_file))?;
    println!(
        "next sequence numbers - m: {}, v: {}, j: {}",
        catalog.next_sequence_number(BlockType::Music),
        catalog.next_sequence_number(BlockType::Voice),
        catalog.next_sequence_number(BlockType::Jingle),
    );

    let mut extractor = Extractor::new(codec, &settings.slicer);
    let report = extractor.extract_batch(source, origin, specs, blocks_dir, &mut catalog);

    for outcome in &report.created {
        let name = outcome
            .block
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| outcome.block.path.display().to_string());
        println!(
            "created: {name} ({:.1}s)",
            outcome.block.duration_ms as f64 / 1000.0
        );
    }
    for d in &report.diagnostics {
        eprintln!("warning: {d}");
    }

    print!(
        "{}",
        catalog.reconcile(blocks_dir, &settings.library.extensions)
    );
    Ok(())
}

fn cmd_build(
    settings: &Settings,
    blocks_dir: &Path,
    output: &Path,
    minutes: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let codec = FfmpegCodec;
    let composer = Composer::new(&codec, settings);
    let report = composer.compose(blocks_dir, output, minutes, &mut rand::rng())?;

    for d in &report.problematic {
        eprintln!("warning: {d}");
    }
    println!(
        "sequence written: {} ({} blocks per channel, {})",
        report.output.display(),
        report.blocks_per_channel,
        compose::format_offset(report.total_ms),
    );
    println!("timeline written: {}", report.manifest.display());
    Ok(())
}

fn cmd_check(settings: &Settings, blocks_dir: &Path) -> Result<(), Box<dyn Error>> {
    let catalog = Catalog::load(&blocks_dir.join(&settings.library.catalog_file))?;
    print!(
        "{}",
        catalog.reconcile(blocks_dir, &settings.library.extensions)
    );
    Ok(())
}

fn cmd_rebuild(settings: &Settings, blocks_dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut catalog = Catalog::load(&blocks_dir.join(&settings.library.catalog_file))?;
    let report = catalog.rebuild_from_folder(blocks_dir, &settings.library.extensions)?;

    for name in &report.removed {
        println!("removed from catalog (file gone): {name}");
    }
    for name in &report.adopted {
        println!("adopted into catalog: {name}");
    }
    if report.saved {
        println!("catalog rewritten: {}", catalog.path().display());
    } else {
        println!("catalog already matches the folder");
    }
    Ok(())
}
