//! fx-evolve CLI - Match an input recording to a target by evolving effect settings.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use fx_evolve::{
    audio::{AudioBuffer, load_wav, save_wav, trim_directory},
    compute::{
        Cabinet, EffectChain, Renderer, SimilarityScorer,
        evolution::{AudioFitness, EvolutionEngine, ScratchSpace},
    },
    schema::{CandidateSnapshot, GenerationReport, RunConfig},
};

/// Default length kept by `trim`, in seconds.
const DEFAULT_TRIM_SECONDS: f32 = 10.0;

/// A stored genome: either a full snapshot (as written to `best.json`) or a
/// bare gene array.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredGenome {
    Snapshot(CandidateSnapshot),
    Genes(Vec<f32>),
}

impl StoredGenome {
    fn into_genes(self) -> Vec<f32> {
        match self {
            StoredGenome::Snapshot(s) => s.genome,
            StoredGenome::Genes(g) => g,
        }
    }
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--example") => print_example_config(),
        Some("run") if args.len() >= 3 => run(Path::new(&args[2])),
        Some("render") if args.len() >= 5 => render(
            Path::new(&args[2]),
            Path::new(&args[3]),
            Path::new(&args[4]),
        ),
        Some("trim") if args.len() >= 4 => {
            let seconds = args
                .get(4)
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TRIM_SECONDS);
            trim(Path::new(&args[2]), Path::new(&args[3]), seconds);
        }
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!();
    eprintln!("Search for effect-chain settings that turn an input recording into a target.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <config.json>                         Run the evolutionary search");
    eprintln!("  render <config.json> <genome.json> <out>  Render a stored genome to WAV");
    eprintln!("  trim <in_dir> <out_dir> [seconds]         Cut WAV files to their first N seconds");
    eprintln!("  --example                                 Print an example configuration");
}

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("Error {}: {}", context, err);
    std::process::exit(1);
}

fn load_config(path: &Path) -> RunConfig {
    let config_str =
        fs::read_to_string(path).unwrap_or_else(|e| fail("reading config file", e));
    let config: RunConfig =
        serde_json::from_str(&config_str).unwrap_or_else(|e| fail("parsing config", e));
    config
        .validate()
        .unwrap_or_else(|e| fail("validating config", e));
    config
}

fn load_audio(path: &Path) -> AudioBuffer {
    load_wav(path).unwrap_or_else(|e| fail("loading audio", e))
}

fn load_cabinet(config: &RunConfig) -> Option<Cabinet> {
    config.output.cabinet_ir.as_ref().map(|path| {
        log::info!("Cabinet IR: {}", path.display());
        Cabinet::load(path).unwrap_or_else(|e| fail("loading cabinet IR", e))
    })
}

fn run(config_path: &Path) {
    let config = load_config(config_path);

    let input = load_audio(&config.input_audio);
    let target = load_audio(&config.target_audio);

    println!("fx-evolve");
    println!("=========");
    println!("Input:  {} ({:.2}s)", config.input_audio.display(), input.duration_seconds());
    println!("Target: {} ({:.2}s)", config.target_audio.display(), target.duration_seconds());
    println!(
        "Chain: {}",
        config
            .effects
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    println!("Genes: {}", config.evolution.genome_length);
    println!(
        "Population: {} x {} generations",
        config.evolution.population.size, config.evolution.population.max_generations
    );
    println!();

    let chain = EffectChain::new(config.effects.clone(), input);
    let cabinet = load_cabinet(&config);
    let scorer = SimilarityScorer::new(config.similarity.clone());
    let fitness = AudioFitness::new(chain.clone(), scorer, target)
        .with_materialized_renders(config.output.materialize_renders);

    let mut engine = EvolutionEngine::new(config.evolution.clone(), fitness)
        .unwrap_or_else(|e| fail("creating engine", e));

    if config.output.materialize_renders {
        let scratch = match &config.output.scratch_dir {
            Some(dir) => ScratchSpace::new_in(dir),
            None => ScratchSpace::new(),
        }
        .unwrap_or_else(|e| fail("creating scratch space", e));
        log::info!("Scratch space: {}", scratch.path().display());
        engine = engine.with_scratch_space(scratch);
    }

    let output_dir = config.output.dir.clone();
    let mut history = output_dir.as_ref().map(|dir| {
        fs::create_dir_all(dir).unwrap_or_else(|e| fail("creating output directory", e));
        let file = File::create(dir.join(&config.output.history_file))
            .unwrap_or_else(|e| fail("creating history file", e));
        BufWriter::new(file)
    });

    let result = engine
        .run_with_callback(|report| {
            println!(
                "  Generation {}/{}: best={:.4} avg={:.4} failed={}",
                report.generation,
                report.total_generations,
                report.best.fitness,
                report.avg_fitness,
                report.failed_evaluations
            );

            if let Some(writer) = history.as_mut()
                && let Err(e) = write_history_line(writer, report)
            {
                log::warn!("Failed to append history: {}", e);
            }

            if config.output.render_best
                && let Some(dir) = &output_dir
            {
                let path = dir.join(format!("best_gen{}.wav", report.generation));
                if let Err(e) = render_to(&chain, cabinet.as_ref(), &report.best.genome, &path) {
                    log::warn!("Failed to render {}: {}", path.display(), e);
                }
            }
        })
        .unwrap_or_else(|e| fail("during evolution", e));

    if let Some(mut writer) = history
        && let Err(e) = writer.flush()
    {
        log::warn!("Failed to flush history: {}", e);
    }

    println!();
    println!("Stopped: {:?}", result.stats.stop_reason);
    println!("Generations: {}", result.stats.generations);
    println!(
        "Evaluations: {} ({} failed, {:.1}/s)",
        result.stats.total_evaluations,
        result.stats.failed_evaluations,
        result.stats.evaluations_per_second
    );
    println!("Time: {:.2}s", result.stats.elapsed_seconds);
    println!();
    println!("Best fitness: {:.4}", result.best.fitness);
    match chain.describe(&result.best.genome) {
        Ok(lines) => lines.iter().for_each(|line| println!("  {}", line)),
        Err(e) => log::warn!("Cannot describe best genome: {}", e),
    }

    if let Some(dir) = &output_dir {
        let best_json = serde_json::to_string_pretty(&result.best)
            .unwrap_or_else(|e| fail("serializing best genome", e));
        fs::write(dir.join("best.json"), best_json)
            .unwrap_or_else(|e| fail("writing best genome", e));
        render_to(&chain, cabinet.as_ref(), &result.best.genome, &dir.join("best.wav"))
            .unwrap_or_else(|e| fail("rendering best genome", e));
        println!();
        println!("Results written to {}", dir.display());
    }
}

fn write_history_line(
    writer: &mut BufWriter<File>,
    report: &GenerationReport,
) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, report)?;
    writeln!(writer)
}

fn render_to(
    chain: &EffectChain,
    cabinet: Option<&Cabinet>,
    genes: &[f32],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut audio = chain.render(genes)?;
    if let Some(cabinet) = cabinet {
        audio = cabinet.apply(&audio)?;
    }
    save_wav(path, &audio)?;
    Ok(())
}

fn render(config_path: &Path, genome_path: &Path, output_path: &Path) {
    let config = load_config(config_path);

    let genome_str =
        fs::read_to_string(genome_path).unwrap_or_else(|e| fail("reading genome file", e));
    let genes = serde_json::from_str::<StoredGenome>(&genome_str)
        .unwrap_or_else(|e| fail("parsing genome", e))
        .into_genes();

    let chain = EffectChain::new(config.effects.clone(), load_audio(&config.input_audio));
    let cabinet = load_cabinet(&config);
    let lines = chain
        .describe(&genes)
        .unwrap_or_else(|e| fail("reading genome", e));

    println!("Rendering {} with:", config.input_audio.display());
    for line in lines {
        println!("  {}", line);
    }

    render_to(&chain, cabinet.as_ref(), &genes, output_path).unwrap_or_else(|e| fail("rendering", e));
    println!("Wrote {}", output_path.display());
}

fn trim(input_dir: &Path, output_dir: &Path, seconds: f32) {
    let written = trim_directory(input_dir, output_dir, seconds)
        .unwrap_or_else(|e| fail("trimming audio", e));

    for path in &written {
        println!("  {}", path.display());
    }
    println!(
        "Trimmed {} file(s) to {:.1}s into {}",
        written.len(),
        seconds,
        output_dir.display()
    );
}

fn print_example_config() {
    let mut config = RunConfig {
        input_audio: PathBuf::from("audio/clean.wav"),
        target_audio: PathBuf::from("audio/processed.wav"),
        ..Default::default()
    };
    config.output.dir = Some(PathBuf::from("results"));
    config.output.render_best = true;
    config.evolution.random_seed = Some(42);

    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("serializing example", e),
    }
}
