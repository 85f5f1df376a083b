use cartel::capture::HtmlPrintFallback;
use cartel::distribution::{ComposerMergeFunction, InMemorySendRepository};
use cartel::{Branch, CartelConfig, PipelineBuilder, PosterPipeline, RawPoster, SendOrchestrator, SendRequest};
use cartel_resource::{FilesystemObjectStorage, FilesystemResourceProvider};
use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const BUCKET: &str = "carteles";

fn usage(program: &str) -> ! {
    eprintln!("Generates A4 landscape poster PDFs, one page per poster.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {} <posters.json> <output.pdf>", program);
    eprintln!("  {} send <posters.json> <storage-dir> <branch>[,<branch>...]", program);
    eprintln!();
    eprintln!("<posters.json> holds an array of {{ template, product, edits }} objects.");
    eprintln!("Image references are resolved relative to the posters file.");
    eprintln!("Set CARTEL_CONFIG to a JSON config file to override the defaults.");
    std::process::exit(1);
}

fn load_config() -> Result<CartelConfig, Box<dyn Error>> {
    Ok(match env::var_os("CARTEL_CONFIG") {
        Some(path) => CartelConfig::from_json_file(path)?,
        None => CartelConfig::default(),
    })
}

fn load_posters(path: &Path) -> Result<Vec<RawPoster>, Box<dyn Error>> {
    println!("Loading posters from {}", path.display());
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn build_pipeline(config: &CartelConfig, posters_path: &Path, fallback_dir: &Path) -> Result<PosterPipeline, Box<dyn Error>> {
    let resource_root = posters_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(PipelineBuilder::new()
        .with_config(config.pipeline.clone())
        .with_resources(Arc::new(FilesystemResourceProvider::new(resource_root)))
        .with_system_fonts()
        .with_print_fallback(Arc::new(HtmlPrintFallback::new(fallback_dir)))
        .build()?)
}

fn generate(posters_path: &Path, output_path: &Path) -> Result<(), Box<dyn Error>> {
    let config = load_config()?;
    let posters = load_posters(posters_path)?;
    let fallback_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let pipeline = build_pipeline(&config, posters_path, fallback_dir)?;

    println!("Generating {} poster(s)...", posters.len());
    let pdf = pipeline.generate(&posters)?;
    fs::write(output_path, &pdf.bytes)?;

    println!(
        "Wrote {} page(s) to {} using '{}' capture",
        pdf.page_count(),
        output_path.display(),
        pdf.strategy
    );
    Ok(())
}

fn send(posters_path: &Path, storage_dir: &Path, branches: &str) -> Result<(), Box<dyn Error>> {
    let config = load_config()?;
    let posters = load_posters(posters_path)?;
    let pipeline = build_pipeline(&config, posters_path, storage_dir)?;

    let storage = Arc::new(FilesystemObjectStorage::new(storage_dir, BUCKET));
    let orchestrator = SendOrchestrator::new(
        Arc::new(pipeline),
        storage.clone(),
        Arc::new(ComposerMergeFunction::new(storage)),
        Arc::new(InMemorySendRepository::new()),
    )
    .with_config(config.distribution);

    let request = SendRequest {
        template_name: posters_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "posters".into()),
        template_id: None,
        created_by: env::var("USER").unwrap_or_else(|_| "cli".into()),
        posters,
        branches: branches
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| Branch::new(b, b))
            .collect(),
    };

    let outcome = tokio::runtime::Runtime::new()?.block_on(orchestrator.send(request))?;
    println!(
        "Send {} {} to {} branch(es){}",
        outcome.batch.id,
        if outcome.chunked { "merged" } else { "generated" },
        outcome.items.len(),
        if outcome.chunked {
            format!(" from {} chunks", outcome.chunk_count)
        } else {
            String::new()
        }
    );
    for item in &outcome.items {
        println!("  {} -> {}", item.branch_name, storage_dir.join(BUCKET).join(&item.pdf_path).display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [_, "send", posters, storage, branches] => send(Path::new(posters), Path::new(storage), branches),
        [_, posters, output] => generate(Path::new(posters), Path::new(output)),
        _ => usage(args.first().map(String::as_str).unwrap_or("cartel")),
    }
}
