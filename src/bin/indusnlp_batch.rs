use std::{
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indusnlp::{
    cleaning::CleanOptions,
    config,
    context::ServiceContext,
    dispatch::{
        BundleMember, Document, DocumentKind, DocumentTransform, bundle, process_members,
    },
    logging,
    transforms::{CleanTransform, OcrTransform, QnaTransform},
};
use walkdir::WalkDir;

const ERRORS_FILE: &str = "errors.txt";

#[derive(Parser)]
#[command(
    name = "indusnlp-batch",
    about = "Run OCR, cleaning or Q&A generation over local files, folders and zip archives"
)]
struct Cli {
    /// Log progress to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text from PDF and image documents.
    Ocr {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Clean Hindi text files.
    Clean {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        no_transliterate: bool,
        #[arg(long)]
        no_filter_badwords: bool,
        #[arg(long)]
        filter_punctuation: bool,
    },
    /// Generate question/answer pairs from text files.
    Qna {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 300)]
        num_questions: usize,
        #[arg(long, default_value_t = 25)]
        batch_size: usize,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_tracing(cli.verbose);
    let config = config::load().context("failed to load configuration")?;
    let context = ServiceContext::from_config(config).context("failed to initialise clients")?;

    match cli.command {
        Command::Ocr { input, output } => {
            context.config().require_mistral_key()?;
            let client = context
                .ocr_client()
                .context("OCR client is not available")?;
            run_batch(&OcrTransform::new(client), &input, &output).await
        }
        Command::Clean {
            input,
            output,
            no_transliterate,
            no_filter_badwords,
            filter_punctuation,
        } => {
            let pipeline = context.cleaning_pipeline(CleanOptions {
                transliterate: !no_transliterate,
                filter_badwords: !no_filter_badwords,
                filter_punctuation,
            });
            run_batch(&CleanTransform::new(pipeline), &input, &output).await
        }
        Command::Qna {
            input,
            output,
            num_questions,
            batch_size,
        } => {
            context.config().require_gemini_key()?;
            let generator = context
                .qna_generator()
                .context("Q&A client is not available")?;
            let transform = QnaTransform::new(generator, num_questions, batch_size);
            run_batch(&transform, &input, &output).await
        }
    }
}

/// Summary of one batch run.
#[derive(Debug, PartialEq, Eq)]
struct BatchSummary {
    processed: usize,
    failed: usize,
}

async fn run_batch<F>(transform: &F, input: &Path, output: &Path) -> Result<()>
where
    F: DocumentTransform,
{
    let summary = process_path(transform, input, output).await?;
    println!(
        "Processed: {}, Failed: {}",
        summary.processed, summary.failed
    );
    Ok(())
}

async fn process_path<F>(transform: &F, input: &Path, output: &Path) -> Result<BatchSummary>
where
    F: DocumentTransform,
{
    let (members, target) = collect_members(transform, input, output)?;
    let report = process_members(members, transform)
        .await
        .with_context(|| format!("no documents to process in {}", input.display()))?;

    fs::create_dir_all(&target)
        .with_context(|| format!("failed to create output directory {}", target.display()))?;

    for entry in report.entries(transform) {
        let path = target.join(&entry.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, &entry.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let failures: Vec<String> = report
        .iter()
        .filter_map(|member| {
            member
                .outcome
                .as_ref()
                .err()
                .map(|error| format!("{}: {error}\n", member.name))
        })
        .collect();
    if !failures.is_empty() {
        let errors_path = output.join(ERRORS_FILE);
        fs::create_dir_all(output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&errors_path)
            .with_context(|| format!("failed to open {}", errors_path.display()))?;
        for line in &failures {
            file.write_all(line.as_bytes())
                .with_context(|| format!("failed to write {}", errors_path.display()))?;
        }
    }

    Ok(BatchSummary {
        processed: report.succeeded(),
        failed: report.failed(),
    })
}

/// Resolve the input into bundle members and the directory their outputs go to.
///
/// Zip files write into `<output>/<zip stem>/`. Directories are walked recursively in name order
/// and only files the transform accepts are picked up.
fn collect_members<F>(
    transform: &F,
    input: &Path,
    output: &Path,
) -> Result<(Vec<BundleMember>, PathBuf)>
where
    F: DocumentTransform,
{
    if input.is_dir() {
        let mut members = Vec::new();
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", input.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = relative_name(input, entry.path()) else {
                continue;
            };
            if name.split('/').any(|part| part.starts_with('.')) {
                continue;
            }
            let probe = Document::new(name.clone(), Vec::new());
            if !transform.accepts(&probe) {
                tracing::debug!(file = %name, "Skipping file the transform does not accept");
                continue;
            }
            let content = fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            members.push(BundleMember::new(name, content));
        }
        return Ok((members, output.to_path_buf()));
    }

    if !input.is_file() {
        bail!("input path {} does not exist", input.display());
    }

    let content =
        fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let document = Document::new(file_name, content);

    match document.kind() {
        DocumentKind::Bundle => {
            let members = bundle::unpack(&document.content)
                .with_context(|| format!("failed to read archive {}", input.display()))?;
            Ok((members, output.join(document.file_stem())))
        }
        DocumentKind::Single => Ok((
            vec![BundleMember::new(document.name, document.content)],
            output.to_path_buf(),
        )),
    }
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}
