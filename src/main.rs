use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use callsheet_pdf::merge::DEFAULT_MAX_INPUT_BYTES;
use callsheet_pdf::{sheet, Document, MergeOptions, XrefTable};

#[derive(Parser)]
#[command(name = "callsheet-merge", about = "Merge a call sheet with its report", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append the report's pages after the call sheet's
    Merge {
        /// Call sheet PDF (pages come first)
        call_sheet: PathBuf,

        /// Report PDF (pages come second)
        report: PathBuf,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// Reject either input above this many bytes
        #[arg(long, env = "CALLSHEET_MAX_INPUT_BYTES", default_value_t = DEFAULT_MAX_INPUT_BYTES)]
        max_input_bytes: usize,
    },

    /// Print object and page counts for a PDF
    Inspect {
        /// PDF file to read
        pdf: PathBuf,
    },

    /// Annotate scene lines of a report script
    Annotate {
        /// JSON array of pages of line records
        script: PathBuf,

        /// Write annotated JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "callsheet_pdf=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Merge {
            call_sheet,
            report,
            output,
            max_input_bytes,
        } => {
            let options = MergeOptions { max_input_bytes };
            let summary = callsheet_pdf::merge_files(&call_sheet, &report, &output, options)
                .with_context(|| {
                    format!(
                        "merging {} and {}",
                        call_sheet.display(),
                        report.display()
                    )
                })?;

            if summary.passthrough {
                println!(
                    "Report was empty; copied {} pages → {}",
                    summary.pages_a,
                    output.display()
                );
            } else {
                println!(
                    "Merged {} + {} pages ({} objects) → {}",
                    summary.pages_a,
                    summary.pages_b,
                    summary.objects,
                    output.display()
                );
            }
        }

        Commands::Inspect { pdf } => {
            let data = fs::read(&pdf).with_context(|| format!("reading {}", pdf.display()))?;
            let doc = Document::parse(&data).with_context(|| format!("parsing {}", pdf.display()))?;

            println!("Version:  {}", doc.version());
            println!("Objects:  {}", doc.object_count());
            println!("Max id:   {}", doc.max_id());
            println!("Catalog:  {}", doc.catalog_id()?);
            println!("Pages:    {}", doc.page_count()?);
            match XrefTable::parse(&data) {
                Ok((xref, _)) => {
                    let consistent = xref
                        .iter()
                        .filter(|(id, entry)| {
                            data.get(entry.offset..).is_some_and(|rest| {
                                rest.starts_with(format!("{} {} obj", id, entry.generation).as_bytes())
                            })
                        })
                        .count();
                    println!("Xref:     {} of {} entries point at their object", consistent, xref.len());
                }
                Err(e) => println!("Xref:     not readable ({})", e),
            }
        }

        Commands::Annotate { script, output } => {
            let json = fs::read_to_string(&script)
                .with_context(|| format!("reading {}", script.display()))?;
            let annotated = sheet::annotate_json(&json)
                .with_context(|| format!("annotating {}", script.display()))?;

            match output {
                Some(path) => fs::write(&path, annotated)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", annotated),
            }
        }
    }

    Ok(())
}
