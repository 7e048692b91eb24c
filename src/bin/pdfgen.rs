//! PDF generation engine CLI
//!
//! A command-line front end for the four library operations: generate a
//! PDF from a JSON template, fill AcroForm fields from XFDF, merge PDFs,
//! and split a PDF into page ranges.

use clap::{Parser, Subcommand};
use glob::glob;
use std::path::PathBuf;
use std::process;

/// pdfgen - generate, fill, merge and split PDFs
#[derive(Parser)]
#[command(name = "pdfgen")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Generate a PDF from a JSON template
    pdfgen generate -o output.pdf template.json

    # Fill AcroForm fields from an XFDF payload
    pdfgen fill -o filled.pdf input.pdf data.xfdf

    # Merge PDFs in order
    pdfgen merge -o merged.pdf \"[0-9]*.pdf\"

    # Split a PDF into page ranges
    pdfgen split -o out input.pdf \"1-3,5,8-9\"")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a PDF from a JSON template
    Generate {
        /// Template JSON file
        template: PathBuf,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Fill AcroForm widget values from an XFDF payload
    Fill {
        /// Input PDF file
        input: PathBuf,

        /// XFDF file with field values
        xfdf: PathBuf,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge multiple PDF files into one
    Merge {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Split a PDF into page ranges
    Split {
        /// Input PDF file
        input: PathBuf,

        /// Page spec, e.g. "1-3,5,8-9" or "all"
        spec: String,

        /// Output directory; parts are named part-1.pdf, part-2.pdf, ...
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { template, output } => cmd_generate(template, output),
        Commands::Fill { input, xfdf, output } => cmd_fill(input, xfdf, output),
        Commands::Merge { inputs, output } => cmd_merge(inputs, output),
        Commands::Split { input, spec, output } => cmd_split(input, spec, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = false;
            for entry in glob(&pattern)? {
                match entry {
                    Ok(path) => {
                        paths.push(path);
                        matched = true;
                    }
                    Err(e) => eprintln!("Warning: glob error for {}: {}", pattern, e),
                }
            }
            if !matched {
                return Err(format!("No files matched pattern: {}", pattern).into());
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    paths.sort();
    Ok(paths)
}

fn cmd_generate(template: PathBuf, output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(&template)?;
    eprintln!("Generating PDF from {}...", template.display());
    let bytes = pdfgen::generate(&json)?;
    std::fs::write(&output, bytes)?;
    eprintln!("Output: {}", output.display());
    Ok(())
}

fn cmd_fill(input: PathBuf, xfdf: PathBuf, output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let pdf_bytes = std::fs::read(&input)?;
    let xfdf_bytes = std::fs::read(&xfdf)?;
    eprintln!("Filling fields in {}...", input.display());
    let filled = pdfgen::fill(&pdf_bytes, &xfdf_bytes)?;
    std::fs::write(&output, filled)?;
    eprintln!("Output: {}", output.display());
    Ok(())
}

fn cmd_merge(inputs: Vec<String>, output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = expand_globs(inputs)?;
    for path in &inputs {
        if !path.exists() {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
    }
    eprintln!("Merging {} PDF files...", inputs.len());
    let pdfs: Result<Vec<Vec<u8>>, std::io::Error> = inputs.iter().map(std::fs::read).collect();
    let merged = pdfgen::merge(pdfs?)?;
    std::fs::write(&output, merged)?;
    eprintln!("Merged to: {}", output.display());
    Ok(())
}

fn cmd_split(input: PathBuf, spec: String, output_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }
    let pdf_bytes = std::fs::read(&input)?;
    eprintln!("Splitting {} by {:?}...", input.display(), spec);
    let parts = pdfgen::split(&pdf_bytes, &spec)?;
    std::fs::create_dir_all(&output_dir)?;
    for (i, part) in parts.iter().enumerate() {
        let path = output_dir.join(format!("part-{}.pdf", i + 1));
        std::fs::write(&path, part)?;
        eprintln!("Wrote: {}", path.display());
    }
    Ok(())
}
