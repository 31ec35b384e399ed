use anyhow::{anyhow, Context, Result};
use colored::*;
use filing_sections::{
    core::config::ParseConfig,
    edgar::{
        filing::{parse_sections, read_filing_text, FilingInput},
        structure::{FilingStructure, StructureReport},
    },
    SectionMap,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "filing-sections", about = "Split SEC filings into their item sections")]
struct Opt {
    /// Form type, overriding the submission header (e.g. 10-K, 8-K)
    #[structopt(long)]
    form: Option<String>,

    /// Print only these sections ("Item 7", "Part II, Item 1A", "Part I")
    #[structopt(long = "item")]
    items: Vec<String>,

    /// Print which catalog items were found or missing
    #[structopt(long)]
    structure: bool,

    /// Emit JSON instead of text
    #[structopt(long)]
    json: bool,

    /// Filing documents to parse
    #[structopt(parse(from_os_str), required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct FileOutput<'a> {
    file: String,
    form: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sections: Option<&'a SectionMap>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    requested: Vec<(String, Option<String>)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structure: Option<StructureReport>,
}

fn progress_bar(len: usize) -> Option<ProgressBar> {
    if len < 2 {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    Some(pb)
}

async fn parse_files(opt: &Opt, config: &ParseConfig) -> Result<Vec<(PathBuf, SectionMap)>> {
    let pb = progress_bar(opt.files.len());
    let mut tasks = Vec::new();
    for path in &opt.files {
        let raw = read_filing_text(path)?;
        let input = FilingInput {
            raw,
            form: opt.form.clone(),
            plain_text: None,
        };
        let config = config.clone();
        let pb = pb.clone();
        let name = path.display().to_string();
        tasks.push(tokio::task::spawn_blocking(move || {
            let sections = parse_sections(input, config);
            if let Some(pb) = &pb {
                pb.set_message(name);
                pb.inc(1);
            }
            sections
        }));
    }

    let mut parsed = Vec::new();
    for (path, task) in opt.files.iter().zip(tasks) {
        let sections = task
            .await
            .with_context(|| format!("Parsing {} failed", path.display()))?;
        parsed.push((path.clone(), sections));
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(parsed)
}

fn print_text(output: &FileOutput) {
    println!("{} ({})", output.file.bold(), output.form);

    if let Some(sections) = output.sections {
        if sections.is_empty() {
            println!("  {}", "no sections found".red());
        }
        for section in sections.iter() {
            println!(
                "  {:<24} {:>8} chars  via {}",
                section.label(sections.is_part_qualified()).green(),
                section.text.chars().count(),
                section.strategy
            );
        }
    }

    for (key, text) in &output.requested {
        println!("\n{}", key.cyan().bold());
        match text {
            Some(text) => println!("{}", text),
            None => println!("{}", "not found".red()),
        }
    }

    if let Some(report) = &output.structure {
        for item in &report.found {
            println!("  {} {} {}", "✓".green(), item.item, item.title);
        }
        for item in &report.missing {
            println!("  {} {} {}", "✗".red(), item.item, item.title);
        }
        if !report.extra.is_empty() {
            println!("  {} {}", "extra:".yellow(), report.extra.join(", "));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let opt = Opt::from_args();

    if let Some(missing) = opt.files.iter().find(|f| !f.exists()) {
        return Err(anyhow!("Input file does not exist: {}", missing.display()));
    }
    let config = ParseConfig::from_env()?;

    let parsed = parse_files(&opt, &config).await?;
    let outputs: Vec<FileOutput> = parsed
        .iter()
        .map(|(path, sections)| FileOutput {
            file: path.display().to_string(),
            form: sections.form(),
            sections: if opt.items.is_empty() { Some(sections) } else { None },
            requested: opt
                .items
                .iter()
                .map(|key| (key.clone(), sections.get(key)))
                .collect(),
            structure: if opt.structure {
                Some(FilingStructure::for_form(sections.form()).report(&sections.identifiers()))
            } else {
                None
            },
        })
        .collect();

    if opt.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        for output in &outputs {
            print_text(output);
        }
    }
    Ok(())
}
