mod logger;

use anyhow::{Context, Result, bail, ensure};
use clap::{Parser, Subcommand, ValueEnum};
use pdf_import::{
    ImportOptions, Importer, OutputDocument, PageBoxKind, SourceReader, load_reader, write_output,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdft", about = "PDF tools CLI", version)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show page count and page boxes of a PDF
    Info {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Print page boxes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import pages of PDF files as templates into a new PDF, one per page
    Import {
        /// Input PDF file(s) - can specify multiple
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// Pages to import from every input, e.g. "1,3,5-7" (default: all)
        #[arg(long)]
        pages: Option<String>,

        /// Page box the templates are cut to
        #[arg(long = "box", default_value = "crop", value_enum)]
        page_box: BoxArg,

        /// Export with content hash ids and renumber while assembling
        #[arg(long)]
        hashed: bool,

        /// Scale factor applied to every placed page
        #[arg(long, default_value = "1.0")]
        scale: f32,

        /// Import options JSON file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BoxArg {
    Media,
    Crop,
    Bleed,
    Trim,
    Art,
}

impl From<BoxArg> for PageBoxKind {
    fn from(arg: BoxArg) -> Self {
        match arg {
            BoxArg::Media => Self::MediaBox,
            BoxArg::Crop => Self::CropBox,
            BoxArg::Bleed => Self::BleedBox,
            BoxArg::Trim => Self::TrimBox,
            BoxArg::Art => Self::ArtBox,
        }
    }
}

/// Parse a page list like "1,3,5-7" into page numbers, in the given order
fn parse_pages(list: &str) -> Result<Vec<u32>> {
    let mut pages = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid page range '{}'", part))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid page range '{}'", part))?;
                if start == 0 || end < start {
                    bail!("Invalid page range '{}'", part);
                }
                pages.extend(start..=end);
            }
            None => {
                let page: u32 = part
                    .parse()
                    .with_context(|| format!("Invalid page number '{}'", part))?;
                if page == 0 {
                    bail!("Page numbers start at 1");
                }
                pages.push(page);
            }
        }
    }
    ensure!(!pages.is_empty(), "No pages selected");
    Ok(pages)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::StderrLogger::new(cli.verbose).init()?;

    match cli.command {
        Commands::Info { input, json } => {
            let reader = load_reader(&input).await?;
            let geometry = reader.page_boxes(1.0)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&geometry)?);
                return Ok(());
            }

            println!("{}: {} pages", input.display(), reader.page_count()?);
            for (page, boxes) in &geometry {
                println!("  Page {}", page);
                for (kind, page_box) in boxes {
                    println!(
                        "    {:<10} {:.2} x {:.2} at ({:.2}, {:.2})",
                        kind.to_string(),
                        page_box.width,
                        page_box.height,
                        page_box.x,
                        page_box.y
                    );
                }
            }
        }

        Commands::Import {
            input,
            output,
            pages,
            page_box,
            hashed,
            scale,
            config,
        } => {
            ensure!(scale > 0.0, "Scale must be positive, got {}", scale);
            let options = match config {
                Some(path) => ImportOptions::load(&path).await?,
                None => ImportOptions::default(),
            };
            let selection = pages.as_deref().map(parse_pages).transpose()?;

            let mut importer: Importer = Importer::with_options(options);
            let mut placed = Vec::new();
            for path in &input {
                let key = path.display().to_string();
                let reader = load_reader(path).await?;
                importer.bind_reader(key.clone(), reader);

                let page_numbers = match &selection {
                    Some(list) => list.clone(),
                    None => (1..=importer.page_count(&key)? as u32).collect(),
                };
                for page in page_numbers {
                    placed.push(importer.import_page(&key, page, page_box.into())?);
                }
            }

            let mut document = OutputDocument::new();
            let mut numbers = BTreeMap::new();
            let keys: Vec<String> = importer.document_keys().map(str::to_string).collect();
            for key in &keys {
                let export = if hashed {
                    importer.export_hashed(key)?
                } else {
                    importer.set_next_object_id(key, document.next_object_id())?;
                    importer.export_sequential(key)?
                };
                numbers.extend(document.add_export(export)?);
            }

            for id in &placed {
                let natural = importer.use_template(*id, 0.0, 0.0, 0.0, 0.0)?;
                let placement = importer.use_template(*id, 0.0, 0.0, natural.width * scale, 0.0)?;
                let number = numbers
                    .get(&placement.name)
                    .copied()
                    .with_context(|| format!("Template {} was not exported", placement.name))?;

                let xobjects = BTreeMap::from([(placement.name.clone(), number)]);
                document.add_page(
                    placement.width,
                    placement.height,
                    &placement.content_op(placement.height),
                    &xobjects,
                );
            }

            write_output(document.to_bytes(), &output).await?;
            println!(
                "Imported {} pages ({} templates) from {} files → {}",
                document.page_count(),
                importer.template_count(),
                keys.len(),
                output.display()
            );
        }
    }

    Ok(())
}
