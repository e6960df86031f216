use clap::{Parser, Subcommand, ValueEnum};
use photoflow::catalog::{
    Asset, AssetOrigin, AssetRequest, Predicate, RepresentationType, SortKey, TagType,
};
use photoflow::imaging::RustBackend;
use photoflow::import::collect_sources;
use photoflow::project::Project;
use photoflow::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "photoflow")]
#[command(about = "Content-addressed photo catalog")]
#[command(long_about = "\
Content-addressed photo catalog

A project is a directory. Imported images are stored once by content hash,
thumbnailed, and cataloged with their EXIF metadata and a histogram. Assets
can be accepted, rejected and tagged, then listed and filtered.

Project structure:

  Shoot/
  ├── project.identifier   # Stable project UUID
  ├── database.sqlite      # Catalog of assets, tags and metadata
  ├── images/              # Originals and thumbnails, named by SHA-256
  └── config.toml          # Optional settings

<ASSET> arguments take an asset UUID or an exact asset name.

Run 'photoflow gen-config' to generate a documented config.toml.
Set RUST_LOG (e.g. RUST_LOG=photoflow=debug) for diagnostic logging.")]
#[command(version = version_string())]
struct Cli {
    /// Project directory
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new project
    Init,
    /// Import image files or directories
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Mark the assets as shared in rather than imported from files
        #[arg(long)]
        share: bool,
    },
    /// List assets
    List(ListArgs),
    /// Show an asset with its metadata
    Show { asset: String },
    /// Mark an asset accepted
    Accept { asset: String },
    /// Mark an asset rejected
    Reject { asset: String },
    /// Remove accepted/rejected status
    Clear { asset: String },
    /// Attach a tag
    Tag { asset: String, name: String },
    /// Detach a tag
    Untag { asset: String, name: String },
    /// Rename an asset
    Rename { asset: String, name: String },
    /// Delete an asset from the catalog (stored images are kept)
    Delete { asset: String },
    /// Write an asset's original or thumbnail to a file
    Export {
        asset: String,
        out: PathBuf,
        #[arg(long)]
        thumbnail: bool,
    },
    /// Copy the project to a new directory
    SaveAs { dest: PathBuf },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct ListArgs {
    /// Only assets carrying this tag
    #[arg(long, conflicts_with_all = ["accepted", "rejected"])]
    tag: Option<String>,
    /// Only accepted assets
    #[arg(long, conflicts_with = "rejected")]
    accepted: bool,
    /// Only rejected assets
    #[arg(long)]
    rejected: bool,
    #[arg(long, value_enum, default_value_t = SortArg::Name)]
    sort: SortArg,
    /// Sort descending
    #[arg(long)]
    desc: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Type,
    Origin,
}

impl ListArgs {
    fn request(&self) -> AssetRequest {
        let predicate = if let Some(tag) = &self.tag {
            Predicate::has_tag(tag.as_str())
        } else if self.accepted {
            Predicate::HasTagType(TagType::Accepted)
        } else if self.rejected {
            Predicate::HasTagType(TagType::Rejected)
        } else {
            Predicate::All
        };
        let sort = match self.sort {
            SortArg::Name => SortKey::Name,
            SortArg::Type => SortKey::Uti,
            SortArg::Origin => SortKey::Origin,
        };
        AssetRequest::filtered(predicate).sorted_by(sort, !self.desc)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("photoflow=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Init => {
            let project = Project::create(&cli.project)?;
            println!(
                "Created project {} ({})",
                project.title(),
                project.identifier()
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        command => run(&Project::open(&cli.project)?, command)?,
    }

    Ok(())
}

fn run(project: &Project, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Import { paths, share } => {
            init_thread_pool(&project.config().processing);
            let sources = collect_sources(&paths);
            let origin = if share {
                AssetOrigin::ShareExtension
            } else {
                AssetOrigin::Files
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_import_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let backend = RustBackend::new();
            let report = project
                .importer(&backend)
                .import_batch(&sources, origin, Some(tx));
            printer.join().ok();
            output::print_import_report(&report);
            if !report.failed.is_empty() {
                return Err(format!("{} file(s) failed to import", report.failed.len()).into());
            }
        }
        Command::List(args) => {
            let results = project.catalog().query(&args.request())?;
            output::print_asset_list(results.assets());
        }
        Command::Show { asset } => {
            output::print_asset_details(&resolve(project, &asset)?);
        }
        Command::Accept { asset } => {
            let asset = resolve(project, &asset)?;
            project.catalog().accept_asset(asset.identifier)?;
            println!("Accepted {}", asset.name);
        }
        Command::Reject { asset } => {
            let asset = resolve(project, &asset)?;
            project.catalog().reject_asset(asset.identifier)?;
            println!("Rejected {}", asset.name);
        }
        Command::Clear { asset } => {
            let asset = resolve(project, &asset)?;
            project.catalog().clear_status(asset.identifier)?;
            println!("Cleared status of {}", asset.name);
        }
        Command::Tag { asset, name } => {
            let asset = resolve(project, &asset)?;
            project.catalog().tag_asset(asset.identifier, &name)?;
            println!("Tagged {} with {}", asset.name, name);
        }
        Command::Untag { asset, name } => {
            let asset = resolve(project, &asset)?;
            if project.catalog().untag_asset(asset.identifier, &name)? {
                println!("Removed {} from {}", name, asset.name);
            } else {
                println!("{} was not tagged {}", asset.name, name);
            }
        }
        Command::Rename { asset, name } => {
            let asset = resolve(project, &asset)?;
            project.catalog().rename_asset(asset.identifier, &name)?;
            println!("Renamed {} to {}", asset.name, name);
        }
        Command::Delete { asset } => {
            let asset = resolve(project, &asset)?;
            project.catalog().delete_asset(asset.identifier)?;
            println!("Deleted {}", asset.name);
        }
        Command::Export {
            asset,
            out,
            thumbnail,
        } => {
            let asset = resolve(project, &asset)?;
            let kind = if thumbnail {
                RepresentationType::Thumbnail
            } else {
                RepresentationType::Original
            };
            let data = project
                .load_representation(&asset, kind)
                .ok_or_else(|| format!("{} of {} is unavailable", kind, asset.name))?;
            std::fs::write(&out, data.bytes())?;
            println!("Wrote {} {} to {}", asset.name, kind, out.display());
        }
        Command::SaveAs { dest } => {
            let copy = project.save_as(&dest)?;
            println!("Saved {} to {}", copy.title(), dest.display());
        }
        Command::Init | Command::GenConfig => unreachable!("handled before opening a project"),
    }
    Ok(())
}

/// Resolve an `<ASSET>` argument to exactly one asset.
fn resolve(project: &Project, key: &str) -> Result<Asset, Box<dyn std::error::Error>> {
    let mut matches = project.find_assets(key)?;
    match matches.len() {
        0 => Err(format!("no asset matches '{key}'").into()),
        1 => Ok(matches.remove(0)),
        n => Err(format!("'{key}' matches {n} assets; use the asset id").into()),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
