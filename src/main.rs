use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

use bikeshed_refs::config::DocumentMetadata;
use bikeshed_refs::errors::RefError;
use bikeshed_refs::messages::Level;
use bikeshed_refs::resolution::BiblioRequest;
use bikeshed_refs::session::{Document, LinkSession};
use bikeshed_refs::types::*;

/// Cross-reference resolution for spec documents.
#[derive(Parser)]
#[command(name = "bikeshed-refs", about = "Cross-reference resolution for spec documents")]
struct Cli {
    /// Log resolution details
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration for a project
    Init {
        /// Project path (default: current directory)
        path: Option<String>,
    },
    /// Collect definitions and resolve every autolink of a parsed document
    Link {
        /// Document JSON (metadata, dfns, autolinks)
        document: String,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
        /// Write the linked document and references here
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Resolve a single autolink
    Lookup {
        /// Linking text
        text: String,
        /// Link type (dfn, property, idl, maybe, ...)
        #[arg(short = 't', long = "type", default_value = "dfn")]
        link_type: String,
        /// Restrict to this spec
        #[arg(short, long)]
        spec: Option<String>,
        /// current or snapshot
        #[arg(long)]
        status: Option<String>,
        /// For-scope values
        #[arg(long = "for")]
        for_values: Vec<String>,
        /// Shortname of the document doing the linking
        #[arg(long)]
        shortname: Option<String>,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Look up a bibliography entry
    Biblio {
        /// Biblio key
        key: String,
        /// current or snapshot
        #[arg(long)]
        status: Option<String>,
        /// Don't follow obsoletion
        #[arg(long)]
        obsolete: bool,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Look up a section heading in another spec
    Heading {
        /// Spec id
        spec: String,
        /// Heading id, e.g. #intro or /page#intro
        id: String,
        /// current or snapshot
        #[arg(long)]
        status: Option<String>,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("bikeshed_refs=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> bikeshed_refs::errors::Result<()> {
    match command {
        Commands::Init { path } => {
            let project_path = resolve_path(path);
            let session = LinkSession::init(&project_path)?;
            println!("Initialized bikeshed-refs at {}", project_path.display());
            println!(
                "  Spec data: {}",
                session.config().data_path(&project_path).display()
            );
        }
        Commands::Link {
            document,
            path,
            output,
        } => {
            let project_path = resolve_path(path);
            let session = LinkSession::open(&project_path)?;
            let contents = fs::read_to_string(&document)?;
            let doc: Document = serde_json::from_str(&contents)?;
            let result = session.link_document(doc)?;

            println!(
                "Linked {} autolinks ({} failed) against {} definitions in {}ms",
                result.report.resolved,
                result.report.failed,
                result.report.definitions,
                result.duration_ms
            );
            println!(
                "  References: {} normative, {} informative",
                result.normative_references.len(),
                result.informative_references.len()
            );
            let fatal = result
                .diagnostics
                .iter()
                .filter(|d| d.level == Level::Fatal)
                .count();
            if fatal > 0 {
                println!("  Fatal errors: {}", fatal);
            }

            if let Some(output) = output {
                fs::write(&output, serde_json::to_string_pretty(&result)?)?;
                println!("  Wrote {}", output);
            }
            if result.aborted {
                return Err(RefError::Config {
                    message: "build stopped at the configured die-on level".to_string(),
                });
            }
        }
        Commands::Lookup {
            text,
            link_type,
            spec,
            status,
            for_values,
            shortname,
            path,
        } => {
            let project_path = resolve_path(path);
            let session = LinkSession::open(&project_path)?;
            let metadata = DocumentMetadata {
                shortname: shortname.unwrap_or_default(),
                ..DocumentMetadata::default()
            };
            let mut resolver = session.resolver(&metadata)?;
            resolver.seal();

            let mut req = LinkRequest::new(LinkType::parse(&link_type)?, text);
            if let Some(spec) = spec {
                req = req.with_spec(spec);
            }
            if let Some(status) = status {
                req = req.with_status(Status::parse(&status)?);
            }
            for value in for_values {
                req = req.with_for(value);
            }

            let resolved = resolver.get_ref(&req)?;
            println!("{}", resolved.url);
            println!(
                "  {} '{}' from {}",
                resolved.candidate.kind,
                resolved.candidate.text,
                resolved.candidate.spec_label()
            );
            if !resolved.candidate.for_scope.is_empty() {
                let scopes: Vec<&str> = resolved
                    .candidate
                    .for_scope
                    .iter()
                    .map(|s| s.as_str())
                    .collect();
                println!("  for: {}", scopes.join(", "));
            }
        }
        Commands::Biblio {
            key,
            status,
            obsolete,
            path,
        } => {
            let project_path = resolve_path(path);
            let session = LinkSession::open(&project_path)?;
            let mut resolver = session.resolver(&DocumentMetadata::default())?;

            let mut req = BiblioRequest::new(key.clone());
            if let Some(status) = &status {
                req = req.with_status(Status::parse(status)?);
            }
            if obsolete {
                req = req.allow_obsolete();
            }
            match resolver.get_biblio_ref(&req)? {
                Some(entry) => {
                    let status = req.status.unwrap_or(resolver.default_status());
                    println!("[{}] {}", entry.display_key(), entry.citation(status));
                }
                None => println!("No bibliography entry found for '{}'", key),
            }
        }
        Commands::Heading {
            spec,
            id,
            status,
            path,
        } => {
            let project_path = resolve_path(path);
            let session = LinkSession::open(&project_path)?;
            let mut resolver = session.resolver(&DocumentMetadata::default())?;
            let status = status.map(|s| Status::parse(&s)).transpose()?;
            let heading = resolver.get_section_ref(&spec, &id, status)?;
            match &heading.number {
                Some(number) => println!("§ {} {}", number, heading.text),
                None => println!("§ {}", heading.text),
            }
            println!("  {}", heading.url);
        }
    }
    Ok(())
}

/// Resolves an optional path argument to an absolute `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
