//! bgraph CLI - build and query unified dependency graphs.
//!
//! Usage:
//!   bgraph build <root> -o tree.bgraph   # Parse a tree, persist the graph
//!   bgraph query <graph> --src a.cc      # Targets consuming a source
//!   bgraph query <graph> --target foobin # Sources feeding a target
//!   bgraph common <graph> liba libb      # Shared sources of two targets
//!   bgraph stats <graph>                 # Graph statistics

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use bgraph::{
    build_tree_named, find_common, find_dependencies, find_sources, render_common,
    render_dependencies, render_sources, BuildGraph, OutputMode, QueryError,
};

#[derive(Parser)]
#[command(name = "bgraph")]
#[command(about = "Dependency graphs from blueprint build trees", long_about = None)]
struct Cli {
    /// Activate verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a blueprint tree and persist its dependency graph
    Build {
        /// Root of the checked-out tree
        root: PathBuf,

        /// Where to write the graph
        #[arg(short, long, default_value = "tree.bgraph")]
        output: PathBuf,

        /// File name the tree uses for blueprints
        #[arg(long, default_value = bgraph::DEFAULT_BLUEPRINT_NAME)]
        blueprint_name: String,
    },

    /// Query a previously built graph
    Query {
        /// Graph file to query
        graph: PathBuf,

        /// Source file path (or fragment) to look up
        #[arg(long)]
        src: Option<String>,

        /// Target name to look up
        #[arg(long)]
        target: Option<String>,

        /// Bound the source walk to this many hops
        #[arg(long)]
        radius: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        out: OutChoice,
    },

    /// Intersect the source sets of two targets
    Common {
        /// Graph file to query
        graph: PathBuf,

        target_a: String,
        target_b: String,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        out: OutChoice,
    },

    /// Show graph statistics
    Stats {
        /// Graph file to inspect
        graph: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum OutChoice {
    Table,
    GraphExchange,
}

impl From<OutChoice> for OutputMode {
    fn from(choice: OutChoice) -> Self {
        match choice {
            OutChoice::Table => OutputMode::Table,
            OutChoice::GraphExchange => OutputMode::GraphExchange,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            root,
            output,
            blueprint_name,
        } => {
            let outcome = build_tree_named(&root, &blueprint_name)?;
            for diagnostic in &outcome.diagnostics {
                eprintln!("warning: {diagnostic}");
            }

            outcome.graph.save(&output)?;
            let stats = outcome.graph.stats();
            println!("Graph written to {}", output.display());
            println!("  Targets: {}", stats.target_count);
            println!("  Sources: {}", stats.source_count);
            println!("  Edges:   {}", stats.total_edges);
        }

        Commands::Query {
            graph,
            src,
            target,
            radius,
            out,
        } => {
            let graph = load(&graph)?;
            match (src, target) {
                (Some(src), None) => {
                    let report = query_ok(find_dependencies(&graph, &src, radius));
                    print!("{}", render_dependencies(&graph, &report, out.into()));
                }
                (None, Some(target)) => {
                    let report = query_ok(find_sources(&graph, &target));
                    print!("{}", render_sources(&graph, &report, out.into()));
                }
                _ => bail!("define exactly one of --src / --target"),
            }
        }

        Commands::Common {
            graph,
            target_a,
            target_b,
            out,
        } => {
            let graph = load(&graph)?;
            let report = query_ok(find_common(&graph, &target_a, &target_b));
            print!("{}", render_common(&graph, &report, out.into()));
        }

        Commands::Stats { graph } => {
            let graph = load(&graph)?;
            let json = serde_json::to_string_pretty(&graph.stats()).unwrap_or_default();
            println!("{json}");
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<BuildGraph> {
    Ok(BuildGraph::load(path)?)
}

/// Query failures are reported to the caller and exit with a distinct
/// code; they never crash the query session.
fn query_ok<T>(result: std::result::Result<T, QueryError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}
