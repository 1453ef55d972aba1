//! Medigraph operator CLI.
//!
//! - `compile`: turn a query-graph JSON file into Cypher without touching a
//!   backend; useful for eyeballing what a request would actually run.
//! - `demo`: push the bundled two-hop fixture through the full engine.
//! - `ontology`: dump the active mapping table as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use medigraph_ontology::OntologyMap;
use medigraph_query::{
    native_edge, native_node, FixtureSession, PropertyValue, QueryEngine, QueryError,
    QueryGraph, QueryOptions, Record, WeightProvider,
};

#[derive(Parser)]
#[command(name = "medigraph")]
#[command(
    author,
    version,
    about = "Graph-query compiler and scoring engine for biomedical knowledge graphs"
)]
struct Cli {
    /// Log engine internals to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query-graph JSON file to Cypher without executing it
    Compile {
        /// Query graph JSON: {"nodes": {...}, "edges": {...}}
        input: PathBuf,
        /// Requested result count (clamped to the engine ceiling)
        #[arg(long)]
        max_results: Option<usize>,
        /// Site-specific ontology table (JSON); defaults to the built-in table
        #[arg(long)]
        ontology: Option<PathBuf>,
    },

    /// Run the bundled disease-gene fixture through the full engine
    Demo {
        /// Context concept for the propagated-weight signal
        #[arg(long, default_value = "DOID:1234")]
        context: String,
    },

    /// Print the active ontology mapping table as JSON
    Ontology {
        #[arg(long)]
        ontology: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Compile {
            input,
            max_results,
            ontology,
        } => compile(&input, max_results, ontology.as_deref()),
        Commands::Demo { context } => demo(&context),
        Commands::Ontology { ontology } => dump_ontology(ontology.as_deref()),
    };

    if let Err(err) = outcome {
        if let Some(query_err) = err.downcast_ref::<QueryError>() {
            if query_err.is_empty_response() {
                println!("{}", format!("no results: {query_err}").yellow());
                return;
            }
        }
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_ontology(path: Option<&std::path::Path>) -> Result<OntologyMap> {
    match path {
        None => Ok(OntologyMap::default_map()),
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("could not read ontology table {}", path.display()))?;
            let map: OntologyMap = serde_json::from_str(&text)
                .with_context(|| format!("could not parse ontology table {}", path.display()))?;
            map.validate()
                .context("ontology table contains an invalid identifier pattern")?;
            Ok(map)
        }
    }
}

// ============================================================================
// compile
// ============================================================================

fn compile(
    input: &std::path::Path,
    max_results: Option<usize>,
    ontology: Option<&std::path::Path>,
) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("could not read query graph {}", input.display()))?;
    let graph: QueryGraph = serde_json::from_str(&text)
        .with_context(|| format!("could not parse query graph {}", input.display()))?;

    let engine = QueryEngine::new(load_ontology(ontology)?);
    let plan = engine.plan(&graph, max_results)?;

    println!("{}", "traversal order".cyan().bold());
    let order: Vec<&str> = plan.order.steps.iter().map(|s| s.key()).collect();
    println!("  {}", order.join(" -> "));

    println!("{}", "aliases".cyan().bold());
    for (index, alias) in plan.compiled.aliases.order.iter().enumerate() {
        let key = plan
            .compiled
            .aliases
            .nodes
            .get(alias)
            .or_else(|| plan.compiled.aliases.edges.get(alias))
            .map(String::as_str)
            .unwrap_or("?");
        println!("  {index:>2}  {alias:<3} {key}");
    }

    println!("{}", "cypher".cyan().bold());
    println!("  {}", plan.compiled.cypher.green());
    Ok(())
}

// ============================================================================
// demo
// ============================================================================

/// Canned weights standing in for the propagated-weight service.
struct DemoWeights;

impl WeightProvider for DemoWeights {
    fn propagated_weights(
        &self,
        _context: &str,
        identifiers: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        let known: BTreeMap<&str, f64> =
            [("5468", 0.0004), ("5444", 0.0001), ("1803", 0.0009)]
                .into_iter()
                .collect();
        Ok(identifiers
            .iter()
            .map(|id| (id.clone(), known.get(id.as_str()).copied().unwrap_or(0.0)))
            .collect())
    }
}

fn demo_graph() -> Result<QueryGraph> {
    let graph = serde_json::from_str(
        r#"{
            "nodes": {
                "n0": {"ids": ["DOID:1234"], "categories": ["biolink:Disease"]},
                "n1": {"categories": ["biolink:Gene"]}
            },
            "edges": {
                "e0": {
                    "subject": "n0",
                    "object": "n1",
                    "predicates": ["biolink:associated_with"]
                }
            }
        }"#,
    )?;
    Ok(graph)
}

fn demo_records() -> Vec<Record> {
    let disease = native_node(
        "1234",
        &["Disease"],
        &[
            ("name", PropertyValue::from("demo inflammatory disorder")),
            ("description", PropertyValue::from("bundled fixture disease")),
        ],
    );

    let genes: [(i64, &str); 3] = [(5468, "PON1"), (5444, "LPO"), (1803, "DPP4")];
    genes
        .iter()
        .enumerate()
        .map(|(index, (gene_id, symbol))| {
            let mut record = Record::new();
            record.insert("a", disease.clone());
            record.insert(
                "b",
                native_edge(
                    9000 + index as i64,
                    "ASSOCIATES_DaG",
                    "1234",
                    *gene_id,
                    &[("gwas", PropertyValue::from(index as i64 + 1))],
                ),
            );
            record.insert(
                "c",
                native_node(
                    *gene_id,
                    &["Gene"],
                    &[
                        ("name", PropertyValue::from(*symbol)),
                        ("chromosome", PropertyValue::from("7")),
                    ],
                ),
            );
            record
        })
        .collect()
}

fn demo(context: &str) -> Result<()> {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_weight_provider(Box::new(DemoWeights));
    let session = FixtureSession::new(demo_records());
    let graph = demo_graph()?;
    let options = QueryOptions {
        enrichment_context: Some(context.to_string()),
        enable_third_party_enrichment: false,
    };

    let (results, knowledge_graph) = engine.run_query(&graph, &options, Some(10), &session)?;

    if let Some(query) = session.seen_queries().first() {
        println!("{}", "compiled".cyan().bold());
        println!("  {}", query.green());
    }

    println!(
        "{}",
        format!(
            "knowledge graph: {} node(s), {} edge(s)",
            knowledge_graph.nodes.len(),
            knowledge_graph.edges.len()
        )
        .cyan()
        .bold()
    );

    println!("{}", "ranked results".cyan().bold());
    for (rank, result) in results.iter().enumerate() {
        let bound: Vec<String> = result
            .node_bindings
            .iter()
            .map(|(key, id)| {
                let name = knowledge_graph
                    .nodes
                    .get(id)
                    .and_then(|n| n.name.as_deref())
                    .unwrap_or("?");
                format!("{key}={name} ({id})")
            })
            .collect();
        println!(
            "  {:>2}. score {:<7} {}",
            rank + 1,
            format!("{:.3}", result.score).bold(),
            bound.join("  ")
        );
    }
    Ok(())
}

// ============================================================================
// ontology
// ============================================================================

fn dump_ontology(path: Option<&std::path::Path>) -> Result<()> {
    let map = load_ontology(path)?;
    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}
