//! boolexpr-demo: builds a sum of products over the in-memory engine and
//! prints it, optionally in normal form or with a satisfying point.

use boolexpr_intern::{Context, Expr, MemoryEngine, Runtime};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "boolexpr-demo")]
#[command(about = "Build Or(And(a1, b1), ..., And(an, bn)) and inspect it")]
struct Args {
    /// Number of product terms
    #[arg(long, default_value_t = 2, value_name = "N")]
    vars: usize,

    /// Print the conjunctive normal form
    #[arg(long)]
    cnf: bool,

    /// Print the disjunctive normal form
    #[arg(long)]
    dnf: bool,

    /// Print a satisfying point
    #[arg(long)]
    sat: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let engine = Arc::new(MemoryEngine::new());
    let rt = Runtime::new(engine.clone())?;
    let ctx = Context::new(&rt)?;

    let mut terms = Vec::with_capacity(args.vars);
    for i in 1..=args.vars {
        let a = ctx.variable(&format!("a{i}"))?;
        let b = ctx.variable(&format!("b{i}"))?;
        terms.push(rt.and(&[Expr::from(a), Expr::from(b)])?);
    }
    let f = rt.or(&terms)?;
    println!("{f}");

    if args.cnf {
        println!("cnf: {}", f.to_cnf()?);
    }
    if args.dnf {
        println!("dnf: {}", f.to_dnf()?);
    }
    if args.sat {
        match f.sat()? {
            Some(point) => {
                let assignment = point
                    .iter()
                    .map(|(var, value)| format!("{var}={value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("sat: {{{assignment}}}");
            }
            None => println!("sat: none"),
        }
    }

    drop((terms, f));
    info!(stats = ?engine.stats(), "done");
    Ok(())
}
