use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod annotate;
mod error;
mod topology;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "psnuma")]
#[command(
    about = "Assign the NUMA node of each processor to ps thread samples",
    long_about = None
)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate `ps -L -o pid,lwp,psr,comm` output read from stdin.
    ///
    /// Example: ps -L -o pid,lwp,psr,comm -p $PID | psnuma annotate --lscpu <(lscpu)
    Annotate {
        #[command(flatten)]
        topology: TopologyArgs,
    },

    /// Print the processor to NUMA node table of an lscpu report.
    Topology {
        #[command(flatten)]
        topology: TopologyArgs,

        /// Print JSON instead of `<cpu> <node>` lines.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct TopologyArgs {
    /// Path to the lscpu output.
    #[arg(long)]
    lscpu: PathBuf,

    /// How NUMA node ids are read from `NUMA node<k>` labels.
    #[arg(long, value_enum, default_value_t = topology::NodeIdMode::LastChar)]
    node_id: topology::NodeIdMode,
}

impl TopologyArgs {
    fn load(&self) -> Result<topology::TopologyTable> {
        let table = topology::load_topology(&self.lscpu, self.node_id)
            .with_context(|| format!("build NUMA table from {}", self.lscpu.display()))?;
        info!(
            cpus = table.len(),
            nodes = ?table.declared_nodes(),
            "NUMA table ready"
        );
        Ok(table)
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "psnuma=warn",
        1 => "psnuma=info",
        _ => "psnuma=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    // stdout carries the annotated log, so diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Commands::Annotate { topology } => {
            // 1) Build the table; nothing is read from stdin if this fails.
            let table = topology.load()?;

            // 2) Stream stdin to stdout.
            let stdin = io::stdin().lock();
            let stdout = BufWriter::new(io::stdout().lock());
            annotate::annotate(&table, stdin, stdout).context("annotate ps output")?;
        }
        Commands::Topology { topology, json } => {
            let table = topology.load()?;
            let mut out = BufWriter::new(io::stdout().lock());
            if json {
                serde_json::to_writer_pretty(&mut out, &table.view())?;
                writeln!(out)?;
            } else {
                for (cpu, node) in table.sorted() {
                    writeln!(out, "{} {}", cpu, node)?;
                }
            }
            out.flush()?;
        }
    }

    Ok(())
}
