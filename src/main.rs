use clap::Parser;
use std::sync::Arc;
use std::thread;

use cellflow::comm::{Communicator, LocalComm, LocalWorld};
use cellflow::partition::{make_partitioner, NoParticles, Partitioner, PartitionerKind};
use cellflow::stats::BalanceStats;

/// Adaptive domain decomposition demo: a hot-spot load over an in-process
/// SPMD world, rebalanced by grid-point displacement
#[derive(Parser)]
#[command(name = "cellflow", version)]
struct Cli {
    /// Number of in-process ranks
    #[arg(long, default_value_t = 8)]
    ranks: usize,

    /// Edge length of the cubic box
    #[arg(long, default_value_t = 8.0)]
    box_len: f64,

    /// Minimum cell edge
    #[arg(long, default_value_t = 1.0)]
    min_cell_size: f64,

    /// Number of repartition steps
    #[arg(long, default_value_t = 4)]
    steps: usize,

    /// Corner displacement step size
    #[arg(long, default_value_t = 0.25)]
    mu: f64,

    /// Weight of cells inside the hot spot; all other cells weigh 1
    #[arg(long, default_value_t = 8.0)]
    hot_weight: f64,

    /// Print balance stats to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();
    if cli.ranks == 0 {
        eprintln!("Config error: --ranks must be positive");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let world = LocalWorld::new(cli.ranks);
    let cli = Arc::new(cli);

    let handles: Vec<_> = world
        .communicators()
        .into_iter()
        .map(|comm| {
            let cli = Arc::clone(&cli);
            thread::spawn(move || run_rank(comm, &cli))
        })
        .collect();

    let mut stats = None;
    for handle in handles {
        match handle.join().expect("rank thread panicked") {
            Ok(rank_stats) => {
                if rank_stats.is_some() {
                    stats = rank_stats;
                }
            }
            Err(e) => {
                eprintln!("Partitioning error: {e}");
                std::process::exit(1);
            }
        }
    }

    if let Some(stats) = stats {
        stats.display();
    }
}

/// The SPMD body of one rank. Rank 0 collects the balance stats.
fn run_rank(comm: LocalComm, cli: &Cli) -> cellflow::Result<Option<BalanceStats>> {
    let rank = comm.rank();
    let comm: Arc<dyn Communicator> = Arc::new(comm);
    let box_l = [cli.box_len; 3];

    let mut partitioner = make_partitioner(
        PartitionerKind::GridPointShift,
        Arc::clone(&comm),
        box_l,
        cli.min_cell_size,
        Arc::new(NoParticles),
    )?;
    partitioner.command(&format!("mu = {:.6}", cli.mu));

    let mut stats = (cli.stats && rank == 0).then(BalanceStats::new);

    for step in 0..cli.steps {
        let weights = local_weights(partitioner.as_ref(), cli);
        let load: f64 = weights.iter().sum();

        // One scalar per rank is enough for reporting; reuse the point
        // all-gather with the load in the first slot.
        let loads: Vec<f64> = comm
            .allgather_point([load, 0.0, 0.0])
            .iter()
            .map(|p| p[0])
            .collect();
        if let Some(stats) = stats.as_mut() {
            stats.record_loads(&loads);
        }

        let metric = move || weights.clone();
        let accepted = partitioner.repartition(&metric, &mut || {
            tracing::debug!(rank, step, "exchange window open");
        })?;

        if let Some(stats) = stats.as_mut() {
            stats.record_attempt(accepted);
        }
        if rank == 0 {
            tracing::info!(step, accepted, "repartition step done");
        }
    }

    // Final per-rank load, for the last stats row.
    let weights = local_weights(partitioner.as_ref(), cli);
    let load: f64 = weights.iter().sum();
    let loads: Vec<f64> = comm
        .allgather_point([load, 0.0, 0.0])
        .iter()
        .map(|p| p[0])
        .collect();
    if let Some(stats) = stats.as_mut() {
        stats.record_loads(&loads);
    }

    tracing::info!(
        rank,
        n_local = partitioner.n_local_cells(),
        n_ghost = partitioner.n_ghost_cells(),
        load,
        "final decomposition"
    );
    Ok(stats)
}

/// Synthetic load: cells near the lower box corner are hot.
fn local_weights(partitioner: &dyn Partitioner, cli: &Cli) -> Vec<f64> {
    let grid = partitioner.grid_size();
    let cs = partitioner.cell_size();
    let hot_center = [cli.box_len / 4.0; 3];
    let hot_radius = cli.box_len / 4.0;

    (0..partitioner.n_local_cells())
        .map(|i| {
            let g = partitioner.global_cell(i);
            let c = [(g / grid[2]) / grid[1], (g / grid[2]) % grid[1], g % grid[2]];
            let mut dist2 = 0.0;
            for d in 0..3 {
                let mid = (c[d] as f64 + 0.5) * cs[d];
                dist2 += (mid - hot_center[d]).powi(2);
            }
            if dist2.sqrt() < hot_radius {
                cli.hot_weight
            } else {
                1.0
            }
        })
        .collect()
}
