use std::path::PathBuf;

use clap::Parser;

use redblack_sor::algs::convergence::ConvergencePolicy;
use redblack_sor::solver::{self, RootResult, RunConfig};
use redblack_sor::sor_error::SorError;

/// Distributed red-black SOR solver for the 2D steady-state heat equation
#[derive(Parser)]
#[command(name = "redblack-sor", version)]
struct Cli {
    /// Grid rows
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    global_x: u64,

    /// Grid columns
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    global_y: u64,

    /// Worker rows
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    px: u64,

    /// Worker columns
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    py: u64,

    /// Iteration cap
    #[arg(long, default_value_t = solver::DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Stop early once every worker reports a steady state
    #[arg(long)]
    convergence: bool,

    /// Iterations between convergence checks
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    check_period: u64,

    /// A cell counts as settled below this per-iteration change
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,

    /// Write the final grid to res_redblack_{X}x{Y}_{Px}x{Py} in this directory
    #[arg(long, value_name = "DIR")]
    dump_grid: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> RunConfig {
        let mut config = RunConfig::new(
            self.global_x as usize,
            self.global_y as usize,
            self.px as usize,
            self.py as usize,
        )
        .with_iterations(self.iterations);
        if self.convergence {
            config = config.with_convergence(ConvergencePolicy {
                period: self.check_period as usize,
                tolerance: self.tolerance,
            });
        }
        config
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.config();

    let result = launch(&config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    if let Some(RootResult { report, grid }) = result {
        println!("{report}");
        if let Some(dir) = &cli.dump_grid {
            let path = grid.write_dump(dir, config.px, config.py).unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(1);
            });
            log::info!("wrote grid to {}", path.display());
        }
    }
}

/// Run all workers as threads of this process, one per rank.
#[cfg(not(feature = "mpi-support"))]
fn launch(config: &RunConfig) -> Result<Option<RootResult>, SorError> {
    use redblack_sor::algs::communicator::{Communicator, ThreadComm};
    use redblack_sor::data::GlobalGrid;
    use redblack_sor::topology::Partition;

    let part = Partition::new(config.global_x, config.global_y, config.px, config.py);
    let comms = ThreadComm::universe(config.px * config.py);
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                scope.spawn(move || {
                    let global = (comm.rank() == 0).then(|| GlobalGrid::with_default_init(&part));
                    solver::run_worker(&comm, config, global)
                })
            })
            .collect();
        let mut root = None;
        for (rank, handle) in handles.into_iter().enumerate() {
            let outcome = handle
                .join()
                .map_err(|_| SorError::WorkerPanicked { rank })??;
            if outcome.is_some() {
                root = outcome;
            }
        }
        Ok(root)
    })
}

/// Run as one rank of an MPI world; launch under `mpirun`.
#[cfg(feature = "mpi-support")]
fn launch(config: &RunConfig) -> Result<Option<RootResult>, SorError> {
    use redblack_sor::algs::communicator::{Communicator, MpiComm};
    use redblack_sor::data::GlobalGrid;
    use redblack_sor::topology::Partition;

    let _universe = mpi::initialize().ok_or(SorError::MpiInit)?;
    let comm = MpiComm::new();
    let part = Partition::new(config.global_x, config.global_y, config.px, config.py);
    let global = (comm.rank() == 0).then(|| GlobalGrid::with_default_init(&part));
    solver::run_worker(&comm, config, global)
}
