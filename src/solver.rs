//! Per-worker driver: scatter, sweep loop, convergence voting, gather.
//!
//! Every worker runs [`run_worker`] with the same [`RunConfig`]; only the
//! root passes (and gets back) a full-size grid. The loop body mirrors the
//! classic message-passing structure: swap buffers, refresh the halo of the
//! previous buffer, sweep red then black, and periodically vote on
//! convergence with a logical-AND reduction.

use std::fmt;
use std::time::Instant;

use crate::algs::communicator::Communicator;
use crate::algs::convergence::{self, ConvergencePolicy};
use crate::algs::distribute::{gather_grid, scatter_grid};
use crate::algs::halo::HaloExchange;
use crate::algs::kernel::{self, SweepRange};
use crate::data::{GlobalGrid, TilePair};
use crate::sor_error::SorError;
use crate::topology::{Partition, ProcessGrid};

/// Iteration cap used when the caller does not pick one.
pub const DEFAULT_ITERATIONS: usize = 256;

/// One run's parameters, identical on every worker.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunConfig {
    /// True domain rows.
    pub global_x: usize,
    /// True domain columns.
    pub global_y: usize,
    /// Worker rows.
    pub px: usize,
    /// Worker columns.
    pub py: usize,
    /// Iteration cap.
    pub iterations: usize,
    /// Optional early-exit policy; `None` always runs the full cap.
    pub convergence: Option<ConvergencePolicy>,
}

impl RunConfig {
    /// Config for a `global_x x global_y` domain over `px x py` workers,
    /// with the default iteration cap and no convergence checks.
    pub fn new(global_x: usize, global_y: usize, px: usize, py: usize) -> Self {
        Self {
            global_x,
            global_y,
            px,
            py,
            iterations: DEFAULT_ITERATIONS,
            convergence: None,
        }
    }

    /// Replace the iteration cap.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Enable periodic convergence checks.
    #[must_use]
    pub fn with_convergence(mut self, policy: ConvergencePolicy) -> Self {
        self.convergence = Some(policy);
        self
    }
}

/// Root-side summary of a finished run.
///
/// Timings are the maxima over all workers; `iterations` counts sweeps
/// actually executed, which is below the cap when the run converged early.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunReport {
    pub global_x: usize,
    pub global_y: usize,
    pub px: usize,
    pub py: usize,
    pub iterations: usize,
    pub compute_seconds: f64,
    pub total_seconds: f64,
    pub midpoint: f64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RedBlackSOR X {} Y {} Px {} Py {} Iter {} ComputationTime {:.6} TotalTime {:.6} midpoint {:.6}",
            self.global_x,
            self.global_y,
            self.px,
            self.py,
            self.iterations,
            self.compute_seconds,
            self.total_seconds,
            self.midpoint
        )
    }
}

/// What the root worker hands back: the summary plus the gathered grid.
#[derive(Clone, Debug)]
pub struct RootResult {
    pub report: RunReport,
    pub grid: GlobalGrid,
}

/// One worker's run-lifetime state, derived once before the first sweep
/// and read-only from then on.
#[derive(Clone, Debug)]
pub struct RunContext {
    /// Tile shape and padded extent.
    pub part: Partition,
    /// This worker's seat and neighbors.
    pub topo: ProcessGrid,
    /// Over-relaxation factor.
    pub omega: f64,
    /// Clipped sweep bounds for this seat.
    pub range: SweepRange,
    /// Global coordinates of the first owned cell; parity is derived from
    /// these on every access.
    pub origin: (usize, usize),
}

impl RunContext {
    /// Derive the state for `rank` of `size` workers under `config`.
    ///
    /// # Errors
    /// Propagates [`SorError::TopologyMismatch`] and
    /// [`SorError::RankOutOfRange`] from the topology step.
    pub fn new(config: &RunConfig, rank: usize, size: usize) -> Result<Self, SorError> {
        // Validate the topology first; the partition divides by the worker
        // counts and is only defined once they are known to be sound.
        let topo = ProcessGrid::new(rank, size, config.px, config.py)?;
        let part = Partition::new(config.global_x, config.global_y, config.px, config.py);
        let omega = kernel::relaxation_factor(config.global_x);
        let range = SweepRange::clipped(&part, &topo);
        let origin = topo.tile_origin(&part);
        Ok(Self {
            part,
            topo,
            omega,
            range,
            origin,
        })
    }
}

/// Execute one worker's share of a run.
///
/// `global` must be `Some` exactly on the root; it is consumed, and the
/// gather assembles the result into a fresh buffer. Returns `Some` on the
/// root, `None` everywhere else.
///
/// # Errors
///
/// Fails when the topology does not match the communicator
/// ([`SorError::TopologyMismatch`], [`SorError::RankOutOfRange`]), when the
/// root grid is missing or mis-shaped ([`SorError::MissingGlobalGrid`],
/// [`SorError::GridShapeMismatch`]), or when an exchange breaks down.
pub fn run_worker<C: Communicator>(
    comm: &C,
    config: &RunConfig,
    global: Option<GlobalGrid>,
) -> Result<Option<RootResult>, SorError> {
    let ctx = RunContext::new(config, comm.rank(), comm.size())?;

    let mut pair = TilePair::new(&ctx.part);
    scatter_grid(comm, &ctx.part, &ctx.topo, global.as_ref(), pair.previous_mut())?;
    pair.seed_current_from_previous();
    // The root's full-size buffer is dead weight during the sweeps; the
    // gather assembles into a fresh one.
    drop(global);

    let mut halo = HaloExchange::new(&ctx.part, &ctx.topo);
    if ctx.topo.is_root() {
        log::debug!(
            "starting run: {}x{} over {}x{} workers, omega {:.4}, cap {}",
            config.global_x,
            config.global_y,
            config.px,
            config.py,
            ctx.omega,
            config.iterations
        );
    }

    let mut globally_converged = false;
    let mut iterations = 0;
    let mut compute_seconds = 0.0_f64;
    let total_start = Instant::now();
    for t in 0..config.iterations {
        if globally_converged {
            break;
        }
        pair.swap();
        halo.exchange(comm, pair.previous_mut())?;

        let sweep_start = Instant::now();
        {
            let (prev, cur) = pair.previous_and_current_mut();
            kernel::red_sweep(prev, cur, &ctx.range, ctx.origin, ctx.omega);
            kernel::black_sweep(prev, cur, &ctx.range, ctx.origin, ctx.omega);
        }
        compute_seconds += sweep_start.elapsed().as_secs_f64();
        iterations = t + 1;

        if let Some(policy) = config.convergence {
            if t % policy.period.max(1) == 0 {
                let local = convergence::locally_converged(
                    pair.previous(),
                    pair.current(),
                    &ctx.range,
                    policy.tolerance,
                );
                globally_converged = comm.all_land(local);
                if ctx.topo.is_root() && !globally_converged {
                    // The residual scan only runs when tracing is enabled.
                    log::trace!(
                        "iteration {t}: root block residual {:.3e}",
                        convergence::max_delta(pair.previous(), pair.current(), &ctx.range)
                    );
                }
            }
        }
    }
    let total_seconds = total_start.elapsed().as_secs_f64();

    // Collect timings before the gather so the result excludes assembly.
    let compute_max = comm.reduce_max(compute_seconds, 0);
    let total_max = comm.reduce_max(total_seconds, 0);

    let mut assembled = ctx.topo.is_root().then(|| GlobalGrid::new(&ctx.part));
    gather_grid(comm, &ctx.part, &ctx.topo, pair.current(), assembled.as_mut())?;

    Ok(assembled.map(|grid| {
        let report = RunReport {
            global_x: config.global_x,
            global_y: config.global_y,
            px: config.px,
            py: config.py,
            iterations,
            compute_seconds: compute_max.unwrap_or(compute_seconds),
            total_seconds: total_max.unwrap_or(total_seconds),
            midpoint: grid.midpoint(),
        };
        log::debug!("finished after {} iterations", report.iterations);
        RootResult { report, grid }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_fills_in_defaults() {
        let config = RunConfig::new(64, 48, 2, 2);
        assert_eq!(config.iterations, DEFAULT_ITERATIONS);
        assert!(config.convergence.is_none());
        let tuned = config
            .with_iterations(10)
            .with_convergence(ConvergencePolicy::default());
        assert_eq!(tuned.iterations, 10);
        assert_eq!(tuned.convergence, Some(ConvergencePolicy::default()));
    }

    #[test]
    fn context_derives_one_workers_seat() {
        let config = RunConfig::new(10, 7, 3, 2);
        let ctx = RunContext::new(&config, 5, 6).unwrap();
        assert_eq!(ctx.topo.coords(), (2, 1));
        assert_eq!(ctx.origin, (8, 4));
        assert!(ctx.omega > 1.0 && ctx.omega < 2.0);
        // The bottom-right seat clips away its padding rows and column.
        assert_eq!(ctx.range.i_max, 1);
        assert_eq!(ctx.range.j_max, 2);
        assert!(matches!(
            RunContext::new(&config, 0, 4),
            Err(SorError::TopologyMismatch { .. })
        ));
    }

    #[test]
    fn zero_worker_axes_are_rejected() {
        // A zero axis must come back as an error before any per-worker
        // share of the domain is computed from it.
        for (px, py) in [(0, 2), (2, 0), (0, 0)] {
            let config = RunConfig::new(8, 8, px, py);
            assert!(matches!(
                RunContext::new(&config, 0, 1),
                Err(SorError::TopologyMismatch { .. })
            ));
        }
    }

    #[test]
    fn report_renders_the_summary_line() {
        let report = RunReport {
            global_x: 1024,
            global_y: 1024,
            px: 2,
            py: 2,
            iterations: 256,
            compute_seconds: 1.25,
            total_seconds: 2.5,
            midpoint: 48.828125,
        };
        assert_eq!(
            report.to_string(),
            "RedBlackSOR X 1024 Y 1024 Px 2 Py 2 Iter 256 \
             ComputationTime 1.250000 TotalTime 2.500000 midpoint 48.828125"
        );
    }
}
