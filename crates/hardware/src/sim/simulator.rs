//! Simulator: owns the front-end and its collaborators side by side.
//!
//! The `Core` context bundles everything the front-end calls out to: the op
//! pool, the branch predictor, the upstream source, the FDIP interface
//! state, statistics, and the cycle counter. `Simulator` adds a small
//! back-end model standing in for the I-cache, decode, and execute stages:
//! it consumes ops at a fixed width, schedules recoveries from the oracle
//! flags after a decode or execute latency, and retires in order.

use std::collections::VecDeque;

use log::debug;

use crate::config::Config;
use crate::core::frontend::{DecoupledFrontend, RecoverAt, RecoveryInfo};
use crate::core::op_pool::{OpId, OpPool};
use crate::core::units::bru::BranchPredictorWrapper;
use crate::core::units::fdip::FdipInfo;
use crate::sim::source::{InstructionSource, ScriptedSource, SourceWrapper};
use crate::sim::trace::Workload;
use crate::stats::FrontendStats;

/// Per-core context: everything the front-end collaborates with.
///
/// Passed explicitly into every front-end call; there is no process-wide
/// active-core state.
pub struct Core {
    /// Op allocator; every staged op is released here exactly once.
    pub pool: OpPool,
    /// Branch predictor.
    pub bp: BranchPredictorWrapper,
    /// Upstream instruction source.
    pub src: SourceWrapper,
    /// FDIP feedback and anchor state.
    pub fdip: FdipInfo,
    /// Front-end statistics.
    pub stats: FrontendStats,
    /// Current cycle number.
    pub cycle: u64,
}

/// An op the back-end model has consumed and not yet retired.
struct InFlightOp {
    id: OpId,
    op_num: u64,
    retire_cycle: u64,
    exit: bool,
}

/// A misprediction waiting for its resolving stage.
struct PendingRecovery {
    due_cycle: u64,
    info: RecoveryInfo,
}

/// Top-level simulator: front-end plus the back-end consumer model.
pub struct Simulator {
    /// Shared per-core context.
    pub core: Core,
    /// The decoupled fetch front-end.
    pub frontend: DecoupledFrontend,

    rob: VecDeque<InFlightOp>,
    pending_recovery: Option<PendingRecovery>,
    fetch_width: usize,
    decode_latency: u64,
    exec_latency: u64,
    retire_latency: u64,
    finished: bool,
}

impl Simulator {
    /// Creates a simulator for `workload` under `config`.
    pub fn new(config: &Config, workload: &Workload) -> Self {
        let core = Core {
            pool: OpPool::new(),
            bp: BranchPredictorWrapper::new(config),
            src: SourceWrapper::Scripted(ScriptedSource::new(workload)),
            fdip: FdipInfo::default(),
            stats: FrontendStats::default(),
            cycle: 0,
        };
        Self {
            core,
            frontend: DecoupledFrontend::new(config),
            rob: VecDeque::new(),
            pending_recovery: None,
            fetch_width: config.backend.fetch_width,
            decode_latency: config.backend.decode_latency,
            exec_latency: config.backend.exec_latency,
            retire_latency: config.backend.retire_latency,
            finished: false,
        }
    }

    /// The workload's exit instruction has retired.
    #[inline]
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Advances the simulator by one clock cycle.
    pub fn tick(&mut self) {
        self.core.cycle += 1;

        self.resolve_recovery();
        self.retire_matured();
        self.consume();

        // Producer runs last so consumed slots refill within the cycle.
        self.frontend.tick(&mut self.core);
    }

    /// Runs until the workload exits or `max_cycles` elapse. Returns true if
    /// the workload ran to completion.
    pub fn run(&mut self, max_cycles: u64) -> bool {
        while !self.finished && self.core.cycle < max_cycles {
            self.tick();
        }
        self.finished
    }

    /// Applies a matured recovery: squashes wrong-path ops the back-end has
    /// consumed, then rolls the front-end back.
    fn resolve_recovery(&mut self) {
        let due = self
            .pending_recovery
            .as_ref()
            .is_some_and(|p| p.due_cycle <= self.core.cycle);
        if !due {
            return;
        }
        let info = self.pending_recovery.take().expect("checked above").info;
        debug!(
            "recovery matures at cycle {} fetch_addr:{:#x} op_num:{}",
            self.core.cycle, info.fetch_addr, info.op_num
        );

        // Ops younger than the mispredicted op are wrong-path; the back-end
        // owns them and must release them.
        let pool = &mut self.core.pool;
        self.rob.retain(|entry| {
            if entry.op_num > info.op_num {
                pool.free(entry.id);
                false
            } else {
                true
            }
        });

        self.frontend.recover(&mut self.core, &info);
    }

    /// Retires matured ops in program order, stopping short of any op younger
    /// than a pending recovery's mispredicted op.
    fn retire_matured(&mut self) {
        while let Some(head) = self.rob.front() {
            if head.retire_cycle > self.core.cycle {
                break;
            }
            if let Some(pending) = &self.pending_recovery {
                if head.op_num > pending.info.op_num {
                    break;
                }
            }
            let entry = self.rob.pop_front().expect("checked above");
            self.frontend.retire(&mut self.core, entry.id);
            if entry.exit {
                self.finished = true;
            }
            self.core.pool.free(entry.id);
        }
    }

    /// Consumes up to `fetch_width` ops from the front-end, scheduling a
    /// recovery for the first op that carries a resolve flag.
    fn consume(&mut self) {
        for _ in 0..self.fetch_width {
            let Some((id, _end_of_ft)) = self.frontend.fetch_op(&mut self.core) else {
                break;
            };
            let op = self.core.pool.get(id);
            let entry = InFlightOp {
                id,
                op_num: op.op_num,
                retire_cycle: self.core.cycle + self.retire_latency,
                exit: op.exit,
            };

            if self.pending_recovery.is_none() {
                let at = if op.oracle.recover_at_decode {
                    Some(RecoverAt::Decode)
                } else if op.oracle.recover_at_exec {
                    Some(RecoverAt::Exec)
                } else {
                    None
                };
                if let Some(at) = at {
                    let latency = match at {
                        RecoverAt::Decode => self.decode_latency,
                        RecoverAt::Exec => self.exec_latency,
                    };
                    self.pending_recovery = Some(PendingRecovery {
                        due_cycle: self.core.cycle + latency,
                        info: RecoveryInfo {
                            fetch_addr: op.oracle.npc,
                            op_num: op.op_num,
                            inst_uid: op.inst_uid,
                            at,
                        },
                    });
                }
            }

            self.rob.push_back(entry);
        }
    }

    /// Prints the front-end statistics report.
    pub fn print_stats(&self) {
        self.core.stats.print();
    }
}

impl Core {
    /// PC of the next op the consumer would receive from the upstream source
    /// if nothing is staged. Convenience for diagnostics.
    pub fn upstream_next_fetch_addr(&self) -> u64 {
        self.src.next_fetch_addr()
    }
}
