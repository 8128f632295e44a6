//! The decoupled fetch front-end.
//!
//! Runs ahead of the I-cache by predicting control flow and staging a queue
//! of fetch targets (FTs). This module provides:
//! 1. **Producer:** Per-cycle loop pulling ops upstream and composing FTs (`tick`).
//! 2. **Consumer:** Op- and FT-granularity handoff to the I-cache (`fetch_op`, `fetch_ft`).
//! 3. **Iterators:** Lookahead cursors for the prefetcher, stable across FT pops.
//! 4. **Recovery:** Misprediction rollback that tears down all in-flight FTs (`recover`).
//! 5. **Stalls:** Fetch-barrier handling from stall to retirement.

/// Adaptive FTQ depth controller.
pub mod depth;
/// Fetch target composition and consumption.
pub mod ft;
/// FTQ iterator state.
pub mod iter;

use std::collections::VecDeque;
use std::mem;

use log::{debug, warn};

use crate::common::Addr;
use crate::config::{AdjustableFtq, Config, FrontendConfig, FrontendKind};
use crate::core::op_pool::OpId;
use crate::core::units::bru::OpBranchPredictor;
use crate::sim::simulator::Core;
use crate::sim::source::InstructionSource;

pub use ft::{FetchTarget, FtEndedBy};
pub use iter::{FtqIter, IterId};

use crate::stats::BreakReason;

/// Which back-end stage resolved a misprediction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoverAt {
    /// Resolved at decode (wrong or missing target).
    Decode,
    /// Resolved at execute (wrong direction).
    Exec,
}

/// Everything recovery needs from the resolving back-end stage.
#[derive(Clone, Copy, Debug)]
pub struct RecoveryInfo {
    /// Correct fetch PC to resume from.
    pub fetch_addr: Addr,
    /// Sequence number of the mispredicted op; fetch resumes at `op_num + 1`.
    pub op_num: u64,
    /// Upstream UID of the mispredicted op.
    pub inst_uid: u64,
    /// Resolving stage.
    pub at: RecoverAt,
}

/// Per-core decoupled fetch front-end state.
pub struct DecoupledFrontend {
    /// Completed FTs awaiting the I-cache.
    ftq: VecDeque<FetchTarget>,
    /// The currently-growing FT.
    builder: FetchTarget,
    /// The FT the consumer is streaming from.
    in_use: FetchTarget,
    /// Registered lookahead iterators.
    iters: Vec<FtqIter>,

    /// Fetching down a predicted-wrong path.
    off_path: bool,
    /// Scheduler-level off-path mark, cleared by recovery.
    pub sched_off_path: bool,
    /// Next op sequence number to stamp.
    op_num: u64,
    /// Fetch PC the first post-recovery op must match.
    recovery_addr: Option<Addr>,
    /// Cycle of the redirect that sent fetch off-path (0 when on-path).
    redirect_cycle: u64,
    /// A fetch barrier is pending retirement.
    stalled: bool,
    /// Current FTQ depth bound in FTs.
    ftq_ft_num: u64,
    /// Redirect on every predicted-taken branch while off-path.
    trace_mode: bool,
    /// Consecutive zero-progress producer ticks.
    fwd_progress: u64,

    cfg: FrontendConfig,
}

impl DecoupledFrontend {
    /// Creates a front-end from the configuration.
    pub fn new(config: &Config) -> Self {
        assert!(
            config.frontend.icache_line_size.is_power_of_two(),
            "I-cache line size must be a power of two"
        );
        Self {
            ftq: VecDeque::new(),
            builder: FetchTarget::default(),
            in_use: FetchTarget::default(),
            iters: Vec::new(),
            off_path: false,
            sched_off_path: false,
            op_num: 1,
            recovery_addr: None,
            redirect_cycle: 0,
            stalled: false,
            ftq_ft_num: config.frontend.ftq_block_num,
            trace_mode: config.frontend.kind == FrontendKind::Trace,
            fwd_progress: 0,
            cfg: config.frontend.clone(),
        }
    }

    /// Number of completed FTs waiting in the FTQ.
    #[inline]
    pub fn num_fts(&self) -> usize {
        self.ftq.len()
    }

    /// Total ops across all FTs waiting in the FTQ.
    pub fn num_ops(&self) -> u64 {
        self.ftq.iter().map(|ft| ft.num_ops() as u64).sum()
    }

    /// Current FTQ depth bound.
    #[inline]
    pub fn depth_bound(&self) -> u64 {
        self.ftq_ft_num
    }

    /// Whether fetch is currently on a predicted-wrong path.
    #[inline]
    pub fn is_off_path(&self) -> bool {
        self.off_path
    }

    /// Whether a fetch barrier is pending retirement.
    #[inline]
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// The sequence number the next produced op will receive.
    #[inline]
    pub fn next_op_num(&self) -> u64 {
        self.op_num
    }

    // ------------------------------------------------------------------
    // Producer
    // ------------------------------------------------------------------

    /// Runs one producer cycle: pulls ops upstream, predicts control flow,
    /// composes FTs, and enqueues completed ones until a budget or stall
    /// condition breaks the cycle.
    pub fn tick(&mut self, core: &mut Core) {
        core.bp.begin_cycle();
        core.stats.cycle(self.off_path);

        self.fwd_progress += 1;
        if self.fwd_progress >= self.cfg.progress_limit {
            warn!(
                "no forward progress for {} cycles, aborting",
                self.cfg.progress_limit
            );
            panic!("fetch front-end made no forward progress");
        }

        let mut cf_num: u32 = 0;
        let mut bytes_this_cycle: u64 = 0;
        let mut cfs_taken_this_cycle: u64 = 0;

        loop {
            assert!(self.num_fts() as u64 <= self.ftq_ft_num);
            assert!(cfs_taken_this_cycle <= self.cfg.taken_cfs_per_cycle);

            if self.num_fts() as u64 == self.ftq_ft_num {
                debug!("break due to full FTQ");
                core.stats.break_event(BreakReason::FullFtq, self.off_path);
                break;
            }
            if cfs_taken_this_cycle == self.cfg.taken_cfs_per_cycle {
                debug!("break due to max taken CFs per cycle");
                core.stats
                    .break_event(BreakReason::MaxCfsTaken, self.off_path);
                break;
            }
            // `>=` because inst size does not necessarily align with the budget.
            if bytes_this_cycle >= self.cfg.bytes_per_cycle {
                debug!("break due to max bytes per cycle");
                core.stats.break_event(BreakReason::MaxBytes, self.off_path);
                break;
            }
            if core.bp.advertises_prediction_limit() && !core.bp.is_predictable() {
                debug!("break due to limited branch predictor");
                core.stats.break_event(BreakReason::PredBr, self.off_path);
                break;
            }
            if self.stalled {
                debug!("break waiting for fetch barrier to resolve");
                core.stats.break_event(BreakReason::BarFetch, self.off_path);
                break;
            }
            if !core.src.can_fetch_op() {
                warn!("could not fetch op from upstream source");
                break;
            }

            self.fwd_progress = 0;
            let id = core.pool.alloc();
            core.src.fetch_op(core.pool.get_mut(id));
            {
                let op = core.pool.get_mut(id);
                op.op_num = self.op_num;
                op.off_path = self.off_path;
            }
            self.op_num += 1;

            if core.pool.get(id).is_cf() {
                assert!(core.pool.get(id).eom, "control flow on a non-final micro-op");
                let fetch_addr = core.pool.get(id).addr;
                let pred_addr = core.bp.predict_op(core.pool.get_mut(id), cf_num, fetch_addr);
                cf_num += 1;

                let op = core.pool.get_mut(id);
                debug!(
                    "predict CF fetch_addr:{:#x} true_npc:{:#x} pred_npc:{:#x} mispred:{} btb_miss:{} taken:{} recover_at_decode:{} recover_at_exec:{} off_path:{} bar_fetch:{}",
                    op.addr,
                    op.oracle.npc,
                    pred_addr,
                    op.oracle.mispred,
                    op.oracle.btb_miss,
                    op.oracle.pred_taken,
                    op.oracle.recover_at_decode,
                    op.oracle.recover_at_exec,
                    op.off_path,
                    op.bar_fetch,
                );

                // A fetch barrier stalls the front-end instead of scheduling a
                // recovery; the back-end cannot recover across a barrier, and
                // the stall costs the same cycles a recovery would.
                if op.is_fetch_barrier() {
                    op.oracle.recover_at_decode = false;
                    op.oracle.recover_at_exec = false;
                    let (addr, off, num) = (op.addr, op.off_path, op.op_num);
                    self.stall(addr, off, num);
                }

                let op = core.pool.get_mut(id);
                if op.oracle.recover_at_decode || op.oracle.recover_at_exec {
                    assert!(
                        !(op.oracle.recover_at_decode && op.oracle.recover_at_exec),
                        "an op may recover at decode or exec, not both"
                    );
                    // Once off-path, recoveries are not scheduled out of
                    // order: an older op may resolve at exec while a younger
                    // one resolves at decode. The off-path duration stays
                    // accurate even though the cause is not attributed.
                    if self.off_path {
                        op.oracle.recover_at_decode = false;
                        op.oracle.recover_at_exec = false;
                    }
                    self.off_path = true;
                    let uid = op.inst_uid;
                    core.src.redirect(uid, pred_addr);
                    self.redirect_cycle = core.cycle;
                } else if self.trace_mode && self.off_path && op.oracle.pred_taken {
                    // Off-path speculation in trace mode follows predicted paths.
                    let uid = op.inst_uid;
                    core.src.redirect(uid, pred_addr);
                }
            } else {
                let op = core.pool.get(id);
                assert!(
                    !(op.oracle.recover_at_decode || op.oracle.recover_at_exec),
                    "recovery flags on a non-CF op"
                );
                if op.bar_fetch {
                    let (addr, off, num) = (op.addr, op.off_path, op.op_num);
                    self.stall(addr, off, num);
                }
            }

            // A fetch target ends at:
            // 1. an I-cache line boundary
            // 2. a taken control-flow op
            // 3. a syscall or serializing (fence) instruction
            // 4. application exit
            let mut ended_by = FtEndedBy::Init;
            {
                let op = core.pool.get(id);
                if op.eom {
                    let line_base = op.addr & !(self.cfg.icache_line_size - 1);
                    let end_of_line = op.end_addr() - line_base >= self.cfg.icache_line_size;
                    let cf_taken = op.is_cf() && op.oracle.pred_taken;
                    let bar_fetch = op.is_fetch_barrier();

                    ended_by = if op.exit {
                        FtEndedBy::AppExit
                    } else if bar_fetch {
                        FtEndedBy::BarFetch
                    } else if cf_taken {
                        FtEndedBy::TakenBranch
                    } else if end_of_line {
                        FtEndedBy::IcacheLineBoundary
                    } else {
                        FtEndedBy::Init
                    };

                    bytes_this_cycle += op.size;
                    cfs_taken_this_cycle += (cf_taken || bar_fetch) as u64;
                }
            }

            self.builder.add_op(&core.pool, id, ended_by);
            if ended_by != FtEndedBy::Init {
                assert!(
                    self.builder.start() != 0
                        && self.builder.length() != 0
                        && self.builder.num_ops() != 0
                );
                self.ftq.push_back(mem::take(&mut self.builder));
            }

            core.stats.fetched_ins(self.off_path);

            let op = core.pool.get(id);
            debug!(
                "push op to FTQ fetch_addr:{:#x} off_path:{} op_num:{} recovery_addr:{:x?} bar_fetch:{}",
                op.addr, op.off_path, op.op_num, self.recovery_addr, op.bar_fetch,
            );

            // Recovery sanity check: the first op after a recovery must
            // resume exactly at the recovery fetch address.
            if let Some(addr) = self.recovery_addr {
                assert_eq!(addr, op.addr, "post-recovery fetch resumed at the wrong PC");
                self.recovery_addr = None;
            }
        }
    }

    fn stall(&mut self, addr: Addr, off_path: bool, op_num: u64) {
        self.stalled = true;
        debug!(
            "fetch stalled on barrier fetch_addr:{:#x} off_path:{} op_num:{}",
            addr, off_path, op_num
        );
    }

    /// Retires `op` on behalf of the back-end: clears a pending barrier stall
    /// if this op raised one, then forwards retirement upstream.
    pub fn retire(&mut self, core: &mut Core, id: OpId) {
        let op = core.pool.get(id);
        let uid = op.inst_uid;
        if op.is_fetch_barrier() {
            debug!(
                "fetch unstalled by retired barrier fetch_addr:{:#x} op_num:{}",
                op.addr, op.op_num
            );
            self.stalled = false;
        }
        core.src.retire(uid);
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Rolls the front-end back after a resolved misprediction.
    ///
    /// Destroys all in-flight FTs, releases their unconsumed ops, resets
    /// every iterator, optionally resizes the FTQ depth, and redirects the
    /// upstream source to the recovery point.
    pub fn recover(&mut self, core: &mut Core, info: &RecoveryInfo) {
        self.off_path = false;
        self.sched_off_path = false;
        self.recovery_addr = Some(info.fetch_addr);

        for ftgt in self.ftq.iter_mut() {
            ftgt.free_ops_and_clear(&mut core.pool);
        }
        self.ftq.clear();
        self.builder.free_ops_and_clear(&mut core.pool);
        self.in_use.free_ops_and_clear(&mut core.pool);

        self.op_num = info.op_num + 1;
        debug!("recovery signalled fetch_addr:{:#x}", info.fetch_addr);

        // The FTQ flushed; every iterator restarts at the head.
        for it in self.iters.iter_mut() {
            it.reset();
        }
        core.fdip.clear_cur_op();

        if self.cfg.adjustable_ftq != AdjustableFtq::Off && core.fdip.utility_timeliness.adjust {
            let feedback = core.fdip.utility_timeliness;
            debug!(
                "utility ratio {:.3}, timeliness ratio {:.3}, FTQ ft num {}",
                feedback.utility_ratio, feedback.timeliness_ratio, self.ftq_ft_num
            );
            self.ftq_ft_num = depth::adjusted_depth(
                self.cfg.adjustable_ftq,
                self.ftq_ft_num,
                feedback.utility_ratio,
                feedback.timeliness_ratio,
                self.cfg.uftq_min_block_num,
                self.cfg.uftq_max_block_num,
            );
            debug!("new FTQ ft num {}", self.ftq_ft_num);
            core.fdip.utility_timeliness.adjust = false;
        }

        if self.stalled {
            debug!(
                "unstalled off-path fetch barrier due to recovery fetch_addr:{:#x}",
                info.fetch_addr
            );
            self.stalled = false;
        }

        match info.at {
            RecoverAt::Decode => core.stats.recover_decode += 1,
            RecoverAt::Exec => core.stats.recover_exec += 1,
        }

        // Charge off-path cycles only when a redirect is actually pending;
        // back-to-back recoveries must not double count.
        if self.redirect_cycle != 0 {
            assert!(core.cycle > self.redirect_cycle);
            core.stats.offpath_cycles += core.cycle - self.redirect_cycle;
            self.redirect_cycle = 0;
        }

        core.src.recover(info.inst_uid);
        assert_eq!(
            info.fetch_addr,
            core.src.next_fetch_addr(),
            "recovery addr does not match the upstream source's resume addr"
        );
    }

    // ------------------------------------------------------------------
    // Consumer
    // ------------------------------------------------------------------

    /// True iff the consumer can receive another op.
    pub fn can_fetch_op(&self) -> bool {
        self.in_use.can_fetch_op() || self.can_fetch_ft()
    }

    /// Hands the next op to the I-cache, popping the next FT into the in-use
    /// slot when the current one is exhausted. The bool marks the last op of
    /// its FT.
    pub fn fetch_op(&mut self, core: &mut Core) -> Option<(OpId, bool)> {
        if !self.in_use.can_fetch_op() {
            if self.can_fetch_ft() {
                self.fetch_ft(core);
            } else {
                return None;
            }
        }

        assert!(self.in_use.can_fetch_op());
        let (id, end_of_ft) = self.in_use.fetch_op().expect("in-use FT exhausted");
        let op = core.pool.get(id);
        debug!(
            "fetch op from FT fetch_addr:{:#x} off_path:{} op_num:{}",
            op.addr, op.off_path, op.op_num
        );
        Some((id, end_of_ft))
    }

    /// Takes back the most recently fetched op.
    ///
    /// The op must be identity-equal to the last one delivered, and must not
    /// be the first op of the in-use FT.
    pub fn return_op(&mut self, core: &Core, id: OpId) {
        self.in_use.return_op(id);
        let op = core.pool.get(id);
        debug!("return fetched op to FT fetch_addr:{:#x}", op.addr);
    }

    /// True iff a completed FT is waiting in the FTQ.
    pub fn can_fetch_ft(&self) -> bool {
        !self.ftq.is_empty()
    }

    /// Pops the head FT into the in-use slot and rebases every iterator so it
    /// keeps pointing at the same op. Returns the FT's window `(start, length)`.
    pub fn fetch_ft(&mut self, core: &mut Core) -> Option<(Addr, Addr)> {
        let ftgt = self.ftq.pop_front()?;
        let popped_ops = ftgt.num_ops() as u64;

        for it in self.iters.iter_mut() {
            if self.cfg.fdip_bp_confidence && it.ft_pos == 0 && it.op_pos == 0 {
                assert_eq!(it.flattened_op_pos, 0);
                core.fdip.set_cur_op(ftgt.op_at(0));
            }

            if it.ft_pos > 0 {
                // Past the popped FT: shift down by one FT and its ops.
                assert!(it.flattened_op_pos >= popped_ops);
                it.flattened_op_pos -= popped_ops;
                it.ft_pos -= 1;
            } else {
                // Standing on the popped FT: restart at the new head.
                assert!(it.flattened_op_pos < popped_ops);
                it.flattened_op_pos = 0;
                it.op_pos = 0;
            }
        }

        let window = (ftgt.start(), ftgt.length());
        self.in_use = ftgt;
        Some(window)
    }

    /// PC of the next op the consumer would receive; defers to the upstream
    /// source only when both the in-use FT and the FTQ are empty.
    pub fn next_fetch_addr(&self, core: &Core) -> Addr {
        if let Some(id) = self.in_use.next_op() {
            return core.pool.get(id).addr;
        }
        if let Some(ftgt) = self.ftq.front() {
            return core.pool.get(ftgt.op_at(0)).addr;
        }
        core.src.next_fetch_addr()
    }

    // ------------------------------------------------------------------
    // Iterators
    // ------------------------------------------------------------------

    /// Registers a new iterator at the head of the FTQ and returns its
    /// handle. Registered iterators are rebased on FT pops and reset by
    /// recovery.
    pub fn new_iter(&mut self) -> IterId {
        self.iters.push(FtqIter::default());
        IterId(self.iters.len() - 1)
    }

    /// The op at the iterator's position, with an end-of-FT marker. `None`
    /// when the FTQ is empty or the iterator is parked past the last FT.
    pub fn iter_get(&self, id: IterId) -> Option<(OpId, bool)> {
        let it = &self.iters[id.0];
        if self.ftq.is_empty() {
            assert!(it.ft_pos == 0 && it.op_pos == 0 && it.flattened_op_pos == 0);
            return None;
        }
        if it.ft_pos == self.ftq.len() {
            return None;
        }

        let ftgt = &self.ftq[it.ft_pos];
        assert!(it.op_pos < ftgt.num_ops());
        let end_of_ft = it.op_pos == ftgt.num_ops() - 1;
        Some((ftgt.op_at(it.op_pos), end_of_ft))
    }

    /// Advances the iterator and returns the op at its new position, if any.
    ///
    /// Advancing past the last op of the last FT parks the iterator one past
    /// the end; it resumes at op 0 of the next FT the producer enqueues.
    pub fn iter_advance(&mut self, id: IterId) -> Option<(OpId, bool)> {
        let len = self.ftq.len();
        let last_op_of_ft = |it: &FtqIter| it.op_pos + 1 == self.ftq[it.ft_pos].num_ops();

        let it = &self.iters[id.0];
        if it.ft_pos + 1 == len && last_op_of_ft(it) {
            // Last op of the last FT: park for FTs yet to arrive.
            let it = &mut self.iters[id.0];
            it.ft_pos += 1;
            it.op_pos = 0;
            it.flattened_op_pos += 1;
            return None;
        }
        if it.ft_pos == len {
            // Already parked.
            assert_eq!(it.op_pos, 0);
            return None;
        }
        let advance_ft = last_op_of_ft(it);
        let it = &mut self.iters[id.0];
        if advance_ft {
            it.ft_pos += 1;
            it.op_pos = 0;
        } else {
            it.op_pos += 1;
        }
        it.flattened_op_pos += 1;
        self.iter_get(id)
    }

    /// The iterator's flattened op offset from the start of the FTQ. It is
    /// incremented by advancing, decremented when the consumer pops FTs, and
    /// zeroed by recovery.
    pub fn iter_offset(&self, id: IterId) -> u64 {
        self.iters[id.0].flattened_op_pos
    }

    /// The iterator's FT offset from the start of the FTQ.
    pub fn iter_ft_offset(&self, id: IterId) -> usize {
        self.iters[id.0].ft_pos
    }
}
