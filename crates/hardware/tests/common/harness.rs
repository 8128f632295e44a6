use fetch_core::Config;
use fetch_core::Simulator;
use fetch_core::common::Addr;
use fetch_core::core::op::CfType;
use fetch_core::sim::trace::{MispredictAt, TraceInst, Workload};

/// Fluent builder for workload program images.
///
/// Modifier methods (`uops`, `mispredict`, `taken`) apply to the most
/// recently added instruction.
#[derive(Default)]
pub struct WorkloadBuilder {
    entry: Option<Addr>,
    insts: Vec<TraceInst>,
}

impl WorkloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the entry PC; defaults to the first instruction's address.
    pub fn entry(mut self, addr: Addr) -> Self {
        self.entry = Some(addr);
        self
    }

    /// Adds a plain (non-CF) instruction.
    pub fn inst(mut self, addr: Addr, size: u64) -> Self {
        self.insts.push(TraceInst {
            addr,
            size,
            ..TraceInst::default()
        });
        self
    }

    /// Adds a conditional branch with its true direction.
    pub fn branch(mut self, addr: Addr, size: u64, target: Addr, taken: bool) -> Self {
        self.insts.push(TraceInst {
            addr,
            size,
            cf: CfType::CondBr,
            target,
            taken,
            ..TraceInst::default()
        });
        self
    }

    /// Adds an unconditional direct branch.
    pub fn jump(mut self, addr: Addr, size: u64, target: Addr) -> Self {
        self.insts.push(TraceInst {
            addr,
            size,
            cf: CfType::Br,
            target,
            taken: true,
            ..TraceInst::default()
        });
        self
    }

    /// Adds an indirect branch with its true target.
    pub fn indirect(mut self, addr: Addr, size: u64, target: Addr) -> Self {
        self.insts.push(TraceInst {
            addr,
            size,
            cf: CfType::IndirectBr,
            target,
            taken: true,
            ..TraceInst::default()
        });
        self
    }

    /// Adds a serializing (fetch-barrier) instruction.
    pub fn barrier(mut self, addr: Addr, size: u64) -> Self {
        self.insts.push(TraceInst {
            addr,
            size,
            bar_fetch: true,
            ..TraceInst::default()
        });
        self
    }

    /// Adds a system call.
    pub fn syscall(mut self, addr: Addr, size: u64) -> Self {
        self.insts.push(TraceInst {
            addr,
            size,
            syscall: true,
            taken: true,
            target: addr + size,
            ..TraceInst::default()
        });
        self
    }

    /// Adds an application-exit instruction.
    pub fn exit(mut self, addr: Addr, size: u64) -> Self {
        self.insts.push(TraceInst {
            addr,
            size,
            exit: true,
            ..TraceInst::default()
        });
        self
    }

    /// Cracks the last instruction into `n` micro-ops.
    pub fn uops(mut self, n: u32) -> Self {
        self.insts.last_mut().expect("no instruction to modify").uops = n;
        self
    }

    /// Scripts a misprediction on the last instruction.
    pub fn mispredict(mut self, at: MispredictAt) -> Self {
        self.insts.last_mut().expect("no instruction to modify").mispredict = Some(at);
        self
    }

    pub fn build(self) -> Workload {
        let entry = self
            .entry
            .or_else(|| self.insts.first().map(|i| i.addr))
            .expect("empty workload");
        Workload {
            entry,
            insts: self.insts,
        }
    }
}

/// The end-to-end scenario configuration: FTQ depth 4, 64-byte lines,
/// 32 bytes and 1 taken CF per producer cycle.
pub fn scenario_config() -> Config {
    let mut config = Config::default();
    config.frontend.ftq_block_num = 4;
    config.frontend.icache_line_size = 64;
    config.frontend.bytes_per_cycle = 32;
    config.frontend.taken_cfs_per_cycle = 1;
    config
}

pub struct TestContext {
    pub sim: Simulator,
}

impl TestContext {
    /// Builds a context with the scenario configuration.
    pub fn new(workload: &Workload) -> Self {
        Self::with_config(workload, &scenario_config())
    }

    pub fn with_config(workload: &Workload, config: &Config) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            sim: Simulator::new(config, workload),
        }
    }

    /// Runs producer-only cycles; nothing consumes the FTQ.
    pub fn produce(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.sim.core.cycle += 1;
            self.sim.frontend.tick(&mut self.sim.core);
        }
    }

    /// Runs full simulator cycles (back-end model included).
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.sim.tick();
        }
    }
}
