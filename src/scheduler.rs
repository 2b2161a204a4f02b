//! Simulated instruction scheduling
//!
//! While a program is generated, HashX keeps a model of how a superscalar
//! CPU would execute it: three integer issue ports in the style of Intel's
//! Ivy Bridge, a decoder that averages three instructions per clock, and a
//! per-register timestamp for when each value becomes available. The model
//! decides where every instruction lands in time, and the generator in
//! turn only offers registers that are ready at that moment.
//!
//! The schedule is not advisory: acceptance of a program depends on the
//! exact cycle assignments made here, so the placement rules below must
//! never change behind the generator's back.

use crate::program::Opcode;
use crate::register::{RegisterId, RegisterSet, NUM_REGISTERS};

/// Generation stops once an instruction would issue at this cycle.
pub(crate) const TARGET_CYCLE: usize = 170;

/// Number of cycles the port schedule can hold.
///
/// A few cycles past the target, so that long-latency instructions issued
/// near the end still fit.
const SCHEDULE_SIZE: usize = TARGET_CYCLE + 4;

/// Simulated decode rate: sub-cycles counted per clock cycle
const SUB_CYCLES_PER_CYCLE: usize = 3;

/// Number of modeled integer issue ports
const NUM_PORTS: usize = 3;

/// Index of port P0 in the busy matrix
const PORT_P0: usize = 0;
/// Index of port P1, the only port that can multiply
const PORT_P1: usize = 1;
/// Index of port P5 in the busy matrix
const PORT_P5: usize = 2;

/// The set of issue ports a micro-op is allowed to use
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum PortSet {
    /// Port P1 only
    P1,
    /// Port P5 only
    P5,
    /// Either of P0 and P1
    P01,
    /// Either of P0 and P5
    P05,
    /// Any integer port
    P015,
}

impl PortSet {
    /// May this micro-op issue on the port with the given index?
    #[inline(always)]
    fn allows(self, port: usize) -> bool {
        match self {
            PortSet::P1 => port == PORT_P1,
            PortSet::P5 => port == PORT_P5,
            PortSet::P01 => port == PORT_P0 || port == PORT_P1,
            PortSet::P05 => port == PORT_P0 || port == PORT_P5,
            PortSet::P015 => true,
        }
    }
}

/// Timing model for one opcode: result latency plus one or two micro-ops
struct ExecPlan {
    /// Cycles until the result can be consumed
    latency: usize,
    /// Port choices for the first micro-op
    first: PortSet,
    /// Port choices for the second micro-op, on the wide multiplies only
    second: Option<PortSet>,
}

/// Look up the timing model for an opcode.
#[inline(always)]
fn exec_plan(op: Opcode) -> ExecPlan {
    match op {
        Opcode::UMulH | Opcode::SMulH => ExecPlan {
            latency: 4,
            first: PortSet::P1,
            second: Some(PortSet::P5),
        },
        Opcode::Mul => ExecPlan {
            latency: 3,
            first: PortSet::P1,
            second: None,
        },
        Opcode::AddShift => ExecPlan {
            latency: 1,
            first: PortSet::P01,
            second: None,
        },
        Opcode::Rotate => ExecPlan {
            latency: 1,
            first: PortSet::P05,
            second: None,
        },
        Opcode::AddConst | Opcode::Negate | Opcode::Sub | Opcode::Xor | Opcode::XorConst => {
            ExecPlan {
                latency: 1,
                first: PortSet::P015,
                second: None,
            }
        }
    }
}

/// Port usage, decode position, and register readiness for a program
/// under construction
pub(crate) struct Scheduler {
    /// Sub-cycle position of the instruction decoder
    sub_cycle: usize,
    /// Cycle the decoder is currently in, `sub_cycle / 3`
    cycle: usize,
    /// Which ports are already taken in each cycle of the schedule
    busy: [[bool; NUM_PORTS]; SCHEDULE_SIZE],
    /// First cycle at which each register's value is available
    ready: [usize; NUM_REGISTERS],
    /// Latest register-ready cycle seen so far
    latency: usize,
}

impl Scheduler {
    /// A fresh schedule: every port free, every register ready at cycle 0.
    pub(crate) fn new() -> Self {
        Scheduler {
            sub_cycle: 0,
            cycle: 0,
            busy: [[false; NUM_PORTS]; SCHEDULE_SIZE],
            ready: [0; NUM_REGISTERS],
            latency: 0,
        }
    }

    /// The cycle the decoder has reached
    #[inline(always)]
    pub(crate) fn cycle(&self) -> usize {
        self.cycle
    }

    /// Cycle at which the whole program's last result lands
    #[inline(always)]
    pub(crate) fn overall_latency(&self) -> usize {
        self.latency
    }

    /// Move the decoder past one emitted instruction.
    #[inline(always)]
    pub(crate) fn advance(&mut self) {
        self.sub_cycle += 1;
        self.cycle = self.sub_cycle / SUB_CYCLES_PER_CYCLE;
    }

    /// Give up on the current cycle and skip the decoder a full cycle
    /// ahead, waiting for more registers to become ready.
    #[inline(always)]
    pub(crate) fn stall(&mut self) {
        self.sub_cycle += SUB_CYCLES_PER_CYCLE;
        self.cycle = self.sub_cycle / SUB_CYCLES_PER_CYCLE;
    }

    /// Registers whose values are available at the given cycle
    #[inline(always)]
    pub(crate) fn registers_available(&self, cycle: usize) -> RegisterSet {
        RegisterSet::all().filter(
            #[inline(always)]
            |reg| self.ready[reg.as_usize()] <= cycle,
        )
    }

    /// Record the register written by an instruction issued at `cycle`,
    /// becoming readable after the opcode's latency.
    #[inline(always)]
    pub(crate) fn retire(&mut self, op: Opcode, dst: RegisterId, cycle: usize) {
        let done = cycle + exec_plan(op).latency;
        self.ready[dst.as_usize()] = done;
        self.latency = self.latency.max(done);
    }

    /// Find the earliest cycle an instruction could issue, without
    /// claiming any ports.
    #[inline(always)]
    pub(crate) fn instruction_plan(&mut self, op: Opcode) -> Option<usize> {
        self.schedule_instruction(op, false)
    }

    /// Claim ports for an instruction, returning its issue cycle.
    #[inline(always)]
    pub(crate) fn commit_instruction(&mut self, op: Opcode) -> Option<usize> {
        self.schedule_instruction(op, true)
    }

    /// Place one micro-op at the earliest opportunity at or after `start`.
    ///
    /// Free ports are probed in the order P5, P0, P1, keeping P1 as clear
    /// as possible for the multiplies that have nowhere else to go.
    #[inline(always)]
    fn schedule_uop(&mut self, ports: PortSet, start: usize, commit: bool) -> Option<usize> {
        for cycle in start..SCHEDULE_SIZE {
            for port in [PORT_P5, PORT_P0, PORT_P1] {
                if ports.allows(port) && !self.busy[cycle][port] {
                    if commit {
                        self.busy[cycle][port] = true;
                    }
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Place all micro-ops of an instruction, searching from the decoder's
    /// current cycle.
    ///
    /// Two-op instructions are placed conservatively: both micro-ops must
    /// land in the same cycle. When such an instruction is committed, only
    /// the first micro-op claims its port; the second is probed again and
    /// left unclaimed. Every generated program depends on this exact
    /// sequence of port reservations, so it must be preserved as is.
    #[inline(always)]
    fn schedule_instruction(&mut self, op: Opcode, commit: bool) -> Option<usize> {
        let plan = exec_plan(op);
        match plan.second {
            None => self.schedule_uop(plan.first, self.cycle, commit),
            Some(second) => {
                for cycle in self.cycle..SCHEDULE_SIZE {
                    let first_at = self.schedule_uop(plan.first, cycle, false);
                    let second_at = self.schedule_uop(second, cycle, false);
                    if first_at.is_some() && first_at == second_at {
                        if commit {
                            self.schedule_uop(plan.first, cycle, true);
                            self.schedule_uop(second, cycle, false);
                        }
                        return first_at;
                    }
                }
                None
            }
        }
    }
}
