//! Control point sequencing for ERG mode.
//!
//! [`ErgControl`] decides which control point writes an operation needs and
//! tracks what the trainer has acknowledged. It performs no I/O: the link
//! worker writes each planned command and reports success back through
//! [`ErgControl::confirm`].

use crate::sensors::ftms::{encode_request_control, encode_reset, encode_set_target_power};

/// A single control point write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Take control of the trainer
    RequestControl,
    /// Hold the given target power
    SetTargetPower(i16),
    /// Drop ERG and return to free ride
    Reset,
}

impl ControlCommand {
    /// Wire bytes for this command.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlCommand::RequestControl => encode_request_control(),
            ControlCommand::SetTargetPower(watts) => encode_set_target_power(*watts),
            ControlCommand::Reset => encode_reset(),
        }
    }

    /// A failed best-effort write is logged and the sequence continues.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, ControlCommand::RequestControl)
    }
}

/// Acknowledged control state of the connected trainer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErgControl {
    has_control: bool,
    erg_active: bool,
    target_power: Option<i16>,
}

impl ErgControl {
    /// Fresh state for a newly connected trainer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a RequestControl write has succeeded on this connection.
    pub fn has_control(&self) -> bool {
        self.has_control
    }

    /// Whether the trainer is holding an ERG target.
    pub fn erg_active(&self) -> bool {
        self.erg_active
    }

    /// Last acknowledged target power.
    pub fn target_power(&self) -> Option<i16> {
        self.target_power
    }

    /// Writes issued right after subscribing.
    pub fn plan_connect(&self) -> Vec<ControlCommand> {
        vec![ControlCommand::RequestControl]
    }

    /// Writes needed to hold `watts`. Control is (re)requested first if missing.
    pub fn plan_set_target_power(&self, watts: i16) -> Vec<ControlCommand> {
        let mut plan = Vec::with_capacity(2);
        if !self.has_control {
            plan.push(ControlCommand::RequestControl);
        }
        plan.push(ControlCommand::SetTargetPower(watts));
        plan
    }

    /// Writes needed to leave ERG mode.
    pub fn plan_stop_erg(&self) -> Vec<ControlCommand> {
        vec![ControlCommand::Reset]
    }

    /// Writes that must precede tearing the trainer connection down.
    pub fn plan_disconnect(&self) -> Vec<ControlCommand> {
        if self.erg_active {
            vec![ControlCommand::Reset]
        } else {
            Vec::new()
        }
    }

    /// Record that `command` was written successfully.
    pub fn confirm(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::RequestControl => {
                self.has_control = true;
            }
            ControlCommand::SetTargetPower(watts) => {
                self.erg_active = true;
                self.target_power = Some(watts);
            }
            ControlCommand::Reset => {
                self.erg_active = false;
                self.target_power = None;
            }
        }
    }

    /// Forget everything; the connection is gone.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
