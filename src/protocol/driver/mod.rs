//! CAN driver layer: buffer tables, dispatch engine, fault recovery and the
//! runner task that keeps the interface polled.
pub mod buffer_table;
pub mod can_module;
pub mod driver_supervisor;
pub mod fault_recovery;

/// Local duties serviced while a task waits on the bus (watchdog,
/// diagnostics). Runs once per loop iteration and must not block.
pub trait Housekeeping {
    fn run(&mut self);
}

impl<F: FnMut()> Housekeeping for F {
    fn run(&mut self) {
        self()
    }
}
