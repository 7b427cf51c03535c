// Test doubles simulating the CAN interface, the timer and a small object
// dictionary during integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use embedded_can::ErrorKind;
use korri_canopen::core::{Access, EntryDescriptor, GroupDescriptor, GroupId, OdLayout, ValueKind};
use korri_canopen::protocol::transport::{
    can_frame::{BusFrame, CanFrame, ErrorFrame},
    traits::{can_bus::CanBus, node_timer::NodeTimer},
};
use tokio::sync::mpsc;

//==================================================================================CAN_BUS
#[derive(Default)]
struct SharedState {
    link_events: Vec<bool>,
    fail_next_send: Option<ErrorKind>,
}

/// Device side of a simulated CAN interface.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: mpsc::UnboundedReceiver<BusFrame>,
    state: Arc<Mutex<SharedState>>,
}

/// Host side: injects data and error frames, observes transmissions and
/// link cycling.
pub struct HostBus {
    tx: mpsc::UnboundedSender<BusFrame>,
    rx: mpsc::UnboundedReceiver<CanFrame>,
    state: Arc<Mutex<SharedState>>,
}

impl MockCanBus {
    /// Construct a pair of interconnected ends (DUT ↔ host).
    pub fn create_pair() -> (Self, HostBus) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(SharedState::default()));

        let dut_bus = Self {
            tx: dut_tx,
            rx: dut_rx,
            state: state.clone(),
        };
        let host_bus = HostBus {
            tx: host_tx,
            rx: host_rx,
            state,
        };
        (dut_bus, host_bus)
    }
}

impl CanBus for MockCanBus {
    type Error = ErrorKind;

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        if let Some(kind) = self.state.lock().unwrap().fail_next_send.take() {
            return Err(kind);
        }
        self.tx.send(frame.clone()).map_err(|_| ErrorKind::Other)
    }

    async fn recv<'a>(&'a mut self) -> Result<BusFrame, Self::Error> {
        self.rx.recv().await.ok_or(ErrorKind::Other)
    }

    async fn set_link<'a>(&'a mut self, up: bool) -> Result<(), Self::Error> {
        self.state.lock().unwrap().link_events.push(up);
        Ok(())
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl HostBus {
    pub fn inject(&self, frame: BusFrame) {
        self.tx.send(frame).unwrap();
    }

    pub fn inject_data(&self, id: u16, payload: &[u8]) {
        self.inject(BusFrame::Data(CanFrame::standard(id, payload).unwrap()));
    }

    pub fn inject_error(&self, frame: ErrorFrame) {
        self.inject(BusFrame::Error(frame));
    }

    pub async fn recv(&mut self) -> Option<CanFrame> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CanFrame> {
        self.rx.try_recv().ok()
    }

    /// Link transitions requested by the device, in order.
    pub fn link_events(&self) -> Vec<bool> {
        self.state.lock().unwrap().link_events.clone()
    }

    /// Make the next device transmission fail with `kind`.
    pub fn fail_next_send(&self, kind: ErrorKind) {
        self.state.lock().unwrap().fail_next_send = Some(kind);
    }
}

//==================================================================================TIMER
/// Timer based on the tokio clock, so paused time drives the dwell logic.
pub struct MockTimer {
    base: tokio::time::Instant,
}

impl MockTimer {
    pub fn new() -> Self {
        Self {
            base: tokio::time::Instant::now(),
        }
    }
}

impl NodeTimer for MockTimer {
    fn now(&self) -> embassy_time::Instant {
        embassy_time::Instant::from_micros(self.base.elapsed().as_micros() as u64)
    }

    async fn delay<'a>(&'a mut self, duration: embassy_time::Duration) {
        tokio::time::sleep(std::time::Duration::from_micros(duration.as_micros())).await;
    }
}

//==================================================================================DICTIONARY
pub const IMAGE_LEN: usize = 32;
pub const STORAGE_LEN: usize = 256;

pub const OUTPUT_DELAY: (u16, u8) = (0x2000, 1);
pub const OUTPUT_MODE: (u16, u8) = (0x2000, 2);
pub const SERIAL_NUMBER: (u16, u8) = (0x1018, 4);
pub const SERIAL_VALID: (u16, u8) = (0x2200, 1);

static GROUPS: [GroupDescriptor; 3] = [
    GroupDescriptor { id: GroupId::Communication, offset: 0, len: 8, reserved: 32 },
    GroupDescriptor { id: GroupId::Params, offset: 8, len: 4, reserved: 32 },
    GroupDescriptor { id: GroupId::Serial, offset: 12, len: 5, reserved: 32 },
];

static ENTRIES: [EntryDescriptor; 6] = [
    EntryDescriptor {
        index: 0x1010,
        sub_index: 1,
        name: "Save all parameters",
        kind: ValueKind::U32,
        group: GroupId::Communication,
        offset: 0,
        access: Access::StoreCommand,
        notify: false,
    },
    EntryDescriptor {
        index: 0x1011,
        sub_index: 1,
        name: "Restore all default parameters",
        kind: ValueKind::U32,
        group: GroupId::Communication,
        offset: 4,
        access: Access::RestoreCommand,
        notify: false,
    },
    EntryDescriptor {
        index: OUTPUT_DELAY.0,
        sub_index: OUTPUT_DELAY.1,
        name: "Output delay",
        kind: ValueKind::U16,
        group: GroupId::Params,
        offset: 8,
        access: Access::ReadWrite,
        notify: true,
    },
    EntryDescriptor {
        index: OUTPUT_MODE.0,
        sub_index: OUTPUT_MODE.1,
        name: "Output mode",
        kind: ValueKind::U16,
        group: GroupId::Params,
        offset: 10,
        access: Access::ReadWrite,
        notify: false,
    },
    EntryDescriptor {
        index: SERIAL_NUMBER.0,
        sub_index: SERIAL_NUMBER.1,
        name: "Serial number",
        kind: ValueKind::U32,
        group: GroupId::Serial,
        offset: 12,
        access: Access::WriteOnce { flag: SERIAL_VALID },
        notify: false,
    },
    EntryDescriptor {
        index: SERIAL_VALID.0,
        sub_index: SERIAL_VALID.1,
        name: "Serial number valid",
        kind: ValueKind::Bool,
        group: GroupId::Serial,
        offset: 16,
        access: Access::ReadOnly,
        notify: false,
    },
];

pub fn od_layout() -> OdLayout {
    OdLayout {
        groups: &GROUPS,
        entries: &ENTRIES,
    }
}

/// Compiled-in values: both command objects report 1, output delay 100.
pub fn od_image() -> [u8; IMAGE_LEN] {
    let mut image = [0u8; IMAGE_LEN];
    image[0..4].copy_from_slice(&1u32.to_le_bytes());
    image[4..8].copy_from_slice(&1u32.to_le_bytes());
    image[8..10].copy_from_slice(&100u16.to_le_bytes());
    image
}
