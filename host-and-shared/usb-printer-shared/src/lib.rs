#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

pub mod control;
pub mod descriptors;
pub mod hexdump;
pub mod install;
pub mod printer;
#[cfg(any(test, feature = "embassy-usb"))]
pub mod usb_builder;

pub use crate::control::{ControlRequest, ControlStage};
pub use crate::descriptors::strings::{StringTable, STRINGS};
pub use crate::descriptors::{
    ConfigurationSummary, DescriptorError, DeviceDescriptor, CONFIGURATION_DESCRIPTOR,
    DEVICE_DESCRIPTOR,
};
pub use crate::install::{install, DriverConfig, InstallError, Installed, PrinterInterface};
pub use crate::printer::{LogPrinter, PrinterHandler};

// Test VID/PID pair used by TinyUSB examples, not allocated to a vendor
pub const USB_VID: u16 = 0xCAFE;
pub const USB_PID: u16 = 0x4000;

/// Maximum for full speed USB, used for both EP0 and the bulk endpoints
pub const MAX_PACKET_SIZE: u16 = 64;

/// Printer class code
pub const PRINTER_INTERFACE_CLASS: u8 = 0x07;
/// Printer subclass code
pub const PRINTER_INTERFACE_SUBCLASS: u8 = 0x01;
/// Bidirectional interface protocol
pub const PRINTER_INTERFACE_PROTOCOL: u8 = 0x02;

// 0 is the first/default, but they are extracted/checked just in case
pub const INTERFACE_NUMBER: u8 = 0;
pub const ENDPOINT_INDEX: u8 = 1;
