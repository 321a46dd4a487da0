//! Static descriptor set the device presents during enumeration.
//!
//! Everything here is a compile-time constant. The tables are handed to the USB stack verbatim
//! (or used to configure it) and answered back to the host on GET_DESCRIPTOR.

use crate::{
    ENDPOINT_INDEX, INTERFACE_NUMBER, MAX_PACKET_SIZE, PRINTER_INTERFACE_CLASS,
    PRINTER_INTERFACE_PROTOCOL, PRINTER_INTERFACE_SUBCLASS, USB_PID, USB_VID,
};

mod configuration;
mod iter;
pub mod strings;

pub use configuration::{validate_configuration, ConfigurationSummary, EndpointSummary};
pub use iter::DescriptorIter;

/// bDescriptorType values from the USB 2.0 spec, table 9-5
pub mod descriptor_type {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
}

/// bmAttributes transfer type bits of an endpoint descriptor
pub mod transfer_type {
    pub const BULK: u8 = 0b10;

    pub const MASK: u8 = 0b11;
}

/// Direction bit of bEndpointAddress
pub const ENDPOINT_DIR_IN: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorError {
    #[error("descriptor is shorter than its header")]
    TooShort,
    #[error("descriptor overflows the buffer")]
    Overflow,
    #[error("descriptor has zero length")]
    ZeroLength,
    #[error("unexpected descriptor type {found:#04x}, expected {expected:#04x}")]
    UnexpectedType { expected: u8, found: u8 },
    #[error("wTotalLength is {declared} but the descriptor is {actual} bytes")]
    TotalLengthMismatch { declared: u16, actual: usize },
    #[error("bNumInterfaces is {declared} but {actual} interfaces follow")]
    InterfaceCountMismatch { declared: u8, actual: u8 },
    #[error("bNumEndpoints of interface {interface} is {declared} but {actual} endpoints follow")]
    EndpointCountMismatch {
        interface: u8,
        declared: u8,
        actual: u8,
    },
}

/// Standard device descriptor. All multibyte fields are little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    /// bcdUSB, "Binary Coded Decimal": 0x0200 is USB 2.0
    pub usb_version: u16,
    pub device_class: u8,
    pub device_sub_class: u8,
    pub device_protocol: u8,
    pub max_packet_size_0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// bcdDevice, 0x0100 corresponds to "1.0"
    pub device_release: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_number_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    pub const LEN: usize = 18;

    pub const fn to_bytes(self) -> [u8; Self::LEN] {
        let usb = self.usb_version.to_le_bytes();
        let vid = self.vendor_id.to_le_bytes();
        let pid = self.product_id.to_le_bytes();
        let release = self.device_release.to_le_bytes();

        [
            Self::LEN as u8,
            descriptor_type::DEVICE,
            usb[0],
            usb[1],
            self.device_class,
            self.device_sub_class,
            self.device_protocol,
            self.max_packet_size_0,
            vid[0],
            vid[1],
            pid[0],
            pid[1],
            release[0],
            release[1],
            self.manufacturer_index,
            self.product_index,
            self.serial_number_index,
            self.num_configurations,
        ]
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, DescriptorError> {
        if bytes.len() < 2 {
            return Err(DescriptorError::TooShort);
        }
        if bytes[1] != descriptor_type::DEVICE {
            return Err(DescriptorError::UnexpectedType {
                expected: descriptor_type::DEVICE,
                found: bytes[1],
            });
        }
        if (bytes[0] as usize) < Self::LEN {
            return Err(DescriptorError::TooShort);
        }
        if bytes.len() < Self::LEN {
            return Err(DescriptorError::Overflow);
        }

        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);

        Ok(Self {
            usb_version: u16_at(2),
            device_class: bytes[4],
            device_sub_class: bytes[5],
            device_protocol: bytes[6],
            max_packet_size_0: bytes[7],
            vendor_id: u16_at(8),
            product_id: u16_at(10),
            device_release: u16_at(12),
            manufacturer_index: bytes[14],
            product_index: bytes[15],
            serial_number_index: bytes[16],
            num_configurations: bytes[17],
        })
    }
}

pub const DEVICE_DESCRIPTOR: DeviceDescriptor = DeviceDescriptor {
    usb_version: 0x0200,
    // defined at the interface level
    device_class: 0x00,
    device_sub_class: 0x00,
    device_protocol: 0x00,
    max_packet_size_0: MAX_PACKET_SIZE as u8,
    vendor_id: USB_VID,
    product_id: USB_PID,
    device_release: 0x0100,
    manufacturer_index: strings::MANUFACTURER_INDEX,
    product_index: strings::PRODUCT_INDEX,
    serial_number_index: strings::SERIAL_NUMBER_INDEX,
    num_configurations: 1,
};

pub static DEVICE_DESCRIPTOR_BYTES: [u8; DeviceDescriptor::LEN] = DEVICE_DESCRIPTOR.to_bytes();

pub const CONFIGURATION_DESCRIPTOR_LEN: usize = 9 + 9 + 7 + 7;

const TOTAL_LENGTH: [u8; 2] = (CONFIGURATION_DESCRIPTOR_LEN as u16).to_le_bytes();
const PACKET_SIZE: [u8; 2] = MAX_PACKET_SIZE.to_le_bytes();

const CONFIGURATION: [u8; CONFIGURATION_DESCRIPTOR_LEN] = [
    // Configuration
    9,                              // bLength
    descriptor_type::CONFIGURATION, // bDescriptorType
    TOTAL_LENGTH[0],                // wTotalLength
    TOTAL_LENGTH[1],
    0x01, // bNumInterfaces
    0x01, // bConfigurationValue
    0x00, // iConfiguration
    0x80, // bmAttributes: bus powered, no remote wakeup
    0x32, // bMaxPower, in 2 mA units
    // Interface
    9,                          // bLength
    descriptor_type::INTERFACE, // bDescriptorType
    INTERFACE_NUMBER,           // bInterfaceNumber
    0x00,                       // bAlternateSetting
    0x02,                       // bNumEndpoints
    PRINTER_INTERFACE_CLASS,    // bInterfaceClass
    PRINTER_INTERFACE_SUBCLASS, // bInterfaceSubClass
    PRINTER_INTERFACE_PROTOCOL, // bInterfaceProtocol
    0x00,                       // iInterface
    // Endpoint OUT
    7,                         // bLength
    descriptor_type::ENDPOINT, // bDescriptorType
    ENDPOINT_INDEX,            // bEndpointAddress
    transfer_type::BULK,       // bmAttributes
    PACKET_SIZE[0],            // wMaxPacketSize
    PACKET_SIZE[1],
    0x00, // bInterval
    // Endpoint IN
    7,                                // bLength
    descriptor_type::ENDPOINT,        // bDescriptorType
    ENDPOINT_DIR_IN | ENDPOINT_INDEX, // bEndpointAddress
    transfer_type::BULK,              // bmAttributes
    PACKET_SIZE[0],                   // wMaxPacketSize
    PACKET_SIZE[1],
    0x00, // bInterval
];

pub static CONFIGURATION_DESCRIPTOR: [u8; CONFIGURATION_DESCRIPTOR_LEN] = CONFIGURATION;

const _: () = assert!(
    u16::from_le_bytes([CONFIGURATION[2], CONFIGURATION[3]]) as usize == CONFIGURATION.len(),
    "wTotalLength must match the configuration descriptor size"
);

const _: () = assert!(
    DEVICE_DESCRIPTOR.num_configurations == 1,
    "exactly one configuration block is provided"
);
