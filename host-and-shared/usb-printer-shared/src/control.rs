//! Control transfer model: the SETUP packet and the stage a control callback is invoked in.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ControlStage {
    Setup = 1,
    Data = 2,
    Ack = 3,
}

impl ControlStage {
    pub const ALL: [ControlStage; 3] = [Self::Setup, Self::Data, Self::Ack];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host to device
    Out,
    /// Device to host
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RequestKind {
    Standard = 0,
    Class = 1,
    Vendor = 2,
    Reserved = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Recipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
    Reserved = 4,
}

/// Class-specific requests from the USB Printer class spec 1.1, section 4.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PrinterRequest {
    GetDeviceId = 0x00,
    GetPortStatus = 0x01,
    SoftReset = 0x02,
}

/// A decoded SETUP packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlRequest {
    pub direction: Direction,
    pub kind: RequestKind,
    pub recipient: Recipient,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// wLength
    pub length: u16,
}

impl ControlRequest {
    pub const LEN: usize = 8;

    pub fn parse(setup: &[u8; Self::LEN]) -> Self {
        let request_type = setup[0];

        let direction = if request_type & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        };

        let kind = match (request_type >> 5) & 0b11 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        };

        let recipient = match request_type & 0b1_1111 {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        };

        Self {
            direction,
            kind,
            recipient,
            request: setup[1],
            value: u16::from_le_bytes([setup[2], setup[3]]),
            index: u16::from_le_bytes([setup[4], setup[5]]),
            length: u16::from_le_bytes([setup[6], setup[7]]),
        }
    }

    pub fn printer_request(&self) -> Option<PrinterRequest> {
        if self.kind != RequestKind::Class {
            return None;
        }

        match self.request {
            0x00 => Some(PrinterRequest::GetDeviceId),
            0x01 => Some(PrinterRequest::GetPortStatus),
            0x02 => Some(PrinterRequest::SoftReset),
            _ => None,
        }
    }

    /// Interface the request is addressed to. GET_DEVICE_ID is the odd one out: it carries the
    /// interface in the high byte of wIndex and the alternate setting in the low byte.
    pub fn interface(&self) -> u8 {
        match self.printer_request() {
            Some(PrinterRequest::GetDeviceId) => (self.index >> 8) as u8,
            _ => (self.index & 0xFF) as u8,
        }
    }
}
