//! Installing the descriptor set into the USB stack.
//!
//! `install` is the single fallible step of bringing the printer up. Callbacks are only reachable
//! through the `PrinterInterface` an `Installed` set hands out, so nothing is invoked when the
//! installation fails.

use crate::control::{ControlRequest, ControlStage, Recipient, RequestKind};
use crate::descriptors::strings::{StringTable, STRINGS};
use crate::descriptors::{
    descriptor_type, validate_configuration, ConfigurationSummary, DescriptorError,
    DeviceDescriptor, CONFIGURATION_DESCRIPTOR, DEVICE_DESCRIPTOR_BYTES,
};
use crate::printer::PrinterHandler;
use defmt_or_log::{info, warn};

/// The record handed to the stack on installation
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig<'a> {
    pub device_descriptor: Option<&'a [u8]>,
    pub configuration_descriptor: Option<&'a [u8]>,
    /// `None` leaves every string index unanswered
    pub string_descriptor: Option<&'a StringTable>,
    pub external_phy: bool,
}

impl DriverConfig<'static> {
    /// The printer's own descriptor set on the internal PHY
    pub fn printer() -> Self {
        Self {
            device_descriptor: Some(&DEVICE_DESCRIPTOR_BYTES),
            configuration_descriptor: Some(&CONFIGURATION_DESCRIPTOR),
            string_descriptor: Some(&STRINGS),
            external_phy: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InstallError {
    #[error("no {0} descriptor given")]
    MissingDescriptor(&'static str),
    #[error("malformed descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("{0} configurations declared, exactly one is supported")]
    UnsupportedConfigurationCount(u8),
    #[error("an external PHY is not supported")]
    ExternalPhyUnsupported,
    #[error("the configuration has no bulk OUT/IN endpoint pair")]
    MissingBulkEndpoints,
    #[error("bulk endpoint {address:#04x} has an invalid full speed packet size {size}")]
    UnsupportedPacketSize { address: u8, size: u16 },
    #[error("string descriptor {index} is referenced but missing from the table")]
    MissingString { index: u8 },
    #[error("the stack allocated interface {allocated} instead of {expected}")]
    InterfaceMismatch { expected: u8, allocated: u8 },
    #[error("the stack allocated endpoint {allocated:#04x} instead of {expected:#04x}")]
    EndpointMismatch { expected: u8, allocated: u8 },
}

// full speed bulk endpoints only allow these
const BULK_PACKET_SIZES: [u16; 4] = [8, 16, 32, 64];

/// A validated descriptor set, ready to be served to the host
#[derive(Debug, Clone, Copy)]
pub struct Installed<'a> {
    pub device: DeviceDescriptor,
    pub configuration: ConfigurationSummary,
    device_bytes: &'a [u8],
    configuration_bytes: &'a [u8],
    strings: Option<&'a StringTable>,
}

pub fn install<'a>(config: &DriverConfig<'a>) -> Result<Installed<'a>, InstallError> {
    if config.external_phy {
        return Err(InstallError::ExternalPhyUnsupported);
    }

    let device_bytes = config
        .device_descriptor
        .ok_or(InstallError::MissingDescriptor("device"))?;
    let device = DeviceDescriptor::parse(device_bytes)?;

    if device.num_configurations != 1 {
        return Err(InstallError::UnsupportedConfigurationCount(
            device.num_configurations,
        ));
    }

    let configuration_bytes = config
        .configuration_descriptor
        .ok_or(InstallError::MissingDescriptor("configuration"))?;
    let configuration = validate_configuration(configuration_bytes)?;

    let (Some(bulk_out), Some(bulk_in)) = (configuration.bulk_out, configuration.bulk_in) else {
        return Err(InstallError::MissingBulkEndpoints);
    };

    for endpoint in [bulk_out, bulk_in] {
        if !BULK_PACKET_SIZES.contains(&endpoint.max_packet_size) {
            return Err(InstallError::UnsupportedPacketSize {
                address: endpoint.address,
                size: endpoint.max_packet_size,
            });
        }
    }

    if let Some(strings) = config.string_descriptor {
        for index in [
            device.manufacturer_index,
            device.product_index,
            device.serial_number_index,
        ] {
            if index != 0 && strings.get(index).is_none() {
                return Err(InstallError::MissingString { index });
            }
        }
    }

    info!(
        "Installing USB device 0x{:X}:0x{:X}, interface class 0x{:X}",
        device.vendor_id, device.product_id, configuration.interface_class
    );

    Ok(Installed {
        device,
        configuration,
        device_bytes: &device_bytes[..DeviceDescriptor::LEN],
        configuration_bytes,
        strings: config.string_descriptor,
    })
}

fn copy_into(src: &[u8], buf: &mut [u8]) -> usize {
    let len = src.len().min(buf.len());
    buf[..len].copy_from_slice(&src[..len]);
    len
}

impl<'a> Installed<'a> {
    /// Answers a GET_DESCRIPTOR request: fills `buf` with what the host receives and returns
    /// the length, or `None` when there is no such descriptor.
    pub fn get_descriptor(
        &self,
        descriptor_type: u8,
        index: u8,
        language_id: u16,
        buf: &mut [u8],
    ) -> Option<usize> {
        match descriptor_type {
            descriptor_type::DEVICE => Some(copy_into(self.device_bytes, buf)),
            // only configuration 0 exists
            descriptor_type::CONFIGURATION if index == 0 => {
                Some(copy_into(self.configuration_bytes, buf))
            }
            descriptor_type::STRING => self.strings?.encode(index, language_id, buf),
            _ => None,
        }
    }

    pub fn string(&self, index: u8) -> Option<&'a str> {
        self.strings?.get(index)
    }

    pub fn bind<'h, H: PrinterHandler + ?Sized>(self, handler: &'h H) -> PrinterInterface<'h, H> {
        PrinterInterface {
            interface_number: self.configuration.interface_number,
            handler,
        }
    }
}

/// Routes stack events for the printer interface to a handler
pub struct PrinterInterface<'h, H: PrinterHandler + ?Sized> {
    interface_number: u8,
    handler: &'h H,
}

impl<'h, H: PrinterHandler + ?Sized> PrinterInterface<'h, H> {
    pub fn interface_number(&self) -> u8 {
        self.interface_number
    }

    /// The interface has been activated by the host
    pub fn enable(&self) {
        self.handler.init()
    }

    /// Returns `None` for requests that aren't class requests addressed to the printer
    /// interface, those are left to the stack.
    pub fn control(&self, stage: ControlStage, request: &ControlRequest) -> Option<bool> {
        let is_ours = request.kind == RequestKind::Class
            && request.recipient == Recipient::Interface
            && request.interface() == self.interface_number;

        if !is_ours {
            return None;
        }

        Some(self.handler.control_xfer(stage, request))
    }

    pub fn receive(&self, data: &[u8]) -> usize {
        let consumed = self.handler.write(data);
        if consumed < data.len() {
            warn!(
                "Printer handler consumed {} out of {} bytes",
                consumed,
                data.len()
            );
        }
        consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::strings::{LANGUAGE_ID_EN_US, PRODUCT_INDEX};
    use crate::descriptors::DEVICE_DESCRIPTOR;
    use crate::LogPrinter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPrinter {
        control: AtomicUsize,
        write: AtomicUsize,
        init: AtomicUsize,
    }

    impl CountingPrinter {
        fn total(&self) -> usize {
            self.control.load(Ordering::SeqCst)
                + self.write.load(Ordering::SeqCst)
                + self.init.load(Ordering::SeqCst)
        }
    }

    impl PrinterHandler for CountingPrinter {
        fn control_xfer(&self, _stage: ControlStage, _request: &ControlRequest) -> bool {
            self.control.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn write(&self, data: &[u8]) -> usize {
            self.write.fetch_add(1, Ordering::SeqCst);
            data.len()
        }

        fn init(&self) {
            self.init.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Startup as the firmware does it: install, then hand events to the interface
    fn run(config: &DriverConfig, handler: &CountingPrinter) -> Result<(), InstallError> {
        let interface = install(config)?.bind(handler);

        interface.enable();
        let setup = ControlRequest::parse(&[0x21, 0x02, 0, 0, 0, 0, 0, 0]);
        interface.control(ControlStage::Setup, &setup);
        interface.receive(&[0x1B, 0x40]);

        Ok(())
    }

    #[test]
    fn test_install_printer() {
        let installed = install(&DriverConfig::printer()).unwrap();

        assert_eq!(installed.device, DEVICE_DESCRIPTOR);
        assert_eq!(installed.configuration.interface_class, 0x07);
        assert_eq!(installed.string(PRODUCT_INDEX), Some("TinyUSB Printer"));
    }

    #[test]
    fn test_get_descriptors() {
        let installed = install(&DriverConfig::printer()).unwrap();
        let mut buf = [0u8; 256];

        let len = installed
            .get_descriptor(descriptor_type::DEVICE, 0, 0, &mut buf)
            .unwrap();
        assert_eq!(&buf[..len], &DEVICE_DESCRIPTOR_BYTES);

        let len = installed
            .get_descriptor(descriptor_type::CONFIGURATION, 0, 0, &mut buf)
            .unwrap();
        assert_eq!(&buf[..len], &CONFIGURATION_DESCRIPTOR);

        assert_eq!(
            installed.get_descriptor(descriptor_type::CONFIGURATION, 1, 0, &mut buf),
            None
        );
        assert_eq!(
            installed.get_descriptor(descriptor_type::INTERFACE, 0, 0, &mut buf),
            None
        );
    }

    #[test]
    fn test_host_reads_product_string() {
        let installed = install(&DriverConfig::printer()).unwrap();
        let mut buf = [0u8; 255];

        let len = installed
            .get_descriptor(descriptor_type::STRING, 2, LANGUAGE_ID_EN_US, &mut buf)
            .unwrap();
        let units = buf[2..len]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect::<Vec<_>>();

        assert_eq!(String::from_utf16(&units).unwrap(), "TinyUSB Printer");
    }

    #[test]
    fn test_short_reads_are_truncated() {
        let installed = install(&DriverConfig::printer()).unwrap();
        // hosts first read 8 bytes of the device descriptor to learn bMaxPacketSize0
        let mut buf = [0u8; 8];

        let len = installed
            .get_descriptor(descriptor_type::DEVICE, 0, 0, &mut buf)
            .unwrap();
        assert_eq!(len, 8);
        assert_eq!(buf[7], 64);
    }

    #[test]
    fn test_no_string_table() {
        let config = DriverConfig {
            string_descriptor: None,
            ..DriverConfig::printer()
        };
        let installed = install(&config).unwrap();
        let mut buf = [0u8; 64];

        assert_eq!(installed.string(PRODUCT_INDEX), None);
        assert_eq!(
            installed.get_descriptor(descriptor_type::STRING, 2, LANGUAGE_ID_EN_US, &mut buf),
            None
        );
    }

    #[test]
    fn test_callbacks_run_after_install() {
        let printer = CountingPrinter::default();

        run(&DriverConfig::printer(), &printer).unwrap();

        assert_eq!(printer.init.load(Ordering::SeqCst), 1);
        assert_eq!(printer.control.load(Ordering::SeqCst), 1);
        assert_eq!(printer.write.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_configuration_invokes_nothing() {
        let printer = CountingPrinter::default();
        let config = DriverConfig {
            configuration_descriptor: None,
            ..DriverConfig::printer()
        };

        assert_eq!(
            run(&config, &printer),
            Err(InstallError::MissingDescriptor("configuration"))
        );
        assert_eq!(printer.total(), 0, "no callback may run after a failed install");
    }

    #[test]
    fn test_malformed_configuration_invokes_nothing() {
        let printer = CountingPrinter::default();
        let mut bytes = CONFIGURATION_DESCRIPTOR;
        // wTotalLength
        bytes[2] = 0x40;
        let config = DriverConfig {
            configuration_descriptor: Some(&bytes),
            ..DriverConfig::printer()
        };

        assert_eq!(
            run(&config, &printer),
            Err(InstallError::Descriptor(
                DescriptorError::TotalLengthMismatch {
                    declared: 0x40,
                    actual: 32
                }
            ))
        );
        assert_eq!(printer.total(), 0);

        let garbage = [0u8; 16];
        let config = DriverConfig {
            configuration_descriptor: Some(&garbage),
            ..DriverConfig::printer()
        };
        assert_eq!(
            run(&config, &printer),
            Err(InstallError::Descriptor(DescriptorError::ZeroLength))
        );
        assert_eq!(printer.total(), 0);
    }

    #[test]
    fn test_missing_device_descriptor() {
        let config = DriverConfig {
            device_descriptor: None,
            ..DriverConfig::printer()
        };
        assert_eq!(
            install(&config).err(),
            Some(InstallError::MissingDescriptor("device"))
        );
    }

    #[test]
    fn test_configuration_count() {
        let mut bytes = DEVICE_DESCRIPTOR_BYTES;
        bytes[17] = 2;
        let config = DriverConfig {
            device_descriptor: Some(&bytes),
            ..DriverConfig::printer()
        };
        assert_eq!(
            install(&config).err(),
            Some(InstallError::UnsupportedConfigurationCount(2))
        );
    }

    #[test]
    fn test_external_phy() {
        let config = DriverConfig {
            external_phy: true,
            ..DriverConfig::printer()
        };
        assert_eq!(
            install(&config).err(),
            Some(InstallError::ExternalPhyUnsupported)
        );
    }

    #[test]
    fn test_no_bulk_endpoints() {
        // configuration + interface with zero endpoints
        let mut bytes = [0u8; 18];
        bytes.copy_from_slice(&CONFIGURATION_DESCRIPTOR[..18]);
        bytes[2] = 18;
        bytes[13] = 0;
        let config = DriverConfig {
            configuration_descriptor: Some(&bytes),
            ..DriverConfig::printer()
        };
        assert_eq!(
            install(&config).err(),
            Some(InstallError::MissingBulkEndpoints)
        );
    }

    #[test]
    fn test_packet_size() {
        let mut bytes = CONFIGURATION_DESCRIPTOR;
        // wMaxPacketSize of the IN endpoint
        bytes[29] = 0x00;
        bytes[30] = 0x02;
        let config = DriverConfig {
            configuration_descriptor: Some(&bytes),
            ..DriverConfig::printer()
        };
        assert_eq!(
            install(&config).err(),
            Some(InstallError::UnsupportedPacketSize {
                address: 0x81,
                size: 512
            })
        );
    }

    #[test]
    fn test_missing_string() {
        static SHORT: StringTable = StringTable {
            language_id: LANGUAGE_ID_EN_US,
            strings: &["TinyUSB"],
        };
        let config = DriverConfig {
            string_descriptor: Some(&SHORT),
            ..DriverConfig::printer()
        };
        assert_eq!(
            install(&config).err(),
            Some(InstallError::MissingString { index: 2 })
        );
    }

    #[test]
    fn test_control_routing() {
        let installed = install(&DriverConfig::printer()).unwrap();
        let interface = installed.bind(&LogPrinter);

        // GET_PORT_STATUS on interface 0
        let ours = ControlRequest::parse(&[0xA1, 0x01, 0, 0, 0, 0, 1, 0]);
        for stage in ControlStage::ALL {
            assert_eq!(interface.control(stage, &ours), Some(true));
        }

        // the same request for another interface
        let other_interface = ControlRequest::parse(&[0xA1, 0x01, 0, 0, 1, 0, 1, 0]);
        assert_eq!(interface.control(ControlStage::Setup, &other_interface), None);

        // SET_CONFIGURATION belongs to the stack
        let standard = ControlRequest::parse(&[0x00, 0x09, 1, 0, 0, 0, 0, 0]);
        assert_eq!(interface.control(ControlStage::Setup, &standard), None);
    }

    #[test]
    fn test_receive_returns_full_length() {
        let installed = install(&DriverConfig::printer()).unwrap();
        let interface = installed.bind(&LogPrinter);
        let data = [0xAAu8; 64];

        assert_eq!(interface.receive(&data), 64);
    }
}
