//! Setting up embassy-usb from an installed descriptor set.
//!
//! embassy-usb renders the descriptors itself from its `Config` and the builder calls, so the
//! mapping here has to reproduce the tables byte for byte. The one field it can't express is
//! `bcdUSB`: embassy-usb always reports USB 2.1 because it serves a BOS descriptor.

use embassy_usb::driver::{Driver, Endpoint};
use embassy_usb::{Builder, Config};

use crate::install::{InstallError, Installed};

/// embassy-usb's `bcdUSB`, in place of the table's 0x0200
pub const EMBASSY_BCD_USB: u16 = 0x0210;

/// The device level part: identity, strings, EP0 and power
pub fn usb_config<'a>(installed: &Installed<'a>) -> Config<'a> {
    let device = installed.device;
    let configuration = installed.configuration;

    let mut config = Config::new(device.vendor_id, device.product_id);
    config.manufacturer = installed.string(device.manufacturer_index);
    config.product = installed.string(device.product_index);
    config.serial_number = installed.string(device.serial_number_index);
    config.device_release = device.device_release;
    config.max_packet_size_0 = device.max_packet_size_0;

    // 0/0/0: the class is defined at the interface level
    config.device_class = device.device_class;
    config.device_sub_class = device.device_sub_class;
    config.device_protocol = device.device_protocol;
    // an IAD would add 8 bytes the configuration descriptor doesn't have
    config.composite_with_iads = false;

    config.max_power = configuration.max_power_ma;
    config.self_powered = configuration.self_powered;
    config.supports_remote_wakeup = configuration.remote_wakeup;

    config
}

pub struct PrinterEndpoints<'d, D: Driver<'d>> {
    pub bulk_out: D::EndpointOut,
    /// Nothing is ever sent back to the host, it only exists in the descriptors
    pub bulk_in: D::EndpointIn,
}

/// Adds the printer function to the builder exactly as the configuration descriptor lays it
/// out, and checks the stack allocated the same interface and endpoint numbers.
pub fn add_printer_function<'d, D: Driver<'d>>(
    builder: &mut Builder<'d, D>,
    installed: &Installed<'_>,
) -> Result<PrinterEndpoints<'d, D>, InstallError> {
    let summary = installed.configuration;
    let (Some(bulk_out), Some(bulk_in)) = (summary.bulk_out, summary.bulk_in) else {
        return Err(InstallError::MissingBulkEndpoints);
    };

    let mut function = builder.function(
        summary.interface_class,
        summary.interface_sub_class,
        summary.interface_protocol,
    );
    let mut interface = function.interface();
    let mut alt = interface.alt_setting(
        summary.interface_class,
        summary.interface_sub_class,
        summary.interface_protocol,
        None,
    );

    let allocated = alt.interface_number().0;
    if allocated != summary.interface_number {
        return Err(InstallError::InterfaceMismatch {
            expected: summary.interface_number,
            allocated,
        });
    }

    // same order as in the configuration descriptor
    let endpoint_out = alt.endpoint_bulk_out(bulk_out.max_packet_size);
    let endpoint_in = alt.endpoint_bulk_in(bulk_in.max_packet_size);

    for (expected, info) in [
        (bulk_out.address, endpoint_out.info()),
        (bulk_in.address, endpoint_in.info()),
    ] {
        let allocated = u8::from(info.addr);
        if allocated != expected {
            return Err(InstallError::EndpointMismatch {
                expected,
                allocated,
            });
        }
    }

    Ok(PrinterEndpoints {
        bulk_out: endpoint_out,
        bulk_in: endpoint_in,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{CONFIGURATION_DESCRIPTOR, DEVICE_DESCRIPTOR_BYTES};
    use crate::install::{install, DriverConfig};
    use embassy_usb::driver::{
        Bus, ControlPipe, Direction, EndpointAddress, EndpointAllocError, EndpointError,
        EndpointIn, EndpointInfo, EndpointOut, EndpointType, Event, Unsupported,
    };

    /// Hands out endpoint numbers in order, starting at `first_endpoint`, like the RP2040 driver
    struct TestDriver {
        next_out: usize,
        next_in: usize,
    }

    struct TestEndpoint(EndpointInfo);
    struct TestBus;
    struct TestControlPipe;

    impl TestDriver {
        fn new(first_endpoint: usize) -> Self {
            Self {
                next_out: first_endpoint,
                next_in: first_endpoint,
            }
        }

        fn endpoint(
            index: &mut usize,
            direction: Direction,
            ep_type: EndpointType,
            max_packet_size: u16,
            interval_ms: u8,
        ) -> TestEndpoint {
            let addr = EndpointAddress::from_parts(*index, direction);
            *index += 1;
            TestEndpoint(EndpointInfo {
                addr,
                ep_type,
                max_packet_size,
                interval_ms,
            })
        }
    }

    impl<'a> Driver<'a> for TestDriver {
        type EndpointOut = TestEndpoint;
        type EndpointIn = TestEndpoint;
        type ControlPipe = TestControlPipe;
        type Bus = TestBus;

        fn alloc_endpoint_out(
            &mut self,
            ep_type: EndpointType,
            max_packet_size: u16,
            interval_ms: u8,
        ) -> Result<TestEndpoint, EndpointAllocError> {
            Ok(Self::endpoint(
                &mut self.next_out,
                Direction::Out,
                ep_type,
                max_packet_size,
                interval_ms,
            ))
        }

        fn alloc_endpoint_in(
            &mut self,
            ep_type: EndpointType,
            max_packet_size: u16,
            interval_ms: u8,
        ) -> Result<TestEndpoint, EndpointAllocError> {
            Ok(Self::endpoint(
                &mut self.next_in,
                Direction::In,
                ep_type,
                max_packet_size,
                interval_ms,
            ))
        }

        fn start(self, _control_max_packet_size: u16) -> (TestBus, TestControlPipe) {
            (TestBus, TestControlPipe)
        }
    }

    impl Endpoint for TestEndpoint {
        fn info(&self) -> &EndpointInfo {
            &self.0
        }

        async fn wait_enabled(&mut self) {}
    }

    impl EndpointOut for TestEndpoint {
        async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, EndpointError> {
            Err(EndpointError::Disabled)
        }
    }

    impl EndpointIn for TestEndpoint {
        async fn write(&mut self, _buf: &[u8]) -> Result<(), EndpointError> {
            Err(EndpointError::Disabled)
        }
    }

    impl Bus for TestBus {
        async fn enable(&mut self) {}

        async fn disable(&mut self) {}

        async fn poll(&mut self) -> Event {
            core::future::pending().await
        }

        fn endpoint_set_enabled(&mut self, _ep_addr: EndpointAddress, _enabled: bool) {}

        fn endpoint_set_stalled(&mut self, _ep_addr: EndpointAddress, _stalled: bool) {}

        fn endpoint_is_stalled(&mut self, _ep_addr: EndpointAddress) -> bool {
            false
        }

        async fn remote_wakeup(&mut self) -> Result<(), Unsupported> {
            Err(Unsupported)
        }
    }

    impl ControlPipe for TestControlPipe {
        fn max_packet_size(&self) -> usize {
            64
        }

        async fn setup(&mut self) -> [u8; 8] {
            core::future::pending().await
        }

        async fn data_out(
            &mut self,
            _buf: &mut [u8],
            _first: bool,
            _last: bool,
        ) -> Result<usize, EndpointError> {
            Err(EndpointError::Disabled)
        }

        async fn data_in(
            &mut self,
            _data: &[u8],
            _first: bool,
            _last: bool,
        ) -> Result<(), EndpointError> {
            Err(EndpointError::Disabled)
        }

        async fn accept(&mut self) {}

        async fn reject(&mut self) {}

        async fn accept_set_address(&mut self, _addr: u8) {}
    }

    struct Rendered {
        device: Vec<u8>,
        configuration: Vec<u8>,
    }

    /// Builds the device the way the firmware does and returns the descriptors embassy-usb
    /// would send to the host
    fn render(driver: TestDriver) -> Result<Rendered, InstallError> {
        let installed = install(&DriverConfig::printer())?;

        let mut device_descriptor = [0u8; 256];
        let mut config_descriptor = [0u8; 256];
        let mut bos_descriptor = [0u8; 256];
        let mut msos_descriptor = [0u8; 0];
        let mut control_buf = [0u8; 64];

        let (device_len, config_len) = {
            let mut builder = Builder::new(
                driver,
                usb_config(&installed),
                &mut device_descriptor,
                &mut config_descriptor,
                &mut bos_descriptor,
                &mut msos_descriptor,
                &mut control_buf,
            );
            add_printer_function(&mut builder, &installed)?;

            let usage = builder.build().buffer_usage();
            (usage.device_descriptor_used, usage.config_descriptor_used)
        };

        Ok(Rendered {
            device: device_descriptor[..device_len].to_vec(),
            configuration: config_descriptor[..config_len].to_vec(),
        })
    }

    #[test]
    fn test_configuration_descriptor_is_served_verbatim() {
        let rendered = render(TestDriver::new(1)).unwrap();

        assert_eq!(rendered.configuration, CONFIGURATION_DESCRIPTOR);
    }

    #[test]
    fn test_device_descriptor_differs_in_bcd_usb_only() {
        let rendered = render(TestDriver::new(1)).unwrap();

        let mut expected = DEVICE_DESCRIPTOR_BYTES;
        expected[2..4].copy_from_slice(&EMBASSY_BCD_USB.to_le_bytes());
        assert_eq!(rendered.device, expected);

        assert_eq!(&DEVICE_DESCRIPTOR_BYTES[2..4], &[0x00, 0x02]);
    }

    #[test]
    fn test_endpoint_mismatch() {
        // a driver that would put the printer on endpoint 2
        assert_eq!(
            render(TestDriver::new(2)).err(),
            Some(InstallError::EndpointMismatch {
                expected: 0x01,
                allocated: 0x02
            })
        );
    }

    #[test]
    fn test_config_mapping() {
        let installed = install(&DriverConfig::printer()).unwrap();
        let config = usb_config(&installed);

        assert_eq!((config.vendor_id, config.product_id), (0xCAFE, 0x4000));
        assert_eq!(config.product, Some("TinyUSB Printer"));
        assert_eq!(config.max_power, 100);
        assert!(!config.composite_with_iads);
    }
}
