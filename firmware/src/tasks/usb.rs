use defmt_or_log::*;

use embassy_executor::Spawner;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::Builder;
use static_cell::ConstStaticCell;
use usb_printer_shared::usb_builder::usb_config;
use usb_printer_shared::{install, DriverConfig, InstallError, Installed, LogPrinter};

mod control;
mod device;
mod printer;

/// Stateless, so a single static instance serves both the control pipe and the OUT task
static PRINTER: LogPrinter = LogPrinter;

/// embassy-usb renders the descriptors itself from the config, the interface and endpoints
/// are added by `printer::init_usb`.
pub fn init_usb<'d, D: embassy_usb::driver::Driver<'d>>(
    driver: D,
    installed: &Installed<'static>,
) -> Builder<'d, D> {
    let config = usb_config(installed);

    // Embassy's USB needs a bunch of buffers. ConstStaticCell guarantees those arrays
    // are completely static and are never on the stack
    static DEVICE_DESCRIPTOR: ConstStaticCell<[u8; 256]> = ConstStaticCell::new([0; 256]);
    static CONFIG_DESCRIPTOR: ConstStaticCell<[u8; 256]> = ConstStaticCell::new([0; 256]);
    static BOS_DESCRIPTOR: ConstStaticCell<[u8; 256]> = ConstStaticCell::new([0; 256]);
    // no Microsoft OS descriptors, the printer class driver is built into every OS
    static MSOS_DESCRIPTOR: ConstStaticCell<[u8; 0]> = ConstStaticCell::new([]);
    static CONTROL_BUF: ConstStaticCell<[u8; 64]> = ConstStaticCell::new([0; 64]);

    let device_descriptor: &'static mut [u8; 256] = DEVICE_DESCRIPTOR.take();
    let config_descriptor: &'static mut [u8; 256] = CONFIG_DESCRIPTOR.take();
    let bos_descriptor: &'static mut [u8; 256] = BOS_DESCRIPTOR.take();
    let msos_descriptor: &'static mut [u8; 0] = MSOS_DESCRIPTOR.take();
    let control_buf: &'static mut [u8; 64] = CONTROL_BUF.take();

    Builder::new(
        driver,
        config,
        device_descriptor,
        config_descriptor,
        bos_descriptor,
        msos_descriptor,
        control_buf,
    )
}

/// Installs the USB stack from `driver_config` and spawns the USB tasks. Nothing is spawned
/// if the installation fails.
pub fn run(
    spawner: &Spawner,
    driver: Driver<'static, USB>,
    driver_config: &DriverConfig<'static>,
) -> Result<(), InstallError> {
    info!("USB initialization");

    let installed = install(driver_config)?;

    let mut builder = init_usb(driver, &installed);

    let printer_usb = printer::init_usb(&mut builder, &installed, &PRINTER)?;
    control::init_usb(&mut builder, &installed, &PRINTER);

    device::run(spawner, builder, &installed);
    printer::run(spawner, printer_usb);

    info!("USB Printer initialization DONE");

    Ok(())
}
