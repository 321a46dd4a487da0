#![no_std]

use defmt_or_log::*;
#[allow(unused_imports)]
use {defmt_rtt as _, panic_probe as _};

mod tasks;

use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::usb::Driver as UsbDriver;
use usb_printer_shared::{DriverConfig, InstallError};

bind_interrupts!(struct UsbIrqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<embassy_rp::peripherals::USB>;
});

/// Brings the printer up. Returns once the USB tasks are spawned; from then on everything is
/// driven by the executor. An installation failure is returned as is, there's no retry.
pub async fn main(spawner: Spawner) -> Result<(), InstallError> {
    info!("USB printer is booting up");

    let p = embassy_rp::init(Default::default());

    let usb_driver = UsbDriver::new(p.USB, UsbIrqs);

    tasks::usb::run(&spawner, usb_driver, &DriverConfig::printer())
}
