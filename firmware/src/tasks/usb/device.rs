use defmt_or_log::*;

use embassy_executor::Spawner;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::{Builder, UsbDevice};
use usb_printer_shared::Installed;

#[embassy_executor::task]
async fn device_task(mut device: UsbDevice<'static, Driver<'static, USB>>) {
    info!("Starting USB device task");

    // enumeration, standard requests and endpoint plumbing all happen in here
    device.run().await
}

pub fn run(
    spawner: &Spawner,
    builder: Builder<'static, Driver<'static, USB>>,
    installed: &Installed<'static>,
) {
    let device = builder.build();

    info!(
        "Presenting as 0x{:X}:0x{:X} ({:?})",
        installed.device.vendor_id,
        installed.device.product_id,
        installed.string(installed.device.product_index)
    );

    spawner.must_spawn(device_task(device));
}
