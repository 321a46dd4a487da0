#![no_std]
#![no_main]

use defmt_or_log::*;
use embassy_executor::Spawner;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    if let Err(e) = usb_printer_firmware::main(spawner).await {
        // nothing was spawned, the executor is left idle
        error!("USB installation failed, the printer is not available: {}", e);
    }
}
