use defmt_or_log::*;

use embassy_executor::Spawner;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::{Driver, Endpoint as RpEndpoint, Out};
use embassy_usb::driver::{Endpoint, EndpointError, EndpointOut};
use embassy_usb::Builder;
use usb_printer_shared::usb_builder::{add_printer_function, PrinterEndpoints};
use usb_printer_shared::{InstallError, Installed, LogPrinter, PrinterInterface, MAX_PACKET_SIZE};

#[embassy_executor::task]
async fn printer_out_task(
    mut endpoint_out: RpEndpoint<'static, USB, Out>,
    printer: PrinterInterface<'static, LogPrinter>,
) {
    let mut usb_buf = [0u8; MAX_PACKET_SIZE as usize];

    // the interface is initialized once, on the first activation. Later reconfigurations only
    // restart the OUT loop
    endpoint_out.wait_enabled().await;
    printer.enable();

    loop {
        info!("Starting printer OUT loop");
        loop {
            match endpoint_out.read(&mut usb_buf).await {
                Ok(usb_len) => {
                    debug!("Received a USB packet ({} bytes)", usb_len);
                    printer.receive(&usb_buf[..usb_len]);
                }
                Err(EndpointError::BufferOverflow) => {
                    error!("The host sent a packet larger than {} bytes", usb_buf.len());
                }
                Err(EndpointError::Disabled) => {
                    info!("The printer interface is disabled");
                    break;
                }
            }
        }

        endpoint_out.wait_enabled().await;
    }
}

pub struct PreparedUsb {
    endpoint_out: RpEndpoint<'static, USB, Out>,
    printer: PrinterInterface<'static, LogPrinter>,
}

pub fn init_usb(
    builder: &mut Builder<'static, Driver<'static, USB>>,
    installed: &Installed<'static>,
    handler: &'static LogPrinter,
) -> Result<PreparedUsb, InstallError> {
    // the IN endpoint is dropped here, it's never written to
    let PrinterEndpoints { bulk_out, .. } = add_printer_function(builder, installed)?;

    Ok(PreparedUsb {
        endpoint_out: bulk_out,
        printer: installed.bind(handler),
    })
}

pub fn run(
    spawner: &Spawner,
    PreparedUsb {
        endpoint_out,
        printer,
    }: PreparedUsb,
) {
    spawner.must_spawn(printer_out_task(endpoint_out, printer));
}
