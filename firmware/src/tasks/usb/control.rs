use defmt_or_log::*;

use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::control::{self, InResponse, OutResponse};
use embassy_usb::driver::Direction as UsbDirection;
use embassy_usb::{Builder, Handler};
use static_cell::StaticCell;
use usb_printer_shared::control::{Direction, Recipient, RequestKind};
use usb_printer_shared::{ControlRequest, ControlStage, Installed, LogPrinter, PrinterInterface};

fn to_control_request(req: &control::Request) -> ControlRequest {
    ControlRequest {
        direction: match req.direction {
            UsbDirection::Out => Direction::Out,
            UsbDirection::In => Direction::In,
        },
        kind: match req.request_type {
            control::RequestType::Standard => RequestKind::Standard,
            control::RequestType::Class => RequestKind::Class,
            control::RequestType::Vendor => RequestKind::Vendor,
            control::RequestType::Reserved => RequestKind::Reserved,
        },
        recipient: match req.recipient {
            control::Recipient::Device => Recipient::Device,
            control::Recipient::Interface => Recipient::Interface,
            control::Recipient::Endpoint => Recipient::Endpoint,
            control::Recipient::Other => Recipient::Other,
            control::Recipient::Reserved => Recipient::Reserved,
        },
        request: req.request,
        value: req.value,
        index: req.index,
        length: req.length,
    }
}

/// Forwards class requests for the printer interface to the printer and logs bus state
/// changes. embassy-usb handles everything else.
struct PrinterControl {
    printer: PrinterInterface<'static, LogPrinter>,
}

impl PrinterControl {
    /// embassy-usb only surfaces a control transfer once its data stage is complete, so the
    /// stages are replayed back to back. The SETUP verdict decides the response.
    fn transfer(&self, request: &ControlRequest, has_data: bool) -> Option<bool> {
        let accepted = self.printer.control(ControlStage::Setup, request)?;

        if accepted {
            if has_data {
                self.printer.control(ControlStage::Data, request);
            }
            self.printer.control(ControlStage::Ack, request);
        }

        Some(accepted)
    }
}

impl Handler for PrinterControl {
    fn enabled(&mut self, enabled: bool) {
        info!("USB device enabled: {}", enabled);
    }

    fn reset(&mut self) {
        info!("USB bus reset");
    }

    fn configured(&mut self, configured: bool) {
        info!("USB device configured: {}", configured);
    }

    fn suspended(&mut self, suspended: bool) {
        debug!("USB device suspended: {}", suspended);
    }

    fn control_out(&mut self, req: control::Request, data: &[u8]) -> Option<OutResponse> {
        let request = to_control_request(&req);

        match self.transfer(&request, !data.is_empty())? {
            true => Some(OutResponse::Accepted),
            false => Some(OutResponse::Rejected),
        }
    }

    fn control_in<'a>(
        &'a mut self,
        req: control::Request,
        buf: &'a mut [u8],
    ) -> Option<InResponse<'a>> {
        let request = to_control_request(&req);

        // accepted IN requests get an empty data stage, there's no device ID or port status
        // to report
        match self.transfer(&request, true)? {
            true => Some(InResponse::Accepted(&buf[..0])),
            false => Some(InResponse::Rejected),
        }
    }
}

pub fn init_usb(
    builder: &mut Builder<'static, Driver<'static, USB>>,
    installed: &Installed<'static>,
    handler: &'static LogPrinter,
) {
    static CONTROL: StaticCell<PrinterControl> = StaticCell::new();

    let control: &'static mut PrinterControl = CONTROL.init(PrinterControl {
        printer: installed.bind(handler),
    });

    builder.handler(control);
}
