//! Printer interface callbacks.

use crate::control::{ControlRequest, ControlStage};
use crate::hexdump::HexDump;
use defmt_or_log::{debug, info};

/// Events the USB stack raises for the printer interface. Implementations are shared between
/// the control pipe and the bulk OUT task, hence `&self` everywhere and `Sync`.
pub trait PrinterHandler: Sync {
    /// Class-specific control request. Returning `true` accepts the request, `false` stalls it.
    fn control_xfer(&self, stage: ControlStage, request: &ControlRequest) -> bool;

    /// Print data arrived on the bulk OUT endpoint. Returns the number of bytes consumed.
    fn write(&self, data: &[u8]) -> usize;

    /// The printer interface became active.
    fn init(&self);
}

/// Logs everything it receives and accepts every control request without looking at it.
/// There is no print-command interpretation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPrinter;

impl PrinterHandler for LogPrinter {
    fn control_xfer(&self, stage: ControlStage, request: &ControlRequest) -> bool {
        debug!(
            "Printer control request {} ({:?}) at stage {:?}",
            request.request,
            request.printer_request(),
            stage
        );
        true
    }

    fn write(&self, data: &[u8]) -> usize {
        info!("Received print data of size {}", data.len());

        for line in HexDump::new(data).lines() {
            info!("{}", line.render().as_str());
        }

        data.len()
    }

    fn init(&self) {
        info!("Printer interface initialized");
    }
}
