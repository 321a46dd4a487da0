//! Hardware-in-the-loop check for a flashed printer: finds it on the bus, compares what the OS
//! enumerated with the descriptor tables the firmware is built from, and sends a test page to
//! the bulk OUT endpoint. The page should show up as a hexdump in the device log.

use anyhow::{anyhow, ensure, Context};
use clap::Parser;
use nusb::transfer::EndpointType;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use usb_printer_shared::descriptors::strings::{
    MANUFACTURER_INDEX, PRODUCT_INDEX, SERIAL_NUMBER_INDEX,
};
use usb_printer_shared::descriptors::validate_configuration;
use usb_printer_shared::{CONFIGURATION_DESCRIPTOR, DEVICE_DESCRIPTOR, STRINGS, USB_PID, USB_VID};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Size of the test page sent to the printer, 0 skips sending
    #[arg(long, default_value = "64")]
    payload_size: usize,
    /// How long to wait for the printer to show up, in seconds
    #[arg(long, default_value = "10")]
    wait: u64,
}

async fn find_printer(wait: Duration) -> anyhow::Result<nusb::DeviceInfo> {
    let search = async {
        let mut first_attempt = true;

        loop {
            let mut found = nusb::list_devices()
                .context("listing devices")?
                .filter(|di| di.vendor_id() == USB_VID && di.product_id() == USB_PID)
                .collect::<Vec<_>>();

            if let Some(first) = found.pop() {
                if !found.is_empty() {
                    tracing::warn!("More than one printer detected, using the last one");
                }
                return anyhow::Ok(first);
            }

            if first_attempt {
                tracing::info!("No printer detected, waiting for the device to be connected");
                first_attempt = false;
            }
            sleep(Duration::from_millis(500)).await;
        }
    };

    timeout(wait, search)
        .await
        .map_err(|_| anyhow!("no {USB_VID:04x}:{USB_PID:04x} device appeared in {wait:?}"))?
}

fn check_identity(info: &nusb::DeviceInfo) -> anyhow::Result<()> {
    ensure!(
        info.device_version() == DEVICE_DESCRIPTOR.device_release,
        "bcdDevice is {:#06x}, expected {:#06x}",
        info.device_version(),
        DEVICE_DESCRIPTOR.device_release
    );

    let class = (info.class(), info.subclass(), info.protocol());
    let expected_class = (
        DEVICE_DESCRIPTOR.device_class,
        DEVICE_DESCRIPTOR.device_sub_class,
        DEVICE_DESCRIPTOR.device_protocol,
    );
    ensure!(
        class == expected_class,
        "device class is {class:?}, expected {expected_class:?}"
    );

    for (index, actual) in [
        (MANUFACTURER_INDEX, info.manufacturer_string()),
        (PRODUCT_INDEX, info.product_string()),
        (SERIAL_NUMBER_INDEX, info.serial_number()),
    ] {
        let expected = STRINGS.get(index);
        ensure!(
            actual == expected,
            "string descriptor {index} is {actual:?}, expected {expected:?}"
        );
    }

    tracing::info!("Device descriptor and strings match");
    Ok(())
}

fn check_configuration(device: &nusb::Device) -> anyhow::Result<u8> {
    let expected = validate_configuration(&CONFIGURATION_DESCRIPTOR)
        .map_err(|e| anyhow!("the built-in configuration descriptor is broken: {e}"))?;

    let configuration = device
        .active_configuration()
        .context("reading the active configuration")?;

    ensure!(
        configuration.configuration_value() == expected.configuration_value,
        "configuration value is {}, expected {}",
        configuration.configuration_value(),
        expected.configuration_value
    );

    let alt = configuration
        .interface_alt_settings()
        .find(|alt| alt.interface_number() == expected.interface_number)
        .ok_or_else(|| anyhow!("interface {} is missing", expected.interface_number))?;

    let class = (alt.class(), alt.subclass(), alt.protocol());
    let expected_class = (
        expected.interface_class,
        expected.interface_sub_class,
        expected.interface_protocol,
    );
    ensure!(
        class == expected_class,
        "interface class is {class:?}, expected {expected_class:?}"
    );

    for endpoint in [expected.bulk_out, expected.bulk_in].into_iter().flatten() {
        let actual = alt
            .endpoints()
            .find(|e| e.address() == endpoint.address)
            .ok_or_else(|| anyhow!("endpoint {:#04x} is missing", endpoint.address))?;

        ensure!(
            actual.transfer_type() == EndpointType::Bulk,
            "endpoint {:#04x} is not a bulk endpoint",
            endpoint.address
        );
        ensure!(
            actual.max_packet_size() == endpoint.max_packet_size as usize,
            "endpoint {:#04x} has a max packet size of {}, expected {}",
            endpoint.address,
            actual.max_packet_size(),
            endpoint.max_packet_size
        );
    }

    tracing::info!("Configuration descriptor matches");
    Ok(expected.interface_number)
}

/// Printable ASCII so the device's hexdump is easy to eyeball
fn test_page(size: usize) -> Vec<u8> {
    (b' '..=b'~').cycle().take(size).collect()
}

async fn send_test_page(device: &nusb::Device, interface: u8, size: usize) -> anyhow::Result<()> {
    let bulk_out = validate_configuration(&CONFIGURATION_DESCRIPTOR)
        .ok()
        .and_then(|summary| summary.bulk_out)
        .ok_or_else(|| anyhow!("no bulk OUT endpoint in the configuration"))?;

    let interface = device
        .claim_interface(interface)
        .context("claiming the printer interface")?;

    let completion = interface
        .bulk_out(bulk_out.address, test_page(size))
        .await
        .into_result()
        .context("sending the test page")?;

    ensure!(
        completion.actual_length() == size,
        "the printer accepted {} out of {} bytes",
        completion.actual_length(),
        size
    );

    tracing::info!("Sent a {size} byte test page, check the device log for its hexdump");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let info = find_printer(Duration::from_secs(args.wait)).await?;
    check_identity(&info)?;

    let device = info.open().context("opening the device")?;
    let interface = check_configuration(&device)?;

    if args.payload_size > 0 {
        send_test_page(&device, interface, args.payload_size).await?;
    }

    Ok(())
}
