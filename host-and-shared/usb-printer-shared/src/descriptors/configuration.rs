use super::{descriptor_type, transfer_type, DescriptorError, DescriptorIter, ENDPOINT_DIR_IN};

const CONFIGURATION_LEN: usize = 9;
const INTERFACE_LEN: usize = 9;
const ENDPOINT_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointSummary {
    /// bEndpointAddress, including the direction bit
    pub address: u8,
    pub max_packet_size: u16,
}

/// What the stack needs to know about a configuration descriptor: its attributes and the
/// first interface with its bulk endpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationSummary {
    pub configuration_value: u8,
    pub num_interfaces: u8,
    pub self_powered: bool,
    pub remote_wakeup: bool,
    /// bMaxPower converted to mA
    pub max_power_ma: u16,
    pub interface_number: u8,
    pub interface_class: u8,
    pub interface_sub_class: u8,
    pub interface_protocol: u8,
    pub bulk_out: Option<EndpointSummary>,
    pub bulk_in: Option<EndpointSummary>,
}

struct OpenInterface {
    number: u8,
    declared_endpoints: u8,
    seen_endpoints: u8,
}

impl OpenInterface {
    fn close(self) -> Result<(), DescriptorError> {
        if self.declared_endpoints != self.seen_endpoints {
            return Err(DescriptorError::EndpointCountMismatch {
                interface: self.number,
                declared: self.declared_endpoints,
                actual: self.seen_endpoints,
            });
        }
        Ok(())
    }
}

fn expect_len(bytes: &[u8], len: usize) -> Result<(), DescriptorError> {
    if bytes.len() < len {
        return Err(DescriptorError::TooShort);
    }
    Ok(())
}

/// Walks a full configuration descriptor (configuration, interfaces, endpoints and any
/// class-specific descriptors in between) and checks that the header counts match the content.
pub fn validate_configuration(bytes: &[u8]) -> Result<ConfigurationSummary, DescriptorError> {
    let mut iter = DescriptorIter::new(bytes);

    let header = match iter.next() {
        None => return Err(DescriptorError::TooShort),
        Some(header) => header?,
    };

    let (raw_type, header) = header;
    if raw_type != descriptor_type::CONFIGURATION {
        return Err(DescriptorError::UnexpectedType {
            expected: descriptor_type::CONFIGURATION,
            found: raw_type,
        });
    }
    expect_len(header, CONFIGURATION_LEN)?;

    let declared_total = u16::from_le_bytes([header[2], header[3]]);
    if declared_total as usize != bytes.len() {
        return Err(DescriptorError::TotalLengthMismatch {
            declared: declared_total,
            actual: bytes.len(),
        });
    }

    let attributes = header[7];
    let mut summary = ConfigurationSummary {
        configuration_value: header[5],
        num_interfaces: header[4],
        self_powered: attributes & 0x40 != 0,
        remote_wakeup: attributes & 0x20 != 0,
        max_power_ma: header[8] as u16 * 2,
        interface_number: 0,
        interface_class: 0,
        interface_sub_class: 0,
        interface_protocol: 0,
        bulk_out: None,
        bulk_in: None,
    };

    let mut interfaces_seen: u8 = 0;
    let mut open: Option<OpenInterface> = None;

    for descriptor in iter {
        let (raw_type, desc) = descriptor?;

        match raw_type {
            descriptor_type::INTERFACE => {
                expect_len(desc, INTERFACE_LEN)?;

                if let Some(previous) = open.take() {
                    previous.close()?;
                }

                let number = desc[2];
                let alt_setting = desc[3];

                // alternate settings share the interface number and don't count towards
                // bNumInterfaces
                if alt_setting == 0 {
                    if interfaces_seen == 0 {
                        summary.interface_number = number;
                        summary.interface_class = desc[5];
                        summary.interface_sub_class = desc[6];
                        summary.interface_protocol = desc[7];
                    }
                    interfaces_seen = interfaces_seen.saturating_add(1);
                }

                open = Some(OpenInterface {
                    number,
                    declared_endpoints: desc[4],
                    seen_endpoints: 0,
                });
            }
            descriptor_type::ENDPOINT => {
                expect_len(desc, ENDPOINT_LEN)?;

                let Some(interface) = open.as_mut() else {
                    return Err(DescriptorError::UnexpectedType {
                        expected: descriptor_type::INTERFACE,
                        found: raw_type,
                    });
                };
                interface.seen_endpoints = interface.seen_endpoints.saturating_add(1);

                let is_first_interface = interface.number == summary.interface_number;
                let is_bulk = desc[3] & transfer_type::MASK == transfer_type::BULK;
                if is_first_interface && is_bulk {
                    let endpoint = EndpointSummary {
                        address: desc[2],
                        max_packet_size: u16::from_le_bytes([desc[4], desc[5]]),
                    };
                    let slot = if endpoint.address & ENDPOINT_DIR_IN != 0 {
                        &mut summary.bulk_in
                    } else {
                        &mut summary.bulk_out
                    };
                    slot.get_or_insert(endpoint);
                }
            }
            // class-specific and other descriptors are carried through untouched
            _ => {}
        }
    }

    if let Some(last) = open.take() {
        last.close()?;
    }

    if interfaces_seen != summary.num_interfaces {
        return Err(DescriptorError::InterfaceCountMismatch {
            declared: summary.num_interfaces,
            actual: interfaces_seen,
        });
    }

    Ok(summary)
}
