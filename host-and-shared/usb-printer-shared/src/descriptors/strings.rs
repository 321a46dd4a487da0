use super::descriptor_type;

/// English (United States)
pub const LANGUAGE_ID_EN_US: u16 = 0x0409;

pub const MANUFACTURER_INDEX: u8 = 1;
pub const PRODUCT_INDEX: u8 = 2;
pub const SERIAL_NUMBER_INDEX: u8 = 3;

// bLength is a u8, so at most (255 - 2) / 2 UTF-16 code units fit
const MAX_CODE_UNITS: usize = 126;

/// String descriptors, indexed the same way the device descriptor references them.
/// Index 0 is the list of supported languages, so `strings[0]` is descriptor index 1.
#[derive(Debug, Clone, Copy)]
pub struct StringTable {
    pub language_id: u16,
    pub strings: &'static [&'static str],
}

pub static STRINGS: StringTable = StringTable {
    language_id: LANGUAGE_ID_EN_US,
    strings: &[
        // 1: Manufacturer
        "TinyUSB",
        // 2: Product
        "TinyUSB Printer",
        // 3: Serial
        "123456",
    ],
};

impl StringTable {
    pub fn get(&self, index: u8) -> Option<&'static str> {
        match index {
            0 => None,
            i => self.strings.get(i as usize - 1).copied(),
        }
    }

    /// Renders the string descriptor the host receives for `index`, returning the number of
    /// bytes written. Strings that don't fit into `bLength` or `buf` are truncated.
    pub fn encode(&self, index: u8, language_id: u16, buf: &mut [u8]) -> Option<usize> {
        if index == 0 {
            let lang = self.language_id.to_le_bytes();
            let descriptor = [4, descriptor_type::STRING, lang[0], lang[1]];
            let len = descriptor.len().min(buf.len());
            buf[..len].copy_from_slice(&descriptor[..len]);
            return Some(len);
        }

        // some hosts ask with language 0 before reading the language list
        if language_id != self.language_id && language_id != 0 {
            return None;
        }

        let string = self.get(index)?;
        if buf.len() < 2 {
            return None;
        }

        let max_units = MAX_CODE_UNITS.min((buf.len() - 2) / 2);
        let mut written = 2;
        for unit in string.encode_utf16().take(max_units) {
            buf[written..written + 2].copy_from_slice(&unit.to_le_bytes());
            written += 2;
        }

        buf[0] = written as u8;
        buf[1] = descriptor_type::STRING;

        Some(written)
    }
}
