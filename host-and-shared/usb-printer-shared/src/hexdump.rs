use core::fmt;

pub const BYTES_PER_LINE: usize = 16;

/// "0x" + 8 offset digits, 16 "xx " groups with an extra gap in the middle, two |s and the
/// ASCII column, with some slack
pub const LINE_CAPACITY: usize = 96;

/// Splits a buffer into 16-byte lines rendered as
/// `0x00000010   48 65 6c 6c 6f 20 77 6f  72 6c 64 0a 00 01 02 03  |Hello world.....|`
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a> {
    data: &'a [u8],
}

impl<'a> HexDump<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn lines(&self) -> impl Iterator<Item = HexLine<'a>> {
        self.data
            .chunks(BYTES_PER_LINE)
            .enumerate()
            .map(|(i, bytes)| HexLine {
                offset: i * BYTES_PER_LINE,
                bytes,
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HexLine<'a> {
    pub offset: usize,
    pub bytes: &'a [u8],
}

impl HexLine<'_> {
    /// Renders the line into a fixed-capacity string, so it can be logged with either defmt or
    /// log as a plain `str`
    pub fn render(&self) -> heapless::String<LINE_CAPACITY> {
        use core::fmt::Write;

        let mut line = heapless::String::new();
        write!(&mut line, "{}", self)
            .expect("The string is appropriately sized and the write shouldn't fail");
        line
    }
}

impl fmt::Display for HexLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}  ", self.offset)?;

        for i in 0..BYTES_PER_LINE {
            if i == BYTES_PER_LINE / 2 {
                f.write_str(" ")?;
            }
            match self.bytes.get(i) {
                Some(b) => write!(f, " {b:02x}")?,
                None => f.write_str("   ")?,
            }
        }

        f.write_str("  |")?;
        for &b in self.bytes {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        f.write_str("|")
    }
}
