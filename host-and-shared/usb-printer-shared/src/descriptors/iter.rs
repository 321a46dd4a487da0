use super::DescriptorError;

/// Iterates over a list of concatenated USB descriptors in binary form, yielding
/// `(bDescriptorType, descriptor bytes)`.
///
/// Stops after the first error.
pub struct DescriptorIter<'a> {
    data: &'a [u8],
    failed: bool,
}

impl<'a> DescriptorIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            failed: false,
        }
    }

    fn next_impl(&mut self) -> Result<Option<(u8, &'a [u8])>, DescriptorError> {
        if self.data.is_empty() {
            return Ok(None);
        }

        // First two bytes of all descriptor types are the same
        if self.data.len() < 2 {
            return Err(DescriptorError::TooShort);
        }

        let len = self.data[0] as usize;
        let raw_type = self.data[1];

        // a zero bLength would never advance
        if len == 0 {
            return Err(DescriptorError::ZeroLength);
        }
        if len < 2 {
            return Err(DescriptorError::TooShort);
        }
        if self.data.len() < len {
            return Err(DescriptorError::Overflow);
        }

        let (raw_desc, rest) = self.data.split_at(len);
        self.data = rest;

        Ok(Some((raw_type, raw_desc)))
    }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Result<(u8, &'a [u8]), DescriptorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_impl() {
            Ok(v) => v.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{descriptor_type, CONFIGURATION_DESCRIPTOR};

    #[test]
    fn test_walks_configuration() {
        let types = DescriptorIter::new(&CONFIGURATION_DESCRIPTOR)
            .map(|r| r.map(|(ty, bytes)| (ty, bytes.len())))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(
            types,
            vec![
                (descriptor_type::CONFIGURATION, 9),
                (descriptor_type::INTERFACE, 9),
                (descriptor_type::ENDPOINT, 7),
                (descriptor_type::ENDPOINT, 7),
            ]
        );
    }

    #[test]
    fn test_zero_length_stops() {
        let mut iter = DescriptorIter::new(&[0x00, 0x04, 0x09, 0x04]);
        assert_eq!(iter.next(), Some(Err(DescriptorError::ZeroLength)));
        assert_eq!(iter.next(), None, "iteration must stop after an error");
    }

    #[test]
    fn test_truncated() {
        let truncated = &CONFIGURATION_DESCRIPTOR[..CONFIGURATION_DESCRIPTOR.len() - 3];
        let last = DescriptorIter::new(truncated).last();
        assert_eq!(last, Some(Err(DescriptorError::Overflow)));

        let mut iter = DescriptorIter::new(&[0x09]);
        assert_eq!(iter.next(), Some(Err(DescriptorError::TooShort)));
    }
}
