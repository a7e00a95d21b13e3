use super::number::encode_number;
use super::string::{encode_ansi, encode_string};
use super::{DataError, CHAR_MAX, INT_MAX, SHORT_MAX, THREE_MAX};

/// An append-only buffer for writing EO data.
///
/// `EoWriter` features a string sanitization mode: while it is enabled, any
/// `0xFF` byte in a string body is rewritten to `0x79` (`'y'`) before being
/// appended, so that no stray chunk delimiter can land inside a string.
/// Sanitization happens before encoded strings are scrambled and never
/// touches padding bytes.
#[derive(Clone, Debug, Default)]
pub struct EoWriter {
    data: Vec<u8>,
    string_sanitization_mode: bool,
}

impl EoWriter {
    /// Creates a new, empty `EoWriter`.
    pub fn new() -> Self {
        EoWriter::default()
    }

    /// Adds a raw byte to the writer data.
    pub fn add_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Adds raw bytes to the writer data.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Adds an encoded 1-byte integer to the writer data.
    ///
    /// Fails if the value is not below [`CHAR_MAX`].
    pub fn add_char(&mut self, number: u32) -> Result<(), DataError> {
        Self::check_number_size(number, CHAR_MAX - 1)?;
        let number_bytes = encode_number(number);
        self.data.extend_from_slice(&number_bytes[..1]);
        Ok(())
    }

    /// Adds an encoded 2-byte integer to the writer data.
    ///
    /// Fails if the value is not below [`SHORT_MAX`].
    pub fn add_short(&mut self, number: u32) -> Result<(), DataError> {
        Self::check_number_size(number, SHORT_MAX - 1)?;
        let number_bytes = encode_number(number);
        self.data.extend_from_slice(&number_bytes[..2]);
        Ok(())
    }

    /// Adds an encoded 3-byte integer to the writer data.
    ///
    /// Fails if the value is not below [`THREE_MAX`].
    pub fn add_three(&mut self, number: u32) -> Result<(), DataError> {
        Self::check_number_size(number, THREE_MAX - 1)?;
        let number_bytes = encode_number(number);
        self.data.extend_from_slice(&number_bytes[..3]);
        Ok(())
    }

    /// Adds an encoded 4-byte integer to the writer data.
    ///
    /// Fails if the value is not below [`INT_MAX`].
    pub fn add_int(&mut self, number: u32) -> Result<(), DataError> {
        Self::check_number_size(number, (INT_MAX - 1) as u32)?;
        let number_bytes = encode_number(number);
        self.data.extend_from_slice(&number_bytes[..4]);
        Ok(())
    }

    /// Adds a string to the writer data.
    pub fn add_string(&mut self, string: &str) {
        let mut string_bytes = encode_ansi(string);
        self.sanitize_string(&mut string_bytes);
        self.data.extend_from_slice(&string_bytes);
    }

    /// Adds a fixed-length string to the writer data.
    ///
    /// If `padded` is true, the string may be shorter than `length` and is
    /// padded to it with trailing `0xFF` bytes; otherwise its length must
    /// match exactly.
    pub fn add_fixed_string(
        &mut self,
        string: &str,
        length: usize,
        padded: bool,
    ) -> Result<(), DataError> {
        Self::check_string_length(string, length, padded)?;
        let mut string_bytes = encode_ansi(string);
        self.sanitize_string(&mut string_bytes);
        if padded {
            Self::add_padding(&mut string_bytes, length);
        }
        self.data.extend_from_slice(&string_bytes);
        Ok(())
    }

    /// Adds an encoded string to the writer data.
    pub fn add_encoded_string(&mut self, string: &str) {
        let mut string_bytes = encode_ansi(string);
        self.sanitize_string(&mut string_bytes);
        encode_string(&mut string_bytes);
        self.data.extend_from_slice(&string_bytes);
    }

    /// Adds a fixed-length encoded string to the writer data.
    ///
    /// If `padded` is true, the string may be shorter than `length` and is
    /// padded to it with trailing `0xFF` bytes before encoding; otherwise its
    /// length must match exactly.
    pub fn add_fixed_encoded_string(
        &mut self,
        string: &str,
        length: usize,
        padded: bool,
    ) -> Result<(), DataError> {
        Self::check_string_length(string, length, padded)?;
        let mut string_bytes = encode_ansi(string);
        self.sanitize_string(&mut string_bytes);
        if padded {
            Self::add_padding(&mut string_bytes, length);
        }
        encode_string(&mut string_bytes);
        self.data.extend_from_slice(&string_bytes);
        Ok(())
    }

    /// Returns true if string sanitization mode is enabled.
    pub fn string_sanitization_mode(&self) -> bool {
        self.string_sanitization_mode
    }

    /// Enables or disables string sanitization mode.
    pub fn set_string_sanitization_mode(&mut self, string_sanitization_mode: bool) {
        self.string_sanitization_mode = string_sanitization_mode;
    }

    /// Returns the length of the writer data.
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// Consumes the writer and returns the written data.
    pub fn to_byte_array(self) -> Vec<u8> {
        self.data
    }

    /// Returns the written data as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn sanitize_string(&self, bytes: &mut [u8]) {
        if self.string_sanitization_mode {
            for byte in bytes.iter_mut() {
                if *byte == 0xFF {
                    *byte = 0x79; // 'ÿ' -> 'y'
                }
            }
        }
    }

    fn check_number_size(number: u32, max_value: u32) -> Result<(), DataError> {
        if number > max_value {
            return Err(DataError::ValueOutOfBounds {
                value: number,
                max: max_value,
            });
        }
        Ok(())
    }

    fn add_padding(bytes: &mut Vec<u8>, length: usize) {
        bytes.resize(length, 0xFF);
    }

    fn check_string_length(string: &str, length: usize, padded: bool) -> Result<(), DataError> {
        let string_length = encode_ansi(string).len();

        if padded {
            if length >= string_length {
                return Ok(());
            }
            return Err(DataError::StringTooLong {
                string: string.to_owned(),
                length,
            });
        }

        if string_length != length {
            return Err(DataError::StringLengthMismatch {
                string: string.to_owned(),
                length,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_byte() {
        let mut writer = EoWriter::new();
        writer.add_byte(0x00);
        assert_eq!(writer.to_byte_array(), [0x00]);
    }

    #[test]
    fn add_bytes() {
        let mut writer = EoWriter::new();
        writer.add_bytes(&[0x00, 0xFF]);
        assert_eq!(writer.to_byte_array(), [0x00, 0xFF]);
    }

    #[test]
    fn add_char() {
        let mut writer = EoWriter::new();
        writer.add_char(123).unwrap();
        assert_eq!(writer.to_byte_array(), [0x7C]);
    }

    #[test]
    fn add_short() {
        let mut writer = EoWriter::new();
        writer.add_short(12345).unwrap();
        assert_eq!(writer.to_byte_array(), [0xCA, 0x31]);
    }

    #[test]
    fn add_three() {
        let mut writer = EoWriter::new();
        writer.add_three(10_000_000).unwrap();
        assert_eq!(writer.to_byte_array(), [0xB0, 0x3A, 0x9D]);
    }

    #[test]
    fn add_int() {
        let mut writer = EoWriter::new();
        writer.add_int(2_048_576_040).unwrap();
        assert_eq!(writer.to_byte_array(), [0x7F, 0x7F, 0x7F, 0x7F]);
    }

    #[test]
    fn add_string() {
        let mut writer = EoWriter::new();
        writer.add_string("foo");
        assert_eq!(writer.to_byte_array(), b"foo");
    }

    #[test]
    fn add_fixed_string() {
        let mut writer = EoWriter::new();
        writer.add_fixed_string("bar", 3, false).unwrap();
        assert_eq!(writer.to_byte_array(), b"bar");
    }

    #[test]
    fn add_padded_fixed_string() {
        let mut writer = EoWriter::new();
        writer.add_fixed_string("bar", 6, true).unwrap();
        assert_eq!(writer.to_byte_array(), b"bar\xFF\xFF\xFF");
    }

    #[test]
    fn add_padded_with_perfect_fit_fixed_string() {
        let mut writer = EoWriter::new();
        writer.add_fixed_string("bar", 3, true).unwrap();
        assert_eq!(writer.to_byte_array(), b"bar");
    }

    #[test]
    fn add_encoded_string() {
        let mut writer = EoWriter::new();
        writer.add_encoded_string("foo");
        assert_eq!(writer.to_byte_array(), b"^0g");
    }

    #[test]
    fn add_fixed_encoded_string() {
        let mut writer = EoWriter::new();
        writer.add_fixed_encoded_string("bar", 3, false).unwrap();
        assert_eq!(writer.to_byte_array(), b"[>k");
    }

    #[test]
    fn add_padded_fixed_encoded_string() {
        let mut writer = EoWriter::new();
        writer.add_fixed_encoded_string("bar", 6, true).unwrap();
        assert_eq!(writer.to_byte_array(), b"\xFF\xFF\xFF-l=");
    }

    #[test]
    fn add_padded_with_perfect_fit_fixed_encoded_string() {
        let mut writer = EoWriter::new();
        writer.add_fixed_encoded_string("bar", 3, true).unwrap();
        assert_eq!(writer.to_byte_array(), b"[>k");
    }

    #[test]
    fn add_sanitized_string() {
        let mut writer = EoWriter::new();
        writer.set_string_sanitization_mode(true);
        writer.add_string("aÿz");
        assert_eq!(writer.to_byte_array(), b"ayz");
    }

    #[test]
    fn add_sanitized_fixed_string() {
        let mut writer = EoWriter::new();
        writer.set_string_sanitization_mode(true);
        writer.add_fixed_string("aÿz", 3, false).unwrap();
        assert_eq!(writer.to_byte_array(), b"ayz");
    }

    #[test]
    fn add_sanitized_padded_fixed_string() {
        // Padding bytes must survive sanitization.
        let mut writer = EoWriter::new();
        writer.set_string_sanitization_mode(true);
        writer.add_fixed_string("aÿz", 6, true).unwrap();
        assert_eq!(writer.to_byte_array(), b"ayz\xFF\xFF\xFF");
    }

    #[test]
    fn add_sanitized_encoded_string() {
        let mut writer = EoWriter::new();
        writer.set_string_sanitization_mode(true);
        writer.add_encoded_string("aÿz");
        assert_eq!(writer.to_byte_array(), b"S&l");
    }

    #[test]
    fn add_sanitized_padded_fixed_encoded_string() {
        let mut writer = EoWriter::new();
        writer.set_string_sanitization_mode(true);
        writer.add_fixed_encoded_string("aÿz", 6, true).unwrap();
        assert_eq!(writer.to_byte_array(), b"\xFF\xFF\xFF%T>");
    }

    #[test]
    fn add_numbers_exceeding_max() {
        let mut writer = EoWriter::new();
        assert_eq!(
            writer.add_char(253),
            Err(DataError::ValueOutOfBounds {
                value: 253,
                max: 252
            })
        );
        assert!(writer.add_short(64009).is_err());
        assert!(writer.add_three(16_194_277).is_err());
        assert!(writer.add_int(4_097_152_081).is_err());
        assert_eq!(writer.length(), 0);
    }

    #[test]
    fn add_fixed_string_with_incorrect_length() {
        let mut writer = EoWriter::new();
        assert!(writer.add_fixed_string("bar", 2, false).is_err());
        assert!(writer.add_fixed_string("bar", 4, false).is_err());
        assert!(writer.add_fixed_string("bar", 2, true).is_err());
        assert!(writer.add_fixed_encoded_string("bar", 2, false).is_err());
        assert!(writer.add_fixed_encoded_string("bar", 4, false).is_err());
        assert!(writer.add_fixed_encoded_string("bar", 2, true).is_err());
    }

    #[test]
    fn length() {
        let mut writer = EoWriter::new();
        assert_eq!(writer.length(), 0);

        writer.add_string("Lorem ipsum dolor sit amet");
        assert_eq!(writer.length(), 26);

        for i in 0..27 {
            writer.add_byte(i);
        }
        assert_eq!(writer.length(), 53);
    }
}
