use super::number::decode_number;
use super::string::{decode_ansi, decode_string};
use super::DataError;

/// A cursor for reading EO data from a sequence of bytes.
///
/// `EoReader` features a chunked reading mode, which is important for
/// accurate emulation of the official game client. In chunked reading mode,
/// the reader treats `0xFF` bytes as the end of the current chunk, and
/// [`next_chunk`](EoReader::next_chunk) moves to the next one. Reads never
/// advance past the current chunk boundary; over-reads yield zeroes or
/// truncated strings rather than errors, matching the client.
#[derive(Clone, Debug)]
pub struct EoReader<'a> {
    data: &'a [u8],
    position: usize,
    chunked_reading_mode: bool,
    chunk_start: usize,
    next_break: Option<usize>,
}

impl<'a> EoReader<'a> {
    /// Creates a new `EoReader` over the specified data.
    pub fn new(data: &'a [u8]) -> Self {
        EoReader {
            data,
            position: 0,
            chunked_reading_mode: false,
            chunk_start: 0,
            next_break: None,
        }
    }

    /// Creates a new `EoReader` whose input data is a shared subsequence of
    /// this reader's data, starting at the current position and spanning all
    /// remaining data.
    ///
    /// The new reader's position is zero and its chunked reading mode is off,
    /// independent of this reader.
    pub fn slice(&self) -> EoReader<'a> {
        self.slice_at(self.position, self.data.len().saturating_sub(self.position))
    }

    /// Creates a new `EoReader` whose input data is a shared subsequence of
    /// this reader's data, starting at position `index` and containing up to
    /// `length` bytes.
    ///
    /// Out-of-range values are clamped to the available data; the new reader
    /// starts at position zero with chunked reading mode off.
    pub fn slice_at(&self, index: usize, length: usize) -> EoReader<'a> {
        let begin = index.min(self.data.len());
        let end = begin + length.min(self.data.len() - begin);

        EoReader::new(&self.data[begin..end])
    }

    /// Reads a raw byte from the input data.
    pub fn get_byte(&mut self) -> u8 {
        self.read_byte()
    }

    /// Reads an array of raw bytes from the input data.
    pub fn get_bytes(&mut self, length: usize) -> Vec<u8> {
        self.read_bytes(length)
    }

    /// Reads an encoded 1-byte integer from the input data.
    pub fn get_char(&mut self) -> u32 {
        let bytes = self.read_bytes(1);
        decode_number(&bytes)
    }

    /// Reads an encoded 2-byte integer from the input data.
    pub fn get_short(&mut self) -> u32 {
        let bytes = self.read_bytes(2);
        decode_number(&bytes)
    }

    /// Reads an encoded 3-byte integer from the input data.
    pub fn get_three(&mut self) -> u32 {
        let bytes = self.read_bytes(3);
        decode_number(&bytes)
    }

    /// Reads an encoded 4-byte integer from the input data.
    pub fn get_int(&mut self) -> u32 {
        let bytes = self.read_bytes(4);
        decode_number(&bytes)
    }

    /// Reads a string spanning all remaining data in the current chunk (or
    /// reader, outside of chunked reading mode).
    pub fn get_string(&mut self) -> String {
        let bytes = self.read_bytes(self.remaining());
        decode_ansi(&bytes)
    }

    /// Reads a string with a fixed length from the input data.
    ///
    /// If `padded` is true, trailing `0xFF` padding is stripped.
    pub fn get_fixed_string(&mut self, length: usize, padded: bool) -> String {
        let mut bytes = self.read_bytes(length);
        if padded {
            Self::remove_padding(&mut bytes);
        }
        decode_ansi(&bytes)
    }

    /// Reads an encoded string spanning all remaining data in the current
    /// chunk (or reader, outside of chunked reading mode).
    pub fn get_encoded_string(&mut self) -> String {
        let mut bytes = self.read_bytes(self.remaining());
        decode_string(&mut bytes);
        decode_ansi(&bytes)
    }

    /// Reads an encoded string with a fixed length from the input data.
    ///
    /// If `padded` is true, trailing `0xFF` padding is stripped after the
    /// string is decoded.
    pub fn get_fixed_encoded_string(&mut self, length: usize, padded: bool) -> String {
        let mut bytes = self.read_bytes(length);
        decode_string(&mut bytes);
        if padded {
            Self::remove_padding(&mut bytes);
        }
        decode_ansi(&bytes)
    }

    /// Returns true if the reader is in chunked reading mode.
    pub fn chunked_reading_mode(&self) -> bool {
        self.chunked_reading_mode
    }

    /// Enables or disables chunked reading mode.
    pub fn set_chunked_reading_mode(&mut self, chunked_reading_mode: bool) {
        self.chunked_reading_mode = chunked_reading_mode;
        if self.next_break.is_none() {
            self.next_break = Some(self.find_next_break_index());
        }
    }

    /// In chunked reading mode, returns the number of bytes remaining in the
    /// current chunk. Otherwise, returns the total number of bytes remaining
    /// in the input data.
    pub fn remaining(&self) -> usize {
        if self.chunked_reading_mode {
            let next_break = self.next_break.unwrap_or(self.data.len());
            next_break - self.position.min(next_break)
        } else {
            self.data.len() - self.position
        }
    }

    /// Moves the reader position to the start of the next chunk in the input
    /// data.
    ///
    /// Fails if the reader is not in chunked reading mode.
    pub fn next_chunk(&mut self) -> Result<(), DataError> {
        if !self.chunked_reading_mode {
            return Err(DataError::NotInChunkedReadingMode);
        }

        self.position = self.next_break.unwrap_or(self.data.len());
        if self.position < self.data.len() {
            // Skip the break byte
            self.position += 1;
        }

        self.chunk_start = self.position;
        self.next_break = Some(self.find_next_break_index());

        Ok(())
    }

    /// Returns the current position in the input data.
    pub fn position(&self) -> usize {
        self.position
    }

    fn read_byte(&mut self) -> u8 {
        if self.remaining() > 0 {
            let byte = self.data[self.position];
            self.position += 1;
            byte
        } else {
            0
        }
    }

    fn read_bytes(&mut self, length: usize) -> Vec<u8> {
        let length = length.min(self.remaining());
        let result = self.data[self.position..self.position + length].to_vec();
        self.position += length;
        result
    }

    fn find_next_break_index(&self) -> usize {
        self.data[self.chunk_start..]
            .iter()
            .position(|&byte| byte == 0xFF)
            .map(|index| self.chunk_start + index)
            .unwrap_or(self.data.len())
    }

    fn remove_padding(bytes: &mut Vec<u8>) {
        if let Some(padding_start) = bytes.iter().position(|&byte| byte == 0xFF) {
            bytes.truncate(padding_start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::string::encode_ansi;
    use super::*;

    #[test]
    fn slice() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut reader = EoReader::new(&data);
        reader.get_byte();
        reader.set_chunked_reading_mode(true);

        let reader2 = reader.slice();
        assert_eq!(reader2.position(), 0);
        assert_eq!(reader2.remaining(), 5);
        assert!(!reader2.chunked_reading_mode());

        let reader3 = reader2.slice_at(1, usize::MAX);
        assert_eq!(reader3.position(), 0);
        assert_eq!(reader3.remaining(), 4);
        assert!(!reader3.chunked_reading_mode());

        let reader4 = reader3.slice_at(1, 2);
        assert_eq!(reader4.position(), 0);
        assert_eq!(reader4.remaining(), 2);
        assert!(!reader4.chunked_reading_mode());

        assert_eq!(reader.position(), 1);
        assert_eq!(reader.remaining(), 5);
        assert!(reader.chunked_reading_mode());
    }

    #[test]
    fn slice_over_read() {
        let data = [0x01, 0x02, 0x03];
        let reader = EoReader::new(&data);
        assert_eq!(reader.slice_at(2, 5).remaining(), 1);
        assert_eq!(reader.slice_at(3, usize::MAX).remaining(), 0);
        assert_eq!(reader.slice_at(4, usize::MAX).remaining(), 0);
        assert_eq!(reader.slice_at(4, 12345).remaining(), 0);
    }

    #[test]
    fn slice_does_not_affect_parent() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = EoReader::new(&data);
        let mut child = reader.slice_at(0, 4);
        child.get_byte();
        child.get_byte();
        assert_eq!(reader.position(), 0);
        reader.get_byte();
        assert_eq!(child.position(), 2);
    }

    #[test]
    fn get_byte() {
        for byte_value in [0x00, 0x01, 0x02, 0x80, 0xFD, 0xFE, 0xFF] {
            let data = [byte_value];
            let mut reader = EoReader::new(&data);
            assert_eq!(reader.get_byte(), byte_value);
        }
    }

    #[test]
    fn over_read_byte() {
        let mut reader = EoReader::new(&[]);
        assert_eq!(reader.get_byte(), 0x00);
    }

    #[test]
    fn get_bytes() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_bytes(3), vec![0x01, 0x02, 0x03]);
        assert_eq!(reader.get_bytes(10), vec![0x04, 0x05]);
        assert_eq!(reader.get_bytes(1), Vec::<u8>::new());
    }

    #[test]
    fn get_char() {
        let data = [0x01, 0x02, 0x80, 0x81, 0xFD, 0xFE, 0xFF];
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_char(), 0);
        assert_eq!(reader.get_char(), 1);
        assert_eq!(reader.get_char(), 127);
        assert_eq!(reader.get_char(), 128);
        assert_eq!(reader.get_char(), 252);
        assert_eq!(reader.get_char(), 0);
        assert_eq!(reader.get_char(), 254);
    }

    #[test]
    fn get_short() {
        let data = [
            0x01, 0xFE, 0x02, 0xFE, 0x80, 0xFE, 0xFD, 0xFE, 0xFE, 0xFE, 0xFE, 0x80, 0x7F, 0x7F,
            0xFD, 0xFD,
        ];
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_short(), 0);
        assert_eq!(reader.get_short(), 1);
        assert_eq!(reader.get_short(), 127);
        assert_eq!(reader.get_short(), 252);
        assert_eq!(reader.get_short(), 0);
        assert_eq!(reader.get_short(), 0);
        assert_eq!(reader.get_short(), 32004);
        assert_eq!(reader.get_short(), 64008);
    }

    #[test]
    fn get_three() {
        let data = [
            0x01, 0xFE, 0xFE, 0x02, 0xFE, 0xFE, 0x80, 0xFE, 0xFE, 0xFD, 0xFE, 0xFE, 0xFE, 0xFE,
            0xFE, 0xFE, 0x80, 0x81, 0x7F, 0x7F, 0xFE, 0xFD, 0xFD, 0xFE, 0xFD, 0xFD, 0xFD,
        ];
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_three(), 0);
        assert_eq!(reader.get_three(), 1);
        assert_eq!(reader.get_three(), 127);
        assert_eq!(reader.get_three(), 252);
        assert_eq!(reader.get_three(), 0);
        assert_eq!(reader.get_three(), 0);
        assert_eq!(reader.get_three(), 32004);
        assert_eq!(reader.get_three(), 64008);
        assert_eq!(reader.get_three(), 16_194_276);
    }

    #[test]
    fn get_int() {
        let data = [
            0x01, 0xFE, 0xFE, 0xFE, 0x02, 0xFE, 0xFE, 0xFE, 0x80, 0xFE, 0xFE, 0xFE, 0xFD, 0xFE,
            0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE, 0x80, 0x81, 0x82, 0x7F, 0x7F, 0xFE, 0xFE,
            0xFD, 0xFD, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFE, 0x7F, 0x7F, 0x7F, 0x7F, 0xFD, 0xFD,
            0xFD, 0xFD,
        ];
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_int(), 0);
        assert_eq!(reader.get_int(), 1);
        assert_eq!(reader.get_int(), 127);
        assert_eq!(reader.get_int(), 252);
        assert_eq!(reader.get_int(), 0);
        assert_eq!(reader.get_int(), 0);
        assert_eq!(reader.get_int(), 32004);
        assert_eq!(reader.get_int(), 64008);
        assert_eq!(reader.get_int(), 16_194_276);
        assert_eq!(reader.get_int(), 2_048_576_040);
        assert_eq!(reader.get_int(), 4_097_152_080);
    }

    #[test]
    fn get_string() {
        let mut reader = EoReader::new(b"Hello, World!");
        assert_eq!(reader.get_string(), "Hello, World!");
    }

    #[test]
    fn get_fixed_string() {
        let mut reader = EoReader::new(b"foobar");
        assert_eq!(reader.get_fixed_string(3, false), "foo");
        assert_eq!(reader.get_fixed_string(3, false), "bar");
    }

    #[test]
    fn padded_get_fixed_string() {
        let data = encode_ansi("fooÿbarÿÿÿ");
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_fixed_string(4, true), "foo");
        assert_eq!(reader.get_fixed_string(6, true), "bar");
    }

    #[test]
    fn chunked_get_string() {
        let data = encode_ansi("Hello,ÿWorld!");
        let mut reader = EoReader::new(&data);
        reader.set_chunked_reading_mode(true);

        assert_eq!(reader.get_string(), "Hello,");

        reader.next_chunk().unwrap();
        assert_eq!(reader.get_string(), "World!");
    }

    #[test]
    fn get_encoded_string() {
        let mut reader = EoReader::new(b"!;a-^H s^3a:)");
        assert_eq!(reader.get_encoded_string(), "Hello, World!");
    }

    #[test]
    fn fixed_get_encoded_string() {
        let mut reader = EoReader::new(b"^0g[>k");
        assert_eq!(reader.get_fixed_encoded_string(3, false), "foo");
        assert_eq!(reader.get_fixed_encoded_string(3, false), "bar");
    }

    #[test]
    fn padded_get_fixed_encoded_string() {
        let data = encode_ansi("ÿ0^9ÿÿÿ-l=S>k");
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.get_fixed_encoded_string(4, true), "foo");
        assert_eq!(reader.get_fixed_encoded_string(6, true), "bar");
        assert_eq!(reader.get_fixed_encoded_string(3, true), "baz");
    }

    #[test]
    fn chunked_get_encoded_string() {
        let data = encode_ansi("E0a3hWÿ!;a-^H");
        let mut reader = EoReader::new(&data);
        reader.set_chunked_reading_mode(true);

        assert_eq!(reader.get_encoded_string(), "Hello,");

        reader.next_chunk().unwrap();
        assert_eq!(reader.get_encoded_string(), "World!");
    }

    #[test]
    fn chunked_reading_mode() {
        let mut reader = EoReader::new(&[]);
        assert!(!reader.chunked_reading_mode());
        reader.set_chunked_reading_mode(true);
        assert!(reader.chunked_reading_mode());
    }

    #[test]
    fn remaining() {
        let data = [
            0x01, 0x03, 0x04, 0xFE, 0x05, 0xFE, 0xFE, 0x06, 0xFE, 0xFE, 0xFE,
        ];
        let mut reader = EoReader::new(&data);

        assert_eq!(reader.remaining(), 11);
        reader.get_byte();
        assert_eq!(reader.remaining(), 10);
        reader.get_char();
        assert_eq!(reader.remaining(), 9);
        reader.get_short();
        assert_eq!(reader.remaining(), 7);
        reader.get_three();
        assert_eq!(reader.remaining(), 4);
        reader.get_int();
        assert_eq!(reader.remaining(), 0);

        reader.get_char();
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn chunked_remaining() {
        let data = [
            0x01, 0x03, 0x04, 0xFF, 0x05, 0xFE, 0xFE, 0x06, 0xFE, 0xFE, 0xFE,
        ];
        let mut reader = EoReader::new(&data);
        reader.set_chunked_reading_mode(true);

        assert_eq!(reader.remaining(), 3);
        reader.get_char();
        reader.get_short();
        assert_eq!(reader.remaining(), 0);

        reader.get_char();
        assert_eq!(reader.remaining(), 0);

        reader.next_chunk().unwrap();
        assert_eq!(reader.remaining(), 7);
    }

    #[test]
    fn next_chunk() {
        let data = [0x01, 0x02, 0xFF, 0x03, 0x04, 0x05, 0xFF, 0x06];
        let mut reader = EoReader::new(&data);
        reader.set_chunked_reading_mode(true);

        assert_eq!(reader.position(), 0);

        reader.next_chunk().unwrap();
        assert_eq!(reader.position(), 3);

        reader.next_chunk().unwrap();
        assert_eq!(reader.position(), 7);

        reader.next_chunk().unwrap();
        assert_eq!(reader.position(), 8);

        reader.next_chunk().unwrap();
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn next_chunk_not_in_chunked_reading_mode() {
        let data = [0x01, 0x02, 0xFF, 0x03, 0x04, 0x05, 0xFF, 0x06];
        let mut reader = EoReader::new(&data);
        assert_eq!(
            reader.next_chunk(),
            Err(DataError::NotInChunkedReadingMode)
        );
    }

    #[test]
    fn next_chunk_with_chunked_reading_toggled_in_between() {
        let data = [0x01, 0x02, 0xFF, 0x03, 0x04, 0x05, 0xFF, 0x06];
        let mut reader = EoReader::new(&data);
        assert_eq!(reader.position(), 0);

        for expected_position in [3, 7, 8, 8] {
            reader.set_chunked_reading_mode(true);
            reader.next_chunk().unwrap();
            reader.set_chunked_reading_mode(false);
            assert_eq!(reader.position(), expected_position);
        }
    }

    #[test]
    fn under_read() {
        // The reader must skip over garbage at the end of a chunk.
        let data = [
            0x7C, 0x67, 0x61, 0x72, 0x62, 0x61, 0x67, 0x65, 0xFF, 0xCA, 0x31,
        ];
        let mut reader = EoReader::new(&data);
        reader.set_chunked_reading_mode(true);

        assert_eq!(reader.get_char(), 123);
        reader.next_chunk().unwrap();
        assert_eq!(reader.get_short(), 12345);
    }

    #[test]
    fn over_read() {
        // Reads past the end of a chunk yield zeroes and stay put.
        let data = [0xFF, 0x7C];
        let mut reader = EoReader::new(&data);
        reader.set_chunked_reading_mode(true);

        assert_eq!(reader.get_int(), 0);
        reader.next_chunk().unwrap();
        assert_eq!(reader.get_short(), 123);
    }

    #[test]
    fn double_read() {
        // Enabling chunked reading mode after a read resets the break scan
        // to the chunk start, so next_chunk lands just past the first 0xFF.
        let data = [0xFF, 0x7C, 0xCA, 0x31];
        let mut reader = EoReader::new(&data);

        assert_eq!(reader.get_int(), 790_222_478);

        reader.set_chunked_reading_mode(true);
        reader.next_chunk().unwrap();
        assert_eq!(reader.get_char(), 123);
        assert_eq!(reader.get_short(), 12345);
    }
}
