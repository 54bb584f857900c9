// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use std::string::FromUtf8Error;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Arrays nested deeper than this are rejected as malformed.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Outcome of a decode attempt that did not produce a frame.
///
/// `Incomplete` means the bytes seen so far are a valid prefix and the caller should wait for
/// more. Every other variant means the bytes can never become a valid frame.
#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    #[error("protocol error; {0}")]
    Malformed(String),
}

impl Error {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Incomplete)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    /// Null bulk string, `$-1\r\n`.
    Null,
    /// Null array, `*-1\r\n`.
    NullArray,
    Array(Vec<Frame>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        Self::parse_at(src, 0)
    }

    fn parse_at(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        // Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            // +<payload>\r\n
            DataType::SimpleString => {
                let bytes = get_line(src)?.to_vec();
                Ok(Frame::Simple(String::from_utf8(bytes)?))
            }
            // -<payload>\r\n
            DataType::SimpleError => {
                let bytes = get_line(src)?.to_vec();
                Ok(Frame::Error(String::from_utf8(bytes)?))
            }
            // :[-]<digits>\r\n
            DataType::Integer => Ok(Frame::Integer(get_decimal(src)?)),
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = match get_decimal(src)? {
                    -1 => return Ok(Frame::Null),
                    length => to_length(length)?,
                };

                let data = get_exact(src, length)?;
                Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(malformed("nesting too deep"));
                }

                let length = match get_decimal(src)? {
                    -1 => return Ok(Frame::NullArray),
                    length => to_length(length)?,
                };

                // The declared length is untrusted, every element takes at least three bytes.
                let mut frames = Vec::with_capacity(length.min(src.remaining() / 3));
                for _ in 0..length {
                    frames.push(Self::parse_at(src, depth + 1)?);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes);
        bytes
    }

    fn write_to(&self, dst: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                dst.push(u8::from(DataType::SimpleString));
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.push(u8::from(DataType::SimpleError));
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.push(u8::from(DataType::Integer));
                dst.extend_from_slice(i.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.reserve(bytes.len() + 16);
                dst.push(u8::from(DataType::BulkString));
                dst.extend_from_slice(bytes.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(bytes);
                dst.extend_from_slice(CRLF);
            }
            Frame::Null => dst.extend_from_slice(b"$-1\r\n"),
            Frame::NullArray => dst.extend_from_slice(b"*-1\r\n"),
            Frame::Array(arr) => {
                dst.push(u8::from(DataType::Array));
                dst.extend_from_slice(arr.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in arr {
                    frame.write_to(dst);
                }
            }
        }
    }
}

/// Decodes a single frame starting at `offset`, returning it together with the number of bytes
/// it occupied.
pub fn decode(data: &[u8], offset: usize) -> Result<(Frame, usize), Error> {
    let mut cursor = Cursor::new(data);
    cursor.set_position(offset as u64);

    let frame = Frame::parse(&mut cursor)?;
    let consumed = cursor.position() as usize - offset;

    Ok((frame, consumed))
}

/// Whether `byte` can open a client command: simple string, error, bulk string or array.
pub fn is_command_tag(byte: u8) -> bool {
    matches!(byte, b'+' | b'-' | b'$' | b'*')
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::NullArray => write!(f, "*-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

/// Reads a CRLF terminated line whose payload may hold any byte but CR or LF.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let data: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;

    let end = data[start..]
        .iter()
        .position(|&byte| byte == b'\r' || byte == b'\n')
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    expect_crlf(data, end)?;
    src.set_position((end + CRLF.len()) as u64);

    Ok(&data[start..end])
}

/// Reads `[-]<digits>\r\n`. A byte that cannot belong to a decimal is rejected as soon as it is
/// seen, only a run of valid digits cut short by the end of the data is incomplete.
fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let data: &[u8] = *src.get_ref();
    let start = src.position() as usize;

    let mut end = start;
    if data.get(end) == Some(&b'-') {
        end += 1;
    }
    while data.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }

    match data.get(end) {
        None => return Err(Error::Incomplete),
        Some(&b'\r') => {}
        Some(&byte) => return Err(malformed(format!("invalid byte {byte:#04x} in number"))),
    }

    let digits = &data[start..end];
    let number = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| malformed(format!("invalid number {:?}", String::from_utf8_lossy(digits))))?;

    expect_crlf(data, end)?;
    src.set_position((end + CRLF.len()) as u64);

    Ok(number)
}

/// Reads exactly `length` payload bytes followed by CRLF.
fn get_exact<'a>(src: &mut Cursor<&'a [u8]>, length: usize) -> Result<&'a [u8], Error> {
    let data: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;

    let end = start
        .checked_add(length)
        .ok_or_else(|| malformed("bulk length out of range"))?;
    if data.len() < end {
        return Err(Error::Incomplete);
    }

    expect_crlf(data, end)?;
    src.set_position((end + CRLF.len()) as u64);

    Ok(&data[start..end])
}

fn expect_crlf(data: &[u8], at: usize) -> Result<(), Error> {
    match (data.get(at), data.get(at + 1)) {
        (Some(&b'\r'), Some(&b'\n')) => Ok(()),
        (None, _) | (Some(&b'\r'), None) => Err(Error::Incomplete),
        _ => Err(malformed("expected CRLF")),
    }
}

fn to_length(length: i64) -> Result<usize, Error> {
    usize::try_from(length).map_err(|_| malformed(format!("invalid length {length}")))
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::Malformed(reason.into())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        malformed("invalid frame format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Result<Frame, Error> {
        let mut cursor = Cursor::new(data);
        Frame::parse(&mut cursor)
    }

    #[test]
    fn parse_simple_string_frame() {
        let frame = parse(b"+OK\r\n");

        assert!(matches!(frame, Ok(Frame::Simple(ref s)) if s == "OK"));
    }

    #[test]
    fn parse_simple_error_frame() {
        let frame = parse(b"-Error message\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Error(ref s)) if s == "Error message"
        ));
    }

    fn parse_integer_frame(data: &[u8], expected: i64) {
        let frame = parse(data);

        assert!(matches!(frame, Ok(Frame::Integer(i)) if i == expected));
    }

    #[test]
    fn parse_integer_frame_positive() {
        parse_integer_frame(b":1000\r\n", 1000);
    }

    #[test]
    fn parse_integer_frame_negative() {
        parse_integer_frame(b":-1000\r\n", -1000);
    }

    #[test]
    fn parse_integer_frame_zero() {
        parse_integer_frame(b":0\r\n", 0);
    }

    #[test]
    fn parse_bulk_string_frame() {
        let frame = parse(b"$6\r\nfoobar\r\n");

        assert_eq!(frame, Ok(Frame::Bulk(Bytes::from("foobar"))));
    }

    #[test]
    fn parse_bulk_string_frame_multibyte() {
        let value = "hello𒓸";
        let data = format!("${}\r\n{}\r\n", value.len(), value);

        let frame = parse(data.as_bytes());

        assert_eq!(frame, Ok(Frame::Bulk(Bytes::from(value))));
    }

    #[test]
    fn parse_bulk_string_frame_with_crlf_and_nul() {
        let frame = parse(b"$6\r\na\r\n\0b\0\r\n");

        assert_eq!(frame, Ok(Frame::Bulk(Bytes::from_static(b"a\r\n\0b\0"))));
    }

    #[test]
    fn parse_bulk_string_frame_empty() {
        let frame = parse(b"$0\r\n\r\n");

        assert_eq!(frame, Ok(Frame::Bulk(Bytes::new())));
    }

    #[test]
    fn parse_bulk_string_frame_null() {
        let frame = parse(b"$-1\r\n");

        assert_eq!(frame, Ok(Frame::Null));
    }

    #[test]
    fn parse_array_frame_empty() {
        let frame = parse(b"*0\r\n");

        assert!(matches!(frame, Ok(Frame::Array(ref a)) if a.is_empty()));
    }

    #[test]
    fn parse_array_frame() {
        let frame = parse(b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n");

        assert_eq!(
            frame,
            Ok(Frame::Array(vec![
                Frame::Bulk(Bytes::from("hello")),
                Frame::Bulk(Bytes::from("world")),
            ]))
        );
    }

    #[test]
    fn parse_array_frame_nested() {
        let frame = parse(b"*2\r\n*3\r\n:1\r\n:2\r\n:3\r\n*2\r\n+Hello\r\n-World\r\n");

        assert_eq!(
            frame,
            Ok(Frame::Array(vec![
                Frame::Array(vec![
                    Frame::Integer(1),
                    Frame::Integer(2),
                    Frame::Integer(3)
                ]),
                Frame::Array(vec![
                    Frame::Simple("Hello".to_string()),
                    Frame::Error("World".to_string())
                ]),
            ]))
        );
    }

    #[test]
    fn parse_array_frame_null() {
        let frame = parse(b"*-1\r\n");

        assert_eq!(frame, Ok(Frame::NullArray));
    }

    #[test]
    fn parse_array_frame_null_in_the_middle() {
        let frame = parse(b"*3\r\n$5\r\nhello\r\n$-1\r\n$5\r\nworld\r\n");

        assert_eq!(
            frame,
            Ok(Frame::Array(vec![
                Frame::Bulk(Bytes::from("hello")),
                Frame::Null,
                Frame::Bulk(Bytes::from("world")),
            ]))
        );
    }

    #[test]
    fn decode_reports_consumed_bytes_from_offset() {
        let data = b"xx+OK\r\n:1\r\n";

        let (frame, consumed) = decode(data, 2).unwrap();

        assert_eq!(frame, Frame::Simple("OK".to_string()));
        assert_eq!(consumed, 5);

        let (frame, consumed) = decode(data, 7).unwrap();

        assert_eq!(frame, Frame::Integer(1));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn incomplete_prefixes() {
        let incomplete: [&[u8]; 12] = [
            b"",
            b"+OK",
            b"+OK\r",
            b":12",
            b"$",
            b"$-",
            b"$5",
            b"$5\r",
            b"$5\r\nhel",
            b"$5\r\nhello\r",
            b"*2\r\n$3\r\nGET\r\n",
            b"*2\r\n$3\r\nGET\r\n$3\r\nke",
        ];

        for data in incomplete {
            assert_eq!(
                parse(data),
                Err(Error::Incomplete),
                "expected incomplete for {:?}",
                String::from_utf8_lossy(data)
            );
        }
    }

    #[test]
    fn malformed_inputs() {
        let malformed: [&[u8]; 10] = [
            b"$abc\r\n\r\n",
            b"$ab",
            b"$5x",
            b"$\r\n",
            b"$-2\r\n",
            b"*-5\r\n",
            b"$3\r\nabcde\r\n",
            b"+OK\rX",
            b"+OK\n",
            b":99999999999999999999\r\n",
        ];

        for data in malformed {
            assert!(
                matches!(parse(data), Err(Error::Malformed(_))),
                "expected malformed for {:?}",
                String::from_utf8_lossy(data)
            );
        }
    }

    #[test]
    fn invalid_data_type() {
        assert_eq!(parse(b"X\r\n"), Err(Error::InvalidDataType(b'X')));
    }

    fn nested(depth: usize) -> Vec<u8> {
        let mut data = b"*1\r\n".repeat(depth);
        data.extend_from_slice(b"$4\r\nPING\r\n");
        data
    }

    #[test]
    fn parse_array_frame_at_the_nesting_limit() {
        let mut expected = Frame::Bulk(Bytes::from("PING"));
        for _ in 0..MAX_NESTING_DEPTH {
            expected = Frame::Array(vec![expected]);
        }

        assert_eq!(parse(&nested(MAX_NESTING_DEPTH)), Ok(expected));
    }

    #[test]
    fn parse_array_frame_nested_too_deep() {
        let too_deep: Result<Frame, Error> = Err(Error::Malformed("nesting too deep".to_string()));

        assert_eq!(parse(&nested(MAX_NESTING_DEPTH + 1)), too_deep);
        assert_eq!(parse(&nested(20_000)), too_deep);
        // Decided on the array tag, whatever follows it.
        assert_eq!(
            parse(&b"*1\r\n".repeat(MAX_NESTING_DEPTH + 1)),
            too_deep
        );
        assert_eq!(
            parse(&b"*1\r\n".repeat(MAX_NESTING_DEPTH)),
            Err(Error::Incomplete)
        );
    }

    #[test]
    fn parse_array_frame_with_huge_declared_length() {
        let frame = parse(b"*2147483647\r\n$3\r\nGET\r\n$1\r\nk\r\n");

        assert_eq!(frame, Err(Error::Incomplete));
    }

    #[test]
    fn serialize_frames() {
        assert_eq!(Frame::Simple("PONG".to_string()).serialize(), b"+PONG\r\n");
        assert_eq!(
            Frame::Error("doesn't exist".to_string()).serialize(),
            b"-doesn't exist\r\n"
        );
        assert_eq!(Frame::Integer(-42).serialize(), b":-42\r\n");
        assert_eq!(Frame::Bulk(Bytes::from("hi")).serialize(), b"$2\r\nhi\r\n");
        assert_eq!(Frame::Null.serialize(), b"$-1\r\n");
        assert_eq!(Frame::NullArray.serialize(), b"*-1\r\n");
        assert_eq!(
            Frame::Array(vec![Frame::Integer(1), Frame::Bulk(Bytes::new())]).serialize(),
            b"*2\r\n:1\r\n$0\r\n\r\n"
        );
    }

    #[test]
    fn decode_inverts_serialize() {
        let frames = [
            Frame::Simple("hello world".to_string()),
            Frame::Error("ERR something".to_string()),
            Frame::Integer(i64::MIN),
            Frame::Bulk(Bytes::from_static(b"line\r\nbreak\0")),
            Frame::Null,
            Frame::NullArray,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from("SET")),
                Frame::Array(vec![Frame::Null, Frame::Integer(7)]),
            ]),
        ];

        for frame in frames {
            let bytes = frame.serialize();

            assert_eq!(decode(&bytes, 0), Ok((frame, bytes.len())));
        }
    }
}
