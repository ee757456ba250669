//! Buffered read and write handles used by a session.
//!
//! These are thin wrappers over `BufReader<File>` / `BufWriter<File>` that
//! apply the mode and [`HandleOptions`] of the session: CRLF folding on
//! reads, `\n` expansion and UTF-8 checking on text writes.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::options::{HandleOptions, Mode, Newline};

pub(crate) struct Reader {
    inner: BufReader<File>,
    fold_crlf: bool,
}

impl Reader {
    pub(crate) fn open(path: &Path, mode: Mode, options: &HandleOptions) -> io::Result<Self> {
        let file = File::open(path)?;
        let inner = match options.buffer_capacity {
            Some(capacity) => BufReader::with_capacity(capacity, file),
            None => BufReader::new(file),
        };
        Ok(Self {
            inner,
            fold_crlf: mode.is_text() && options.newline.is_some(),
        })
    }

    pub(crate) fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let start = buf.len();
        self.inner.read_to_end(buf)?;
        if self.fold_crlf {
            fold_crlf(buf, start);
        }
        Ok(buf.len() - start)
    }

    pub(crate) fn read_to_string(&mut self, buf: &mut String) -> io::Result<usize> {
        let mut bytes = Vec::new();
        let n = self.read_to_end(&mut bytes)?;
        buf.push_str(&into_utf8(bytes)?);
        Ok(n)
    }

    /// Read up to and including the next `\n`. Returns 0 at end of file.
    pub(crate) fn read_line_bytes(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let start = buf.len();
        self.inner.read_until(b'\n', buf)?;
        if self.fold_crlf {
            fold_crlf(buf, start);
        }
        Ok(buf.len() - start)
    }

    pub(crate) fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        let mut bytes = Vec::new();
        let n = self.read_line_bytes(&mut bytes)?;
        buf.push_str(&into_utf8(bytes)?);
        Ok(n)
    }

    pub(crate) fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

pub(crate) struct Writer {
    inner: BufWriter<File>,
    text: bool,
    newline: Option<Newline>,
    /// Trailing bytes of a UTF-8 sequence split across two text writes.
    pending: Vec<u8>,
}

impl Writer {
    pub(crate) fn new(file: File, mode: Mode, options: &HandleOptions) -> Self {
        let inner = match options.buffer_capacity {
            Some(capacity) => BufWriter::with_capacity(capacity, file),
            None => BufWriter::new(file),
        };
        Self {
            inner,
            text: mode.is_text(),
            newline: options.newline,
            pending: Vec::new(),
        }
    }

    /// Write all of `data`.
    ///
    /// In text mode a multi-byte character may be split across calls; its
    /// head is held back until the rest arrives. Bytes that can never form
    /// valid UTF-8 fail with `InvalidData` and nothing from the call is
    /// written.
    pub(crate) fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.text {
            return self.write_translated(data);
        }

        if self.pending.is_empty() {
            let complete = complete_utf8_len(data)?;
            self.write_translated(&data[..complete])?;
            self.pending.extend_from_slice(&data[complete..]);
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(data);
            let complete = complete_utf8_len(&joined)?;
            self.write_translated(&joined[..complete])?;
            self.pending.extend_from_slice(&joined[complete..]);
        }
        Ok(())
    }

    fn write_translated(&mut self, data: &[u8]) -> io::Result<()> {
        match self.newline {
            Some(Newline::CrLf) => {
                let mut pieces = data.split(|&b| b == b'\n');
                if let Some(first) = pieces.next() {
                    self.inner.write_all(first)?;
                }
                for piece in pieces {
                    self.inner.write_all(Newline::CrLf.as_str().as_bytes())?;
                    self.inner.write_all(piece)?;
                }
                Ok(())
            }
            Some(Newline::Lf) | None => self.inner.write_all(data),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Close the file without flushing whatever is still buffered.
    pub(crate) fn discard(self) {
        let (_file, _unflushed) = self.inner.into_parts();
    }

    /// Flush buffered data, fsync, and close the file.
    ///
    /// Fails with `InvalidData` if a text write ended mid-character.
    pub(crate) fn finish(self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let dangling = self.pending.len();
            self.discard();
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("text output ends with an incomplete UTF-8 sequence ({dangling} bytes)"),
            ));
        }
        let file = self.inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

/// Length of the longest prefix of `data` made of whole characters. An
/// incomplete sequence at the very end is not an error.
fn complete_utf8_len(data: &[u8]) -> io::Result<usize> {
    match std::str::from_utf8(data) {
        Ok(_) => Ok(data.len()),
        Err(e) if e.error_len().is_none() => Ok(e.valid_up_to()),
        Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    }
}

fn into_utf8(bytes: Vec<u8>) -> io::Result<String> {
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Rewrite every `\r\n` in `buf[start..]` as `\n`, in place.
fn fold_crlf(buf: &mut Vec<u8>, start: usize) {
    let mut write = start;
    let mut read = start;
    while read < buf.len() {
        if buf[read] == b'\r' && buf.get(read + 1) == Some(&b'\n') {
            read += 1;
        }
        buf[write] = buf[read];
        write += 1;
        read += 1;
    }
    buf.truncate(write);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn text_with(newline: Newline) -> HandleOptions {
        HandleOptions::default().newline(newline)
    }

    #[test]
    fn test_fold_crlf() {
        let mut buf = b"keep\r\na\r\nb\rc\n".to_vec();
        fold_crlf(&mut buf, 4);
        assert_eq!(buf, b"keep\na\nb\rc\n");

        let mut prefix_untouched = b"x\r\ny\r\n".to_vec();
        fold_crlf(&mut prefix_untouched, 3);
        assert_eq!(prefix_untouched, b"x\r\ny\n");
    }

    #[test]
    fn test_reader_lines_fold_crlf_in_text_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("dos.txt");
        fs::write(&path, b"one\r\ntwo\r\n").unwrap();

        let mut reader = Reader::open(&path, Mode::Text, &text_with(Newline::Lf)).unwrap();
        let mut line = String::new();
        assert_eq!(reader.read_line(&mut line).unwrap(), 4);
        assert_eq!(line, "one\n");

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "two\n");
    }

    #[test]
    fn test_reader_without_newline_is_verbatim() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("dos.txt");
        fs::write(&path, b"one\r\ntwo\r\n").unwrap();

        let mut reader = Reader::open(&path, Mode::Text, &HandleOptions::default()).unwrap();
        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"one\r\ntwo\r\n");
    }

    #[test]
    fn test_lone_cr_is_not_a_line_break() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("mac.txt");
        fs::write(&path, b"one\rtwo\r\nthree").unwrap();

        for options in [HandleOptions::default(), text_with(Newline::Lf)] {
            let mut reader = Reader::open(&path, Mode::Text, &options).unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let expected = if options.newline.is_some() { "one\rtwo\n" } else { "one\rtwo\r\n" };
            assert_eq!(line, expected);
        }
    }

    #[test]
    fn test_reader_rejects_invalid_utf8_as_string() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("blob.bin");
        fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();

        let mut reader = Reader::open(&path, Mode::Binary, &HandleOptions::default()).unwrap();
        let mut s = String::new();
        let err = reader.read_line(&mut s).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_writer_expands_crlf() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.txt");
        let file = File::create(&path).unwrap();

        let mut writer = Writer::new(file, Mode::Text, &text_with(Newline::CrLf));
        writer.write_all(b"a\nb\n").unwrap();
        writer.write_all(b"c").unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"a\r\nb\r\nc");
    }

    #[test]
    fn test_text_writer_rejects_invalid_utf8() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.txt");
        let file = File::create(&path).unwrap();

        let mut writer = Writer::new(file, Mode::Text, &HandleOptions::default());
        let err = writer.write_all(b"ok\xff").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        writer.finish().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn test_text_writer_joins_split_character() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.txt");
        let file = File::create(&path).unwrap();

        // "é" is 0xc3 0xa9; "€" is 0xe2 0x82 0xac
        let mut writer = Writer::new(file, Mode::Text, &text_with(Newline::CrLf));
        writer.write_all(b"caf\xc3").unwrap();
        writer.write_all(b"\xa9\n\xe2").unwrap();
        writer.write_all(b"\x82").unwrap();
        writer.write_all(b"\xac\n").unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "café\r\n€\r\n");
    }

    #[test]
    fn test_text_writer_finish_rejects_dangling_sequence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = File::create(temp_dir.path().join("out.txt")).unwrap();

        let mut writer = Writer::new(file, Mode::Text, &HandleOptions::default());
        writer.write_all(b"a\xc3").unwrap();
        let err = writer.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_text_writer_rejects_bad_continuation_after_split() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = File::create(temp_dir.path().join("out.txt")).unwrap();

        let mut writer = Writer::new(file, Mode::Text, &HandleOptions::default());
        writer.write_all(b"\xc3").unwrap();
        let err = writer.write_all(b"z").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_binary_writer_is_verbatim() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.bin");
        let file = File::create(&path).unwrap();

        let mut writer = Writer::new(file, Mode::Binary, &HandleOptions::default());
        writer.write_all(&[0xc3, b'\n', 0x00]).unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read(&path).unwrap(), [0xc3, b'\n', 0x00]);
    }
}
