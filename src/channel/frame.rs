//! Newline framing for stream transports

use crate::channel::MAX_MESSAGE_SIZE;
use std::io::{self, BufRead, Read};

/// Outcome of reading one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// A frame of at most [`MAX_MESSAGE_SIZE`] bytes, newline stripped
    Complete,
    /// The line exceeded [`MAX_MESSAGE_SIZE`]; it was skipped up to its newline
    Oversized,
    /// End of stream
    Closed,
}

/// Reads the next `\n`-terminated frame into `frame`.
///
/// At most `MAX_MESSAGE_SIZE + 1` bytes are buffered per frame. A trailing
/// unterminated line at end of stream counts as a frame.
pub fn read_frame<R: BufRead>(reader: &mut R, frame: &mut Vec<u8>) -> io::Result<Frame> {
    frame.clear();
    let limit = MAX_MESSAGE_SIZE as u64 + 1;
    if (&mut *reader).take(limit).read_until(b'\n', frame)? == 0 {
        return Ok(Frame::Closed);
    }

    if frame.last() == Some(&b'\n') {
        frame.pop();
        return Ok(Frame::Complete);
    }
    if frame.len() <= MAX_MESSAGE_SIZE {
        return Ok(Frame::Complete);
    }

    frame.clear();
    skip_line(reader)?;
    Ok(Frame::Oversized)
}

fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frames(input: Vec<u8>) -> Vec<(Frame, Vec<u8>)> {
        let mut reader = Cursor::new(input);
        let mut frame = Vec::new();
        let mut out = Vec::new();
        loop {
            let kind = read_frame(&mut reader, &mut frame).unwrap();
            if kind == Frame::Closed {
                return out;
            }
            out.push((kind, frame.clone()));
        }
    }

    #[test]
    fn test_splits_on_newline() {
        assert_eq!(
            frames(b"one\ntwo\n\nthree".to_vec()),
            vec![
                (Frame::Complete, b"one".to_vec()),
                (Frame::Complete, b"two".to_vec()),
                (Frame::Complete, Vec::new()),
                (Frame::Complete, b"three".to_vec()),
            ]
        );
    }

    #[test]
    fn test_frame_at_limit_is_accepted() {
        let mut input = vec![b'a'; MAX_MESSAGE_SIZE];
        input.push(b'\n');
        let out = frames(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, Frame::Complete);
        assert_eq!(out[0].1.len(), MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_oversized_line_is_skipped() {
        let mut input = vec![b'x'; 8 * MAX_MESSAGE_SIZE];
        input.extend_from_slice(b"\nnext\n");
        assert_eq!(
            frames(input),
            vec![
                (Frame::Oversized, Vec::new()),
                (Frame::Complete, b"next".to_vec()),
            ]
        );
    }

    #[test]
    fn test_oversized_line_without_newline_ends_stream() {
        let input = vec![b'x'; MAX_MESSAGE_SIZE + 1];
        assert_eq!(frames(input), vec![(Frame::Oversized, Vec::new())]);
    }
}
