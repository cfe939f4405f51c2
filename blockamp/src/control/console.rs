//! Line-oriented console input
//!
//! The control channel reads whole lines through [`LineSource`] so tests can
//! feed it scripted input instead of the terminal.

use std::io::{self, BufRead};

/// Blocking source of text lines
pub trait LineSource: Send {
    /// Read the next line without its terminator, `Ok(None)` at end of input
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Lines typed on the process's standard input
#[derive(Debug, Default)]
pub struct StdinLines;

impl LineSource for StdinLines {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_trimmed(&mut io::stdin().lock())
    }
}

/// Adapter for any buffered reader
pub struct BufReadLines<R> {
    reader: R,
}

impl<R: BufRead + Send> BufReadLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> LineSource for BufReadLines<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_trimmed(&mut self.reader)
    }
}

fn read_trimmed<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    Ok(Some(line))
}
