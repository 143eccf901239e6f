//! Line input for the REPL.
//!
//! Reads happen on a dedicated OS thread that feeds a channel. The thread is
//! detached, so the process can exit on Ctrl-C while a read is still blocked.

use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc;
use tracing::debug;

/// Lines read from the terminal. The channel closes at end of input.
pub type LineReceiver = mpsc::Receiver<io::Result<String>>;

const LINE_BUFFER: usize = 16;

/// Start reading `reader` line by line on its own thread.
///
/// A read error is forwarded once and ends the stream.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<LineReceiver>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    thread::Builder::new()
        .name("tally-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() {
                    debug!("input receiver dropped, stopping reader");
                    return;
                }
                if failed {
                    return;
                }
            }
            debug!("end of input");
        })?;
    Ok(rx)
}
