use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

/// Read adapter that reports cumulative fractional progress on a bounded
/// channel as bytes flow through it. When the expected total is unknown no
/// fractional events are emitted and completion is the only signal.
///
/// The channel closes when the adapter (and with it the sender) is dropped,
/// which the owning copy loop does only after the copy has returned. A full
/// channel blocks the copy until the consumer drains; a dropped consumer
/// aborts the copy with a broken-pipe error.
pub struct ProgressReader<R> {
    inner: R,
    sender: SyncSender<f64>,
    total: u64,
    downloaded: u64,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, total: Option<u64>, sender: SyncSender<f64>) -> Self {
        Self {
            inner,
            sender,
            total: total.unwrap_or(0),
            downloaded: 0,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 && self.total > 0 {
            self.downloaded += n as u64;
            let ratio = (self.downloaded as f64 / self.total as f64).min(1.0);
            if self.sender.send(ratio).is_err() {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "progress receiver dropped",
                ));
            }
        }
        Ok(n)
    }
}

/// Bounded in-memory pipe handing owned byte chunks from the download copy
/// to the extractor thread. Dropping the writer is end-of-stream.
pub fn chunk_pipe(depth: usize) -> (ChunkWriter, ChunkReader) {
    let (sender, receiver) = sync_channel(depth);
    (
        ChunkWriter { sender },
        ChunkReader {
            receiver,
            pending: Vec::new(),
            position: 0,
        },
    )
}

pub struct ChunkWriter {
    sender: SyncSender<Vec<u8>>,
}

impl Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sender.send(buf.to_vec()).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "chunk receiver dropped")
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct ChunkReader {
    receiver: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    position: usize,
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position == self.pending.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.position = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let available = &self.pending[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Write};
    use std::sync::mpsc::{TryRecvError, sync_channel};

    use super::{ProgressReader, chunk_pipe};

    #[test]
    fn known_total_emits_terminal_ratio_exactly_once_then_closes() {
        let (sender, receiver) = sync_channel(16);
        let mut reader = ProgressReader::new(Cursor::new(vec![7u8; 10]), Some(10), sender);

        let mut sink = Vec::new();
        std::io::copy(&mut reader, &mut sink).expect("copy");
        drop(reader);

        let mut samples = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(sample) => samples.push(sample),
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => unreachable!("sender is gone"),
            }
        }

        assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(samples.iter().filter(|ratio| **ratio >= 1.0).count(), 1);
        assert_eq!(*samples.last().expect("terminal sample"), 1.0);
        assert!(matches!(
            receiver.try_recv(),
            Err(TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn unknown_total_emits_no_fractional_events() {
        let (sender, receiver) = sync_channel(16);
        let mut reader = ProgressReader::new(Cursor::new(vec![7u8; 64]), None, sender);

        let mut sink = Vec::new();
        std::io::copy(&mut reader, &mut sink).expect("copy");
        drop(reader);

        assert!(matches!(
            receiver.try_recv(),
            Err(TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn dropped_progress_consumer_aborts_the_copy() {
        let (sender, receiver) = sync_channel(16);
        drop(receiver);
        let mut reader = ProgressReader::new(Cursor::new(vec![7u8; 10]), Some(10), sender);

        let mut sink = Vec::new();
        let error = std::io::copy(&mut reader, &mut sink).expect_err("copy should fail");
        assert_eq!(error.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn chunk_pipe_preserves_order_and_signals_eof_on_writer_drop() {
        let (mut writer, mut reader) = chunk_pipe(8);

        writer.write_all(b"hello ").expect("write");
        writer.write_all(b"world").expect("write");
        drop(writer);

        let mut output = String::new();
        reader.read_to_string(&mut output).expect("read");
        assert_eq!(output, "hello world");

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).expect("read at eof"), 0);
    }

    #[test]
    fn chunk_writer_errors_once_the_reader_is_gone() {
        let (mut writer, reader) = chunk_pipe(1);
        drop(reader);

        let error = writer.write_all(b"data").expect_err("write should fail");
        assert_eq!(error.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
