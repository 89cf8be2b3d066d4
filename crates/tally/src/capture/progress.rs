/// One decoded update from an ffmpeg progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProgressUpdate {
    /// A block describing the in-flight encode.
    Block {
        /// Bytes written to the output so far.
        bytes_recorded: u64,
    },
    /// The closing block; the encoder is flushing and about to exit.
    End,
}

/// Incremental parser for ffmpeg's `-progress pipe:1` stream.
///
/// The stream is a repeating series of `key=value` lines; each block is
/// closed by a `progress=continue` line, the last one by `progress=end`.
#[derive(Debug, Default)]
pub(crate) struct ProgressParser {
    bytes_recorded: u64,
}

impl ProgressParser {
    /// Feed one line. Returns an update when the line closes a block.
    pub(crate) fn feed_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        let (key, value) = line.trim().split_once('=')?;

        match key {
            "total_size" => {
                // Reads "N/A" until the muxer has written anything.
                if let Ok(bytes) = value.parse() {
                    self.bytes_recorded = bytes;
                }
                None
            }
            "progress" => {
                if value == "end" {
                    Some(ProgressUpdate::End)
                } else {
                    Some(ProgressUpdate::Block {
                        bytes_recorded: self.bytes_recorded,
                    })
                }
            }
            _ => None,
        }
    }
}
