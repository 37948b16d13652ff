//! ---
//! alerter_section: "04-spool-persistence"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "JSON-lines FIFO of messages awaiting redelivery."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use alerter_common::Message;
use tracing::{debug, info, warn};

use crate::Result;

/// FIFO of undelivered messages mirrored to a file, one JSON document per line.
#[derive(Debug)]
pub struct Spooler {
    path: PathBuf,
    queue: VecDeque<Message>,
}

impl Spooler {
    /// Open the spool at `path`, loading any messages left by a previous run.
    ///
    /// A missing file is an empty spool. Lines that do not decode are skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut spooler = Self {
            path: path.into(),
            queue: VecDeque::new(),
        };
        spooler.load()?;
        Ok(spooler)
    }

    fn load(&mut self) -> Result<()> {
        debug!(spool = %self.path.display(), "loading queued messages");
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no queued messages");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(&line) {
                Ok(message) => self.queue.push_back(message),
                Err(err) => warn!(line = index + 1, error = %err, "skipping undecodable spooled message"),
            }
        }

        if !self.queue.is_empty() {
            warn!(queued = self.queue.len(), "found queued messages");
        }
        Ok(())
    }

    /// Append a message at the back of the queue.
    pub fn queue(&mut self, message: Message) {
        debug!("queueing message");
        self.queue.push_back(message);
    }

    /// Put a message back at the head of the queue.
    pub fn queue_front(&mut self, message: Message) {
        debug!("queueing message at the front");
        self.queue.push_front(message);
    }

    /// Remove and return the oldest message.
    pub fn pop(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Location of the spool file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the spool file with the current queue.
    pub fn store(&self) -> Result<()> {
        match self.queue.len() {
            0 => info!("clearing stored message queue"),
            queued => warn!(queued, "storing queued messages"),
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for message in &self.queue {
            serde_json::to_writer(&mut writer, message)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}
