// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Values attached to a test while it runs.

use camino::{Utf8Path, Utf8PathBuf};
use std::{fmt, io};

/// A value attached to a running test, such as a log file or a rendered image.
///
/// Attachments are delivered to recorders through value-attached events. Writing them to disk is
/// up to the recorder.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The file name the attachment should preferably be saved under.
    pub preferred_name: String,

    /// The path the attachment was read from, if it came from disk.
    pub path: Option<Utf8PathBuf>,

    /// The contents of the attachment.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from in-memory contents.
    pub fn new(preferred_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            preferred_name: preferred_name.into(),
            path: None,
            bytes: bytes.into(),
        }
    }

    /// Creates an attachment from the contents of a file.
    ///
    /// The preferred name is the file name of `path`.
    pub fn from_path(path: impl AsRef<Utf8Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self {
            preferred_name: path.file_name().unwrap_or(path.as_str()).to_owned(),
            path: Some(path.to_owned()),
            bytes,
        })
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("preferred_name", &self.preferred_name)
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}
