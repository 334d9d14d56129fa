// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{num::NonZeroUsize, sync::Arc};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of test cases running at once.
///
/// Waiters are admitted in the order they arrived, since tokio's semaphore is fair.
#[derive(Debug)]
pub(crate) struct Serializer {
    semaphore: Arc<Semaphore>,
    width: NonZeroUsize,
}

impl Serializer {
    pub(crate) fn new(width: NonZeroUsize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(width.get())),
            width,
        }
    }

    pub(crate) fn width(&self) -> NonZeroUsize {
        self.width
    }

    /// Waits for a free slot. The slot is released when the permit is dropped.
    ///
    /// Returns `None` if the serializer was closed, which never happens while the run is alive.
    pub(crate) async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }
}
