//! Bootstrap progress events with download metadata

use tokio::sync::mpsc;

use super::catalog::DependencyKind;

/// Phase of the dependency currently being worked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Checking,    // Running the presence scan
    Resolving,   // Looking up the newest release tag
    Downloading, // Streaming archive bytes
    Extracting,  // Unpacking into the slot
    Installing,  // Package manager work inside the interpreter
    Complete,
    Failed,
}

/// One progress update of a bootstrap pass
#[derive(Debug, Clone)]
pub struct BootstrapProgress {
    pub kind: DependencyKind,
    /// 1-based position among the missing dependencies
    pub index: usize,
    pub total: usize,
    pub phase: BootstrapPhase,
    pub bytes_received: u64,
    /// `None` when the server did not announce a length
    pub bytes_total: Option<u64>,
    pub message: String,
}

impl BootstrapProgress {
    pub fn new(kind: DependencyKind, index: usize, total: usize, phase: BootstrapPhase) -> Self {
        let message = match phase {
            BootstrapPhase::Checking => format!("Checking {}", kind.label()),
            BootstrapPhase::Resolving => format!("Looking up latest release of {}", kind.label()),
            BootstrapPhase::Downloading => format!("Downloading {}", kind.label()),
            BootstrapPhase::Extracting => format!("Extracting {}", kind.label()),
            BootstrapPhase::Installing => format!("Installing {}", kind.label()),
            BootstrapPhase::Complete => format!("{} ready", kind.label()),
            BootstrapPhase::Failed => format!("{} failed", kind.label()),
        };

        Self {
            kind,
            index,
            total,
            phase,
            bytes_received: 0,
            bytes_total: None,
            message,
        }
    }

    /// Download progress with byte counters
    pub fn download(
        kind: DependencyKind,
        index: usize,
        total: usize,
        received: u64,
        bytes_total: Option<u64>,
    ) -> Self {
        let mb_received = received as f64 / 1_048_576.0;
        let message = match bytes_total {
            Some(t) if t > 0 => format!(
                "Downloading {} ({:.1} MB / {:.1} MB)",
                kind.label(),
                mb_received,
                t as f64 / 1_048_576.0
            ),
            _ => format!("Downloading {} ({:.1} MB)", kind.label(), mb_received),
        };

        Self {
            kind,
            index,
            total,
            phase: BootstrapPhase::Downloading,
            bytes_received: received,
            bytes_total,
            message,
        }
    }

    /// Percentage of the current download; `None` if indeterminate
    pub fn percent(&self) -> Option<u8> {
        match self.bytes_total {
            Some(total) if total > 0 => Some((self.bytes_received.min(total) * 100 / total) as u8),
            _ => None,
        }
    }
}

/// Best-effort progress channel. Sending never blocks and never fails the
/// pass; a full or closed channel just drops the update.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<BootstrapProgress>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<BootstrapProgress>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything
    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: BootstrapProgress) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }
}

/// Progress emitter bound to one dependency of the pass
#[derive(Debug, Clone)]
pub struct ItemTracker {
    sink: ProgressSink,
    kind: DependencyKind,
    index: usize,
    total: usize,
}

impl ItemTracker {
    pub fn new(sink: ProgressSink, kind: DependencyKind, index: usize, total: usize) -> Self {
        Self { sink, kind, index, total }
    }

    /// A tracker whose updates go nowhere
    pub fn detached(kind: DependencyKind) -> Self {
        Self::new(ProgressSink::none(), kind, 1, 1)
    }

    pub fn phase(&self, phase: BootstrapPhase) {
        self.sink
            .emit(BootstrapProgress::new(self.kind, self.index, self.total, phase));
    }

    pub fn bytes(&self, received: u64, total: Option<u64>) {
        self.sink.emit(BootstrapProgress::download(
            self.kind, self.index, self.total, received, total,
        ));
    }
}
