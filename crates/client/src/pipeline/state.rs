#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Forward,
    Backward,
}

/// What a hook asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Next,
    Resolve,
}

/// Where an invocation stands in its plugin chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    At { index: usize, phase: Phase },
    /// The backward phase went past the first plugin, the value is final.
    Settled,
    /// The forward phase went past the last plugin without any value.
    Exhausted,
}

impl Position {
    pub fn start(len: usize) -> Self {
        Self::forward(0, len)
    }

    fn forward(index: usize, len: usize) -> Self {
        if index < len {
            Position::At {
                index,
                phase: Phase::Forward,
            }
        } else {
            Position::Exhausted
        }
    }

    /// Forward: `Next` moves to the next plugin, `Resolve` turns around at the current one.
    /// Backward: `Resolve` moves to the previous plugin, `Next` dispatches again from the
    /// plugin right after the current one.
    pub fn advance(self, signal: Signal, len: usize) -> Self {
        let Position::At { index, phase } = self else {
            return self;
        };

        match (phase, signal) {
            (_, Signal::Next) => Self::forward(index + 1, len),
            (Phase::Forward, Signal::Resolve) => Position::At {
                index,
                phase: Phase::Backward,
            },
            (Phase::Backward, Signal::Resolve) => match index.checked_sub(1) {
                Some(index) => Position::At {
                    index,
                    phase: Phase::Backward,
                },
                None => Position::Settled,
            },
        }
    }
}
