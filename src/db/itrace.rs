use std::collections::VecDeque;

//===========================================================================//

/// The number of trace lines kept by an [`ITraceRing`].
pub const ITRACE_CAPACITY: usize = 16;

const RULE: &str = "--------------------------------------------------";

//===========================================================================//

/// A ring buffer holding the trace lines of the most recently executed
/// instructions.
#[derive(Clone, Debug, Default)]
pub struct ITraceRing {
    lines: VecDeque<String>,
}

impl ITraceRing {
    /// Returns an empty ring.
    pub fn new() -> ITraceRing {
        ITraceRing { lines: VecDeque::with_capacity(ITRACE_CAPACITY) }
    }

    /// Records a trace line, discarding the oldest one if the ring is full.
    pub fn push(&mut self, line: String) {
        if self.lines.len() == ITRACE_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Returns the number of recorded lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterates over the recorded lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(String::as_str)
    }

    /// Formats the ring for display, with the newest line marked.
    pub fn render(&self) -> String {
        let mut output = format!(
            "Instruction Ring Buffer (last {ITRACE_CAPACITY} instructions):\n\
             {RULE}\n"
        );
        if self.lines.is_empty() {
            output.push_str("(Buffer is empty)\n");
            return output;
        }
        let newest = self.lines.len() - 1;
        for (index, line) in self.lines.iter().enumerate() {
            let marker = if index == newest { "--> " } else { "    " };
            output.push_str(marker);
            output.push_str(line);
            output.push('\n');
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }
}

//===========================================================================//


//===========================================================================//
