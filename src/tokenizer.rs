//! Splitting of a raw input line into command segments.

/// A delimiter class that separates commands on one line.
///
/// The whole marker (e.g. `&&`) is what selects an execution mode, but splitting
/// treats every character of the marker as a separator on its own, so `a & b`
/// inside a parallel line still yields two segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `&&`: run the commands concurrently.
    Parallel,
    /// `##`: run the commands one after another.
    Sequential,
    /// `|`: connect the commands with pipes.
    Pipe,
}

impl Delimiter {
    /// The marker text that identifies this delimiter on a line.
    pub fn marker(self) -> &'static str {
        match self {
            Delimiter::Parallel => "&&",
            Delimiter::Sequential => "##",
            Delimiter::Pipe => "|",
        }
    }

    fn is_separator(self, ch: char) -> bool {
        self.marker().contains(ch)
    }
}

/// Split `line` into the ordered list of commands separated by `delimiter`.
///
/// Leading spaces are removed from each segment and empty segments are dropped,
/// so repeated and trailing delimiters are harmless. Trailing spaces are kept;
/// they are removed later when the segment is split into arguments.
pub fn split(line: &str, delimiter: Delimiter) -> Vec<String> {
    let commands: Vec<String> = line
        .split(|ch: char| delimiter.is_separator(ch))
        .map(|segment| segment.trim_start_matches(' '))
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();
    tracing::trace!(?delimiter, ?commands, "split line");
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_order_and_trims_leading_spaces() {
        let commands = split("ls -l ##   pwd ## echo hi", Delimiter::Sequential);
        assert_eq!(commands, vec!["ls -l ", "pwd ", "echo hi"]);
    }

    #[test]
    fn test_split_drops_empty_segments() {
        let commands = split("sleep 1 && && sleep 2 &&", Delimiter::Parallel);
        assert_eq!(commands, vec!["sleep 1 ", "sleep 2 "]);
    }

    #[test]
    fn test_split_only_delimiters_is_empty() {
        assert!(split("## ##  ", Delimiter::Sequential).is_empty());
        assert!(split("", Delimiter::Pipe).is_empty());
    }

    #[test]
    fn test_single_marker_character_also_separates() {
        let commands = split("echo a&b && echo c", Delimiter::Parallel);
        assert_eq!(commands, vec!["echo a", "b ", "echo c"]);
    }

    #[test]
    fn test_split_pipe_stages() {
        let commands = split("ls|wc -l", Delimiter::Pipe);
        assert_eq!(commands, vec!["ls", "wc -l"]);
    }
}
