/// The outcome of decoding one line of a streamed response body.
///
/// Delta events live only as long as the read loop that produced them; they are never
/// stored.  The end of the stream is signalled by the stream itself ending and errors
/// travel as `Err` items, so neither needs a variant here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    /// Text carried by the first choice of a record.  May be empty.
    Fragment(String),

    /// A well-formed record (or a line without a `data:` prefix) with no choices.
    Empty,

    /// A `data:` line whose payload is not JSON, such as `[DONE]`.  Skipped.
    Skipped,
}

impl DeltaEvent {
    /// Returns the text of a non-empty fragment.
    pub fn text(&self) -> Option<&str> {
        match self {
            DeltaEvent::Fragment(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    /// Returns true if this line was skipped as unparsable.
    pub fn is_skipped(&self) -> bool {
        matches!(self, DeltaEvent::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_of_fragments() {
        assert_eq!(DeltaEvent::Fragment("a".to_string()).text(), Some("a"));
        assert_eq!(DeltaEvent::Fragment(String::new()).text(), None);
        assert_eq!(DeltaEvent::Empty.text(), None);
        assert!(DeltaEvent::Skipped.is_skipped());
    }
}
