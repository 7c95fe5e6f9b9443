use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Ordered alphabet for both tag positions
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// First allocated tag
pub const FIRST_TAG: Tag = Tag(*b"a0");

/// Last allocated tag
pub const LAST_TAG: Tag = Tag(*b"zZ");

/// Per-record read identifier stripped from `read_<id>` path segments
pub const READ_ID_TAG: Tag = Tag(*b"X0");

/// Per-record source filename
pub const FILENAME_TAG: Tag = Tag(*b"X1");

/// Per-record path of the embedded FASTQ dataset
pub const FASTQ_PATH_TAG: Tag = Tag(*b"X2");

/// Per-record description line of the FASTQ read, when it has one
pub const FASTQ_DESCRIPTION_TAG: Tag = Tag(*b"X3");

/// Per-record embedded FASTQ text, kept when a supplied FASTQ replaced it as
/// the record's sequence
pub const FASTQ_TEXT_TAG: Tag = Tag(*b"X4");

/// Tags written by the encoder itself, outside the allocated range
pub const RESERVED_TAGS: [Tag; 5] = [
    READ_ID_TAG,
    FILENAME_TAG,
    FASTQ_PATH_TAG,
    FASTQ_DESCRIPTION_TAG,
    FASTQ_TEXT_TAG,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("Tag space exhausted: all tags up to {LAST_TAG} are in use")]
    TagSpaceExhausted,

    #[error("Invalid tag: '{0}'")]
    Invalid(String),
}

/// Two-character aux tag identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag(pub [u8; 2]);

impl Tag {
    #[must_use]
    pub fn as_bytes(&self) -> [u8; 2] {
        self.0
    }

    #[must_use]
    pub fn is_reserved(&self) -> bool {
        RESERVED_TAGS.contains(self)
    }

    /// Position of this tag in the allocation order
    fn ordinal(self) -> Option<usize> {
        let position = |b: u8| ALPHABET.iter().position(|&c| c == b);
        Some(position(self.0[0])? * ALPHABET.len() + position(self.0[1])?)
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        let first = *ALPHABET.get(ordinal / ALPHABET.len())?;
        let second = ALPHABET[ordinal % ALPHABET.len()];
        Some(Self([first, second]))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", char::from(self.0[0]), char::from(self.0[1]))
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphanumeric() => {
                Ok(Self([*a, *b]))
            }
            _ => Err(TagError::Invalid(s.to_string())),
        }
    }
}

impl From<Tag> for noodles::sam::alignment::record::data::field::Tag {
    fn from(tag: Tag) -> Self {
        Self::new(tag.0[0], tag.0[1])
    }
}

impl From<noodles::sam::alignment::record::data::field::Tag> for Tag {
    fn from(tag: noodles::sam::alignment::record::data::field::Tag) -> Self {
        let [a, b] = *tag.as_ref();
        Self([a, b])
    }
}

/// Hands out tags `a0, a1, …, aZ, b0, …, zZ` in strictly increasing order.
///
/// The allocator is an explicit value threaded through the schema merge, so
/// two builds over the same input always produce the same assignment.
#[derive(Debug, Clone)]
pub struct TagAllocator {
    next: usize,
    last: usize,
}

impl TagAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(FIRST_TAG)
    }

    /// Start allocation at an arbitrary tag of the order
    #[must_use]
    pub fn starting_at(first: Tag) -> Self {
        let last = LAST_TAG.ordinal().unwrap_or_default();
        Self {
            next: first.ordinal().unwrap_or(last + 1),
            last,
        }
    }

    /// Issue the next tag.
    ///
    /// # Errors
    ///
    /// Returns `TagError::TagSpaceExhausted` once [`LAST_TAG`] has been issued.
    pub fn next_tag(&mut self) -> Result<Tag, TagError> {
        if self.next > self.last {
            return Err(TagError::TagSpaceExhausted);
        }
        let tag = Tag::from_ordinal(self.next).ok_or(TagError::TagSpaceExhausted)?;
        self.next += 1;
        Ok(tag)
    }

    /// Restart allocation for a new schema build
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Number of tags still available
    #[must_use]
    pub fn remaining(&self) -> usize {
        (self.last + 1).saturating_sub(self.next)
    }

    /// Total number of allocatable tags
    #[must_use]
    pub fn capacity() -> usize {
        LAST_TAG.ordinal().unwrap_or_default() - FIRST_TAG.ordinal().unwrap_or_default() + 1
    }
}

impl Default for TagAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tags() {
        let mut allocator = TagAllocator::new();
        let tags: Vec<String> = (0..12)
            .map(|_| allocator.next_tag().unwrap().to_string())
            .collect();
        assert_eq!(
            tags,
            vec!["a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9", "aa", "ab"]
        );
    }

    #[test]
    fn test_rolls_over_to_next_letter() {
        let mut allocator = TagAllocator::starting_at("aZ".parse().unwrap());
        assert_eq!(allocator.next_tag().unwrap().to_string(), "aZ");
        assert_eq!(allocator.next_tag().unwrap().to_string(), "b0");
    }

    #[test]
    fn test_capacity() {
        assert_eq!(TagAllocator::capacity(), 26 * 62);
        assert_eq!(TagAllocator::new().remaining(), 26 * 62);
    }

    #[test]
    fn test_exhaustion_after_last_tag() {
        let mut allocator = TagAllocator::new();
        let mut last = None;
        for _ in 0..TagAllocator::capacity() {
            last = Some(allocator.next_tag().unwrap());
        }
        assert_eq!(last, Some(LAST_TAG));
        assert_eq!(allocator.next_tag(), Err(TagError::TagSpaceExhausted));
        assert_eq!(allocator.next_tag(), Err(TagError::TagSpaceExhausted));
    }

    #[test]
    fn test_reset() {
        let mut allocator = TagAllocator::new();
        allocator.next_tag().unwrap();
        allocator.next_tag().unwrap();
        allocator.reset();
        assert_eq!(allocator.next_tag().unwrap(), FIRST_TAG);
    }

    #[test]
    fn test_strictly_increasing() {
        let mut allocator = TagAllocator::new();
        let mut previous = allocator.next_tag().unwrap();
        while let Ok(tag) = allocator.next_tag() {
            assert!(tag.ordinal() > previous.ordinal());
            assert!(!tag.is_reserved());
            previous = tag;
        }
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!("a0".parse::<Tag>().unwrap(), FIRST_TAG);
        assert!("0a".parse::<Tag>().is_err());
        assert!("abc".parse::<Tag>().is_err());
        assert!("a".parse::<Tag>().is_err());
    }
}
